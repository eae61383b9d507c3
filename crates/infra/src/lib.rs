//! Infrastructure layer: event store, command dispatch, read models and the
//! stock movement service.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod stock_service;
pub mod workers;

#[cfg(test)]
mod integration_tests;

/// Stream type names recorded with every stored event.
pub mod aggregate_types {
    pub const PART: &str = "inventory.part";
    pub const CATEGORY: &str = "inventory.category";
    pub const WORK_ORDER: &str = "workorders.order";
    pub const USER: &str = "auth.user";
}

pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use projections::{ProjectionError, ReadModels};
pub use stock_service::{
    EntryRequest, ExitRequest, MovementOutcome, NewPart, PartChanges, StockMovementService,
};
