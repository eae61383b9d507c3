//! Parts inventory domain (event-sourced).
//!
//! A part's event stream is its stock ledger: every entry and exit is an
//! event carrying the immutable movement row, so quantity and ledger can
//! never disagree. Pure domain logic; no IO.

pub mod category;
pub mod movement;
pub mod part;

pub use category::{Category, CategoryCommand, CategoryCreated, CategoryEvent, CategoryId, CreateCategory};
pub use movement::{
    Actor, HistoryEntry, LowStockAlert, MIN_REASON_CHARS, MovementId, MovementKind, Reason,
    StockMovement, annotate_history, order_history,
};
pub use part::{
    DeletePart, Part, PartCommand, PartDeleted, PartDetailsUpdated, PartEvent, PartId,
    PartRegistered, RecordEntry, RecordExit, RegisterPart, StockEntered, StockExited,
    UpdatePartDetails,
};
