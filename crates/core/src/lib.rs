//! `oficina-core`: domain building blocks shared by the workshop crates.
//!
//! Pure domain code only; no IO, no storage, no transport.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::{Entity, Related};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, UserId, WorkOrderId};
pub use money::format_currency;
pub use value_object::ValueObject;
