//! `oficina-client`: typed access to the workshop API for the presentation layer.
//!
//! Session state is explicit: an [`ApiClient`] owns the [`Session`] it was
//! given and reports authentication failures through an injected callback.

pub mod client;
pub mod config;
pub mod display;
pub mod error;
pub mod session;
pub mod submit;
pub mod types;

pub use client::{ApiClient, AuthFailureHook, Reloaded};
pub use config::ClientConfig;
pub use error::ClientError;
pub use session::{Session, SessionUser};
pub use submit::{InFlight, SubmitGuard};
pub use types::{
    Category, EntryForm, ExitForm, HistoryMovement, LowStockWarning, Movement, MovementOrigin,
    MovementReceipt, Part, WorkOrder, WorkOrderPartLine, WorkOrderServiceLine,
};
