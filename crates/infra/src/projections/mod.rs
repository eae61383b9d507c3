//! Projections: read models built from published events.
//!
//! Every projection is rebuildable from the event store and idempotent under
//! at-least-once delivery (per-stream cursors). Read models are eventually
//! consistent with the streams; operations that must see their own writes
//! (stock movements, history) read the streams instead.

pub mod categories;
pub mod cursor;
pub mod parts_catalog;
pub mod users;
pub mod work_orders;

use std::sync::Arc;

use serde_json::Value as JsonValue;
use thiserror::Error;

use oficina_core::{DomainError, UserId, WorkOrderId};
use oficina_events::EventEnvelope;
use oficina_inventory::{CategoryId, PartId};

use crate::read_model::InMemoryReadStore;

pub use categories::{CategoriesProjection, CategoryRecord};
pub use cursor::StreamCursors;
pub use parts_catalog::{PartRecord, PartsCatalogProjection};
pub use users::{UserRecord, UsersProjection};
pub use work_orders::{PartLineDetail, WorkOrderDetail, WorkOrderRecord, WorkOrdersProjection};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event: {0}")]
    Deserialize(String),

    #[error("event does not belong to its stream: {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("event for unknown record: {0}")]
    MissingRecord(String),

    #[error("stored event violates a domain rule: {0}")]
    Domain(#[from] DomainError),

    #[error("projection lock poisoned")]
    Poisoned,
}

pub type PartsCatalog = PartsCatalogProjection<Arc<InMemoryReadStore<PartId, PartRecord>>>;
pub type Categories = CategoriesProjection<Arc<InMemoryReadStore<CategoryId, CategoryRecord>>>;
pub type WorkOrders = WorkOrdersProjection<Arc<InMemoryReadStore<WorkOrderId, WorkOrderRecord>>>;
pub type Users = UsersProjection<Arc<InMemoryReadStore<UserId, UserRecord>>>;

/// All read models of the service, fed from one subscription.
#[derive(Debug, Clone)]
pub struct ReadModels {
    pub parts: Arc<PartsCatalog>,
    pub categories: Arc<Categories>,
    pub work_orders: Arc<WorkOrders>,
    pub users: Arc<Users>,
}

impl ReadModels {
    pub fn in_memory() -> Self {
        Self {
            parts: Arc::new(PartsCatalogProjection::new(Arc::new(InMemoryReadStore::new()))),
            categories: Arc::new(CategoriesProjection::new(Arc::new(InMemoryReadStore::new()))),
            work_orders: Arc::new(WorkOrdersProjection::new(Arc::new(InMemoryReadStore::new()))),
            users: Arc::new(UsersProjection::new(Arc::new(InMemoryReadStore::new()))),
        }
    }

    /// Route an envelope to every projection; each skips aggregate types it does not own.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        self.parts.apply_envelope(envelope)?;
        self.categories.apply_envelope(envelope)?;
        self.work_orders.apply_envelope(envelope)?;
        self.users.apply_envelope(envelope)?;
        Ok(())
    }

    /// Replace all read-model state with a replay of `envelopes` (commit order).
    pub fn rebuild_from_scratch(&self, envelopes: Vec<EventEnvelope<JsonValue>>) -> Result<(), ProjectionError> {
        self.parts.rebuild_from_scratch(envelopes.iter().cloned())?;
        self.categories.rebuild_from_scratch(envelopes.iter().cloned())?;
        self.work_orders.rebuild_from_scratch(envelopes.iter().cloned())?;
        self.users.rebuild_from_scratch(envelopes)?;
        Ok(())
    }
}

impl Default for ReadModels {
    fn default() -> Self {
        Self::in_memory()
    }
}
