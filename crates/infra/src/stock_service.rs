//! Stock Movement Service: the only writer of part streams.
//!
//! Entry and exit are a single append to the part's stream, so the ledger
//! row and the quantity change commit together or not at all. Concurrent
//! requests against one part are serialized by optimistic concurrency: a
//! stale append is reloaded and re-decided up to `max_attempts` times.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tracing::{info, instrument, warn};

use oficina_core::{Aggregate, AggregateId, UserId, WorkOrderId};
use oficina_events::{EventBus, EventEnvelope};
use oficina_inventory::{
    CategoryId, DeletePart, HistoryEntry, LowStockAlert, MovementId, Part, PartCommand, PartEvent,
    PartId, RecordEntry, RecordExit, RegisterPart, StockMovement, UpdatePartDetails,
    annotate_history,
};
use oficina_workorders::WorkOrder;

use crate::aggregate_types;
use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, StoredEvent};
use crate::projections::PartRecord;
use crate::projections::parts_catalog::PartsCatalogProjection;
use crate::projections::users::{UserRecord, UsersProjection};
use crate::read_model::ReadStore;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Source of timestamps for movements.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Lookup used to keep part numbers unique.
pub trait PartNumberIndex: Send + Sync {
    fn part_with_number(&self, part_number: &str) -> Option<PartId>;
}

/// Resolves the acting user's name for movement history.
pub trait UserDirectory: Send + Sync {
    fn display_name(&self, user_id: &UserId) -> Option<String>;
}

impl<S> PartNumberIndex for PartsCatalogProjection<S>
where
    S: ReadStore<PartId, PartRecord>,
{
    fn part_with_number(&self, part_number: &str) -> Option<PartId> {
        self.by_part_number(part_number).map(|p| p.id)
    }
}

impl<S> UserDirectory for UsersProjection<S>
where
    S: ReadStore<UserId, UserRecord>,
{
    fn display_name(&self, user_id: &UserId) -> Option<String> {
        UsersProjection::display_name(self, user_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPart {
    pub name: String,
    pub part_number: String,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub cost_price: Decimal,
    pub sale_price: Decimal,
    pub initial_quantity: i64,
    pub min_stock: i64,
    pub location: Option<String>,
}

/// Full replacement of a part's editable fields.
///
/// `quantity` is a direct stock edit, accepted only while the part has no
/// movements.
#[derive(Debug, Clone, PartialEq)]
pub struct PartChanges {
    pub name: String,
    pub part_number: String,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub cost_price: Decimal,
    pub sale_price: Decimal,
    pub min_stock: i64,
    pub location: Option<String>,
    pub quantity: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntryRequest {
    pub part_id: PartId,
    pub quantity: i64,
    pub reason: String,
    pub cost_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub work_order_id: Option<WorkOrderId>,
    pub actor: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitRequest {
    pub part_id: PartId,
    pub quantity: i64,
    pub reason: String,
    pub work_order_id: Option<WorkOrderId>,
    pub actor: Option<UserId>,
}

/// Result of a committed entry or exit.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementOutcome {
    pub movement: StockMovement,
    /// Part quantity right after this movement.
    pub quantity: i64,
    /// Present when an exit left the part at or below its threshold.
    pub alert: Option<LowStockAlert>,
}

pub struct StockMovementService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    part_numbers: Arc<dyn PartNumberIndex>,
    users: Arc<dyn UserDirectory>,
    max_attempts: u32,
    clock: Clock,
}

impl<S, B> StockMovementService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        part_numbers: Arc<dyn PartNumberIndex>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            dispatcher,
            part_numbers,
            users,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            clock: Arc::new(Utc::now),
        }
    }

    /// Attempts per request when the part stream moves underneath (minimum 1).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[instrument(skip(self, new_part), fields(part_number = %new_part.part_number))]
    pub fn register_part(&self, new_part: NewPart) -> Result<PartRecord, DispatchError> {
        if self.part_numbers.part_with_number(&new_part.part_number).is_some() {
            return Err(DispatchError::Conflict(format!(
                "código de peça já cadastrado: {}",
                new_part.part_number.trim()
            )));
        }

        let part_id = PartId::new(AggregateId::new());
        self.dispatch_part(part_id, |occurred_at| {
            PartCommand::RegisterPart(RegisterPart {
                part_id,
                name: new_part.name.clone(),
                part_number: new_part.part_number.clone(),
                description: new_part.description.clone(),
                category_id: new_part.category_id,
                cost_price: new_part.cost_price,
                sale_price: new_part.sale_price,
                initial_quantity: new_part.initial_quantity,
                min_stock: new_part.min_stock,
                location: new_part.location.clone(),
                occurred_at,
            })
        })?;
        info!(%part_id, "part registered");

        self.get_part(part_id)
    }

    #[instrument(skip(self, changes))]
    pub fn update_part(&self, part_id: PartId, changes: PartChanges) -> Result<PartRecord, DispatchError> {
        if let Some(owner) = self.part_numbers.part_with_number(&changes.part_number) {
            if owner != part_id {
                return Err(DispatchError::Conflict(format!(
                    "código de peça já cadastrado: {}",
                    changes.part_number.trim()
                )));
            }
        }

        self.dispatch_part(part_id, |occurred_at| {
            PartCommand::UpdatePartDetails(UpdatePartDetails {
                part_id,
                name: changes.name.clone(),
                part_number: changes.part_number.clone(),
                description: changes.description.clone(),
                category_id: changes.category_id,
                cost_price: changes.cost_price,
                sale_price: changes.sale_price,
                min_stock: changes.min_stock,
                location: changes.location.clone(),
                quantity: changes.quantity,
                occurred_at,
            })
        })?;

        self.get_part(part_id)
    }

    /// Removes a part from the catalog. Refused once the part has any movement.
    #[instrument(skip(self))]
    pub fn delete_part(&self, part_id: PartId) -> Result<(), DispatchError> {
        self.dispatch_part(part_id, |occurred_at| {
            PartCommand::DeletePart(DeletePart { part_id, occurred_at })
        })?;
        info!(%part_id, "part deleted");
        Ok(())
    }

    /// Current state of one part, read from its stream.
    pub fn get_part(&self, part_id: PartId) -> Result<PartRecord, DispatchError> {
        let events = self.part_events(part_id)?;

        let mut part = Part::empty(part_id);
        let mut last_movement_at = None;
        for (_, event) in &events {
            if let Some(movement) = event.movement() {
                last_movement_at = Some(movement.occurred_at);
            }
            part.apply(event);
        }
        if !part.is_registered() {
            return Err(part_not_found());
        }

        let mut record = PartRecord::from(&part);
        record.last_movement_at = last_movement_at;
        Ok(record)
    }

    #[instrument(skip(self, request), fields(part_id = %request.part_id, quantity = request.quantity))]
    pub fn record_entry(&self, request: EntryRequest) -> Result<MovementOutcome, DispatchError> {
        if let Some(work_order_id) = request.work_order_id {
            self.ensure_work_order(work_order_id)?;
        }

        let movement_id = MovementId::new();
        let committed = self.dispatch_part(request.part_id, |occurred_at| {
            PartCommand::RecordEntry(RecordEntry {
                part_id: request.part_id,
                movement_id,
                quantity: request.quantity,
                reason: request.reason.clone(),
                cost_price: request.cost_price,
                sale_price: request.sale_price,
                work_order_id: request.work_order_id,
                actor: request.actor,
                occurred_at,
            })
        })?;
        let outcome = movement_outcome(&committed)?;
        info!(quantity_after = outcome.quantity, "stock entry recorded");
        Ok(outcome)
    }

    #[instrument(skip(self, request), fields(part_id = %request.part_id, quantity = request.quantity))]
    pub fn record_exit(&self, request: ExitRequest) -> Result<MovementOutcome, DispatchError> {
        if let Some(work_order_id) = request.work_order_id {
            self.ensure_work_order(work_order_id)?;
        }

        let movement_id = MovementId::new();
        let committed = self.dispatch_part(request.part_id, |occurred_at| {
            PartCommand::RecordExit(RecordExit {
                part_id: request.part_id,
                movement_id,
                quantity: request.quantity,
                reason: request.reason.clone(),
                work_order_id: request.work_order_id,
                actor: request.actor,
                occurred_at,
            })
        })?;
        let outcome = movement_outcome(&committed)?;
        if let Some(alert) = &outcome.alert {
            warn!(quantity_after = outcome.quantity, threshold = alert.threshold, "low stock");
        } else {
            info!(quantity_after = outcome.quantity, "stock exit recorded");
        }
        Ok(outcome)
    }

    /// Every movement of the part, newest first, ties in ledger order.
    #[instrument(skip(self))]
    pub fn history(&self, part_id: PartId) -> Result<Vec<HistoryEntry>, DispatchError> {
        let events = self.part_events(part_id)?;
        let registered = matches!(events.first(), Some((_, PartEvent::PartRegistered(_))));
        let deleted = events.iter().any(|(_, e)| matches!(e, PartEvent::PartDeleted(_)));
        if !registered || deleted {
            return Err(part_not_found());
        }

        let movements = events
            .into_iter()
            .filter_map(|(_, event)| match event {
                PartEvent::StockEntered(e) => Some(e.movement),
                PartEvent::StockExited(e) => Some(e.movement),
                _ => None,
            })
            .collect();

        Ok(annotate_history(movements, |id| self.users.display_name(id)))
    }

    fn part_events(&self, part_id: PartId) -> Result<Vec<(u64, PartEvent)>, DispatchError> {
        self.dispatcher
            .load_events(part_id.0, aggregate_types::PART)
            .map_err(|err| match err {
                DispatchError::NotFound(_) => part_not_found(),
                other => other,
            })
    }

    fn ensure_work_order(&self, work_order_id: WorkOrderId) -> Result<(), DispatchError> {
        let missing = || DispatchError::not_found(format!("OS não encontrada: {work_order_id}"));
        let order: WorkOrder = self
            .dispatcher
            .load(work_order_id.into(), aggregate_types::WORK_ORDER, |_| {
                WorkOrder::empty(work_order_id)
            })
            .map_err(|err| match err {
                DispatchError::NotFound(_) => missing(),
                other => other,
            })?;
        if !order.is_open() {
            return Err(missing());
        }
        Ok(())
    }

    /// Builds the command once per attempt, each with a fresh clock reading.
    fn dispatch_part(
        &self,
        part_id: PartId,
        command: impl Fn(DateTime<Utc>) -> PartCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let mut attempt = 1;
        loop {
            let result = self.dispatcher.dispatch::<Part>(
                part_id.0,
                aggregate_types::PART,
                command((self.clock)()),
                |id| Part::empty(PartId::new(id)),
            );
            match result {
                Err(DispatchError::Concurrency(msg)) if attempt < self.max_attempts => {
                    warn!(%part_id, attempt, error = %msg, "part stream moved, re-deciding");
                    attempt += 1;
                }
                Err(DispatchError::NotFound(_)) => return Err(part_not_found()),
                other => return other,
            }
        }
    }
}

fn part_not_found() -> DispatchError {
    DispatchError::not_found("peça não encontrada")
}

fn movement_outcome(committed: &[StoredEvent]) -> Result<MovementOutcome, DispatchError> {
    let stored = committed
        .last()
        .ok_or_else(|| DispatchError::InvariantViolation("movement produced no events".to_string()))?;
    let event: PartEvent =
        serde_json::from_value(stored.payload.clone()).map_err(|e| DispatchError::Deserialize(e.to_string()))?;

    match event {
        PartEvent::StockEntered(e) => Ok(MovementOutcome {
            quantity: e.movement.quantity_after,
            movement: e.movement,
            alert: None,
        }),
        PartEvent::StockExited(e) => Ok(MovementOutcome {
            quantity: e.movement.quantity_after,
            movement: e.movement,
            alert: e.alert,
        }),
        other => Err(DispatchError::InvariantViolation(format!(
            "expected a movement event, found {other:?}"
        ))),
    }
}
