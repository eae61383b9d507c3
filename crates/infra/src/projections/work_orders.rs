use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use oficina_core::{Entity, Related, WorkOrderId};
use oficina_events::EventEnvelope;
use oficina_inventory::PartId;
use oficina_workorders::{
    ClientId, MechanicId, PartLine, ServiceLine, VehicleId, WorkOrderEvent, WorkOrderStatus,
    WorkOrderTotals, line_total, work_order_total,
};

use super::parts_catalog::PartRecord;
use super::{ProjectionError, StreamCursors};
use crate::aggregate_types;
use crate::read_model::ReadStore;

/// OS as listed: every relation is an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrderRecord {
    pub id: WorkOrderId,
    pub client_id: ClientId,
    pub vehicle_id: VehicleId,
    pub mechanic_id: MechanicId,
    pub status: WorkOrderStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub problem_description: Option<String>,
    pub notes: Option<String>,
    pub payment_method: Option<String>,
    pub services: Vec<ServiceLine>,
    pub parts: Vec<PartLine>,
    pub totals: WorkOrderTotals,
}

impl Entity for WorkOrderRecord {
    type Id = WorkOrderId;

    fn id(&self) -> &WorkOrderId {
        &self.id
    }
}

/// A part line whose part may have been hydrated from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartLineDetail {
    pub part: Related<PartRecord>,
    pub unit_price: Decimal,
    pub quantity: i64,
    /// `None` only if the product does not fit; opened orders always fit.
    pub line_total: Option<Decimal>,
}

/// OS detail view: part lines carry the part record when it is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrderDetail {
    pub order: WorkOrderRecord,
    pub part_lines: Vec<PartLineDetail>,
}

#[derive(Debug)]
pub struct WorkOrdersProjection<S>
where
    S: ReadStore<WorkOrderId, WorkOrderRecord>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> WorkOrdersProjection<S>
where
    S: ReadStore<WorkOrderId, WorkOrderRecord>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &WorkOrderId) -> Option<WorkOrderRecord> {
        self.store.get(id)
    }

    /// Most recently opened first.
    pub fn list(&self) -> Vec<WorkOrderRecord> {
        let mut orders = self.store.list();
        orders.sort_by(|a, b| b.opened_at.cmp(&a.opened_at));
        orders
    }

    pub fn detail(&self, id: &WorkOrderId, load_part: impl Fn(&PartId) -> Option<PartRecord>) -> Option<WorkOrderDetail> {
        let order = self.store.get(id)?;
        let part_lines = order
            .parts
            .iter()
            .map(|line| PartLineDetail {
                part: Related::reference(line.part_id).hydrate_with(|pid| load_part(pid)),
                unit_price: line.unit_price,
                quantity: line.quantity,
                line_total: line_total(line.unit_price, line.quantity).ok(),
            })
            .collect();
        Some(WorkOrderDetail { order, part_lines })
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_types::WORK_ORDER {
            return Ok(());
        }

        self.cursors.apply_once(envelope, || {
            let event: WorkOrderEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;
            match event {
                WorkOrderEvent::WorkOrderOpened(e) => {
                    let totals = work_order_total(&e.services, &e.parts, e.discount)?;
                    self.store.upsert(
                        e.work_order_id,
                        WorkOrderRecord {
                            id: e.work_order_id,
                            client_id: e.client_id,
                            vehicle_id: e.vehicle_id,
                            mechanic_id: e.mechanic_id,
                            status: e.status,
                            opened_at: e.opened_at,
                            closed_at: e.closed_at,
                            problem_description: e.problem_description,
                            notes: e.notes,
                            payment_method: e.payment_method,
                            services: e.services,
                            parts: e.parts,
                            totals,
                        },
                    );
                }
                WorkOrderEvent::WorkOrderStatusChanged(e) => {
                    let mut record = self
                        .store
                        .get(&e.work_order_id)
                        .ok_or_else(|| ProjectionError::MissingRecord(format!("work order {}", e.work_order_id)))?;
                    record.status = e.to;
                    if e.closed_at.is_some() {
                        record.closed_at = e.closed_at;
                    }
                    self.store.upsert(e.work_order_id, record);
                }
            }
            Ok(())
        })
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.cursors.reset();
        self.store.clear();
        for env in envelopes {
            self.apply_envelope(&env)?;
        }
        Ok(())
    }
}
