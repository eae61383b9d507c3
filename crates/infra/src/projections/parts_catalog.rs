use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use oficina_core::{AggregateRoot, Entity};
use oficina_events::EventEnvelope;
use oficina_inventory::{CategoryId, Part, PartEvent, PartId};

use super::{ProjectionError, StreamCursors};
use crate::aggregate_types;
use crate::read_model::ReadStore;

/// Queryable part: current stock and catalog details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartRecord {
    pub id: PartId,
    pub name: String,
    pub part_number: String,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub cost_price: Decimal,
    pub sale_price: Decimal,
    pub quantity: i64,
    pub min_stock: i64,
    pub location: Option<String>,
    pub movement_count: u64,
    pub last_movement_at: Option<DateTime<Utc>>,
}

impl PartRecord {
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_stock
    }
}

impl Entity for PartRecord {
    type Id = PartId;

    fn id(&self) -> &PartId {
        &self.id
    }
}

impl From<&Part> for PartRecord {
    fn from(part: &Part) -> Self {
        Self {
            id: *AggregateRoot::id(part),
            name: part.name().to_string(),
            part_number: part.part_number().to_string(),
            description: part.description().map(str::to_string),
            category_id: part.category_id(),
            cost_price: part.cost_price(),
            sale_price: part.sale_price(),
            quantity: part.quantity(),
            min_stock: part.min_stock(),
            location: part.location().map(str::to_string),
            movement_count: part.movement_count(),
            last_movement_at: None,
        }
    }
}

fn normalize_part_number(part_number: &str) -> String {
    part_number.trim().to_lowercase()
}

/// Parts catalog: one record per part stream.
#[derive(Debug)]
pub struct PartsCatalogProjection<S>
where
    S: ReadStore<PartId, PartRecord>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> PartsCatalogProjection<S>
where
    S: ReadStore<PartId, PartRecord>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, part_id: &PartId) -> Option<PartRecord> {
        self.store.get(part_id)
    }

    /// All parts ordered by name.
    pub fn list(&self) -> Vec<PartRecord> {
        let mut parts = self.store.list();
        parts.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        parts
    }

    /// Case-insensitive match on name or part number; a blank query lists everything.
    pub fn search(&self, query: &str) -> Vec<PartRecord> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.list();
        }
        self.list()
            .into_iter()
            .filter(|p| p.name.to_lowercase().contains(&needle) || p.part_number.to_lowercase().contains(&needle))
            .collect()
    }

    /// Parts at or below their threshold, emptiest first.
    pub fn low_stock(&self) -> Vec<PartRecord> {
        let mut parts: Vec<_> = self.list().into_iter().filter(PartRecord::is_low_stock).collect();
        parts.sort_by_key(|p| p.quantity);
        parts
    }

    pub fn by_part_number(&self, part_number: &str) -> Option<PartRecord> {
        let wanted = normalize_part_number(part_number);
        self.store
            .list()
            .into_iter()
            .find(|p| normalize_part_number(&p.part_number) == wanted)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_types::PART {
            return Ok(());
        }

        self.cursors.apply_once(envelope, || {
            let event: PartEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;
            self.apply(envelope, event)
        })
    }

    fn apply(&self, envelope: &EventEnvelope<JsonValue>, event: PartEvent) -> Result<(), ProjectionError> {
        let part_id = PartId::new(envelope.aggregate_id());

        let event = match event {
            PartEvent::PartRegistered(e) => {
                if e.part_id != part_id {
                    return Err(ProjectionError::StreamMismatch(
                        "event part_id does not match envelope aggregate_id".to_string(),
                    ));
                }
                self.store.upsert(
                    part_id,
                    PartRecord {
                        id: part_id,
                        name: e.name,
                        part_number: e.part_number,
                        description: e.description,
                        category_id: e.category_id,
                        cost_price: e.cost_price,
                        sale_price: e.sale_price,
                        quantity: e.initial_quantity,
                        min_stock: e.min_stock,
                        location: e.location,
                        movement_count: 0,
                        last_movement_at: None,
                    },
                );
                return Ok(());
            }
            other => other,
        };

        if let PartEvent::PartDeleted(_) = event {
            self.store.remove(&part_id);
            return Ok(());
        }

        let mut record = self
            .store
            .get(&part_id)
            .ok_or_else(|| ProjectionError::MissingRecord(format!("part {part_id}")))?;

        match event {
            PartEvent::PartRegistered(_) | PartEvent::PartDeleted(_) => {}
            PartEvent::PartDetailsUpdated(e) => {
                record.name = e.name;
                record.part_number = e.part_number;
                record.description = e.description;
                record.category_id = e.category_id;
                record.cost_price = e.cost_price;
                record.sale_price = e.sale_price;
                record.min_stock = e.min_stock;
                record.location = e.location;
                if let Some(quantity) = e.quantity {
                    record.quantity = quantity;
                }
            }
            PartEvent::StockEntered(e) => {
                if let Some(price) = e.cost_price {
                    record.cost_price = price;
                }
                if let Some(price) = e.sale_price {
                    record.sale_price = price;
                }
                record.quantity = e.movement.quantity_after;
                record.movement_count += 1;
                record.last_movement_at = Some(e.movement.occurred_at);
            }
            PartEvent::StockExited(e) => {
                record.quantity = e.movement.quantity_after;
                record.movement_count += 1;
                record.last_movement_at = Some(e.movement.occurred_at);
            }
        }

        self.store.upsert(part_id, record);
        Ok(())
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use oficina_core::AggregateId;
    use oficina_inventory::{
        LowStockAlert, MovementId, MovementKind, PartDeleted, PartRegistered, Reason, StockExited,
        StockMovement,
    };

    use crate::read_model::InMemoryReadStore;

    fn projection() -> PartsCatalogProjection<Arc<InMemoryReadStore<PartId, PartRecord>>> {
        PartsCatalogProjection::new(Arc::new(InMemoryReadStore::new()))
    }

    fn envelope(part_id: PartId, seq: u64, event: &PartEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            part_id.0,
            aggregate_types::PART,
            seq,
            serde_json::to_value(event).unwrap(),
        )
    }

    fn registered(part_id: PartId, name: &str, number: &str, quantity: i64) -> PartEvent {
        PartEvent::PartRegistered(PartRegistered {
            part_id,
            name: name.to_string(),
            part_number: number.to_string(),
            description: None,
            category_id: None,
            cost_price: dec!(10),
            sale_price: dec!(15),
            initial_quantity: quantity,
            min_stock: 5,
            location: None,
            occurred_at: Utc::now(),
        })
    }

    fn exited(part_id: PartId, before: i64, quantity: i64) -> PartEvent {
        let after = before - quantity;
        PartEvent::StockExited(StockExited {
            movement: StockMovement {
                id: MovementId::new(),
                part_id,
                work_order_id: None,
                actor: None,
                kind: MovementKind::Exit,
                delta: -quantity,
                quantity_before: before,
                quantity_after: after,
                reason: Reason::parse("Uso na OS 42 - revisão").unwrap(),
                occurred_at: Utc::now(),
                position: 1,
            },
            alert: LowStockAlert::evaluate(part_id, "Pastilha", after, 5),
        })
    }

    #[test]
    fn exit_updates_quantity_and_low_stock_listing() {
        let p = projection();
        let part_id = PartId::new(AggregateId::new());
        p.apply_envelope(&envelope(part_id, 1, &registered(part_id, "Pastilha", "PF-1", 10))).unwrap();
        p.apply_envelope(&envelope(part_id, 2, &exited(part_id, 10, 6))).unwrap();

        let record = p.get(&part_id).unwrap();
        assert_eq!(record.quantity, 4);
        assert_eq!(record.movement_count, 1);
        assert!(record.last_movement_at.is_some());
        assert_eq!(p.low_stock().len(), 1);
    }

    #[test]
    fn duplicate_delivery_is_ignored() {
        let p = projection();
        let part_id = PartId::new(AggregateId::new());
        let exit = envelope(part_id, 2, &exited(part_id, 10, 3));
        p.apply_envelope(&envelope(part_id, 1, &registered(part_id, "Pastilha", "PF-1", 10))).unwrap();
        p.apply_envelope(&exit).unwrap();
        p.apply_envelope(&exit).unwrap();

        assert_eq!(p.get(&part_id).unwrap().quantity, 7);
    }

    #[test]
    fn gaps_in_a_stream_are_rejected() {
        let p = projection();
        let part_id = PartId::new(AggregateId::new());
        p.apply_envelope(&envelope(part_id, 1, &registered(part_id, "Pastilha", "PF-1", 10))).unwrap();

        let err = p.apply_envelope(&envelope(part_id, 3, &exited(part_id, 10, 3))).unwrap_err();
        assert!(matches!(err, ProjectionError::NonMonotonicSequence { last: 1, found: 3 }));
    }

    #[test]
    fn search_matches_name_or_number_case_insensitively() {
        let p = projection();
        let a = PartId::new(AggregateId::new());
        let b = PartId::new(AggregateId::new());
        p.apply_envelope(&envelope(a, 1, &registered(a, "Filtro de Ar", "FA-200", 8))).unwrap();
        p.apply_envelope(&envelope(b, 1, &registered(b, "Vela de ignição", "VI-77", 20))).unwrap();

        assert_eq!(p.search("filtro").len(), 1);
        assert_eq!(p.search("vi-7").len(), 1);
        assert_eq!(p.search("  ").len(), 2);
        assert_eq!(p.list()[0].name, "Filtro de Ar");
        assert_eq!(p.by_part_number(" fa-200 ").map(|r| r.id), Some(a));
    }

    #[test]
    fn deleted_part_leaves_listing_and_frees_its_number() {
        let p = projection();
        let part_id = PartId::new(AggregateId::new());
        p.apply_envelope(&envelope(part_id, 1, &registered(part_id, "Pastilha", "PF-1", 2))).unwrap();
        let deleted = PartEvent::PartDeleted(PartDeleted {
            part_id,
            occurred_at: Utc::now(),
        });
        p.apply_envelope(&envelope(part_id, 2, &deleted)).unwrap();

        assert!(p.get(&part_id).is_none());
        assert!(p.low_stock().is_empty());
        assert!(p.by_part_number("PF-1").is_none());
    }

    #[test]
    fn other_aggregate_types_are_skipped() {
        let p = projection();
        let env = EventEnvelope::new(Uuid::now_v7(), AggregateId::new(), "auth.user", 1, serde_json::json!({}));
        assert!(p.apply_envelope(&env).is_ok());
        assert!(p.list().is_empty());
    }
}
