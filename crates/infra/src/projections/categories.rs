use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use oficina_core::Entity;
use oficina_events::EventEnvelope;
use oficina_inventory::{CategoryEvent, CategoryId};

use super::{ProjectionError, StreamCursors};
use crate::aggregate_types;
use crate::read_model::ReadStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
}

impl Entity for CategoryRecord {
    type Id = CategoryId;

    fn id(&self) -> &CategoryId {
        &self.id
    }
}

#[derive(Debug)]
pub struct CategoriesProjection<S>
where
    S: ReadStore<CategoryId, CategoryRecord>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> CategoriesProjection<S>
where
    S: ReadStore<CategoryId, CategoryRecord>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, category_id: &CategoryId) -> Option<CategoryRecord> {
        self.store.get(category_id)
    }

    /// All categories ordered by name.
    pub fn list(&self) -> Vec<CategoryRecord> {
        let mut categories = self.store.list();
        categories.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        categories
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_types::CATEGORY {
            return Ok(());
        }

        self.cursors.apply_once(envelope, || {
            let event: CategoryEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;
            match event {
                CategoryEvent::CategoryCreated(e) => {
                    self.store.upsert(
                        e.category_id,
                        CategoryRecord {
                            id: e.category_id,
                            name: e.name,
                            description: e.description,
                        },
                    );
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use uuid::Uuid;

    use oficina_core::AggregateId;
    use oficina_inventory::CategoryCreated;

    use crate::read_model::InMemoryReadStore;

    fn created(name: &str) -> (CategoryId, EventEnvelope<JsonValue>) {
        let id = CategoryId::new(AggregateId::new());
        let event = CategoryEvent::CategoryCreated(CategoryCreated {
            category_id: id,
            name: name.to_string(),
            description: None,
            occurred_at: Utc::now(),
        });
        let env = EventEnvelope::new(
            Uuid::now_v7(),
            id.0,
            aggregate_types::CATEGORY,
            1,
            serde_json::to_value(&event).unwrap(),
        );
        (id, env)
    }

    #[test]
    fn lists_categories_by_name() {
        let p = CategoriesProjection::new(Arc::new(InMemoryReadStore::new()));
        let (_, freios) = created("Freios");
        let (filtros_id, filtros) = created("Filtros");
        p.apply_envelope(&freios).unwrap();
        p.apply_envelope(&filtros).unwrap();
        p.apply_envelope(&filtros).unwrap();

        let names: Vec<_> = p.list().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Filtros", "Freios"]);
        assert_eq!(p.get(&filtros_id).map(|c| c.name), Some("Filtros".to_string()));
    }
}
