use std::collections::HashMap;
use std::sync::RwLock;

use oficina_core::{AggregateId, ExpectedVersion};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent, batch_stream};

#[derive(Debug, Default)]
struct Inner {
    streams: HashMap<AggregateId, Vec<StoredEvent>>,
    /// Every committed event, in commit order.
    log: Vec<StoredEvent>,
}

/// In-memory append-only event store.
///
/// Intended for tests/dev. Appends are serialized by a single write lock, so
/// the version check and the push happen atomically.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: RwLock<Inner>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }
        let (aggregate_id, aggregate_type) = batch_stream(&events)?;

        let mut inner = self
            .inner
            .write()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        let stream = inner.streams.entry(aggregate_id).or_default();
        let current = Self::current_version(stream);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        if let Some(existing) = stream.first() {
            if existing.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{}', attempted append with '{}'",
                    existing.aggregate_type, aggregate_type
                )));
            }
        }

        let mut next = current + 1;
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            let stored = StoredEvent {
                event_id: e.event_id,
                aggregate_id: e.aggregate_id,
                aggregate_type: e.aggregate_type,
                sequence_number: next,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            };
            next += 1;
            stream.push(stored.clone());
            committed.push(stored);
        }
        inner.log.extend(committed.iter().cloned());

        Ok(committed)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        Ok(inner.streams.get(&aggregate_id).cloned().unwrap_or_default())
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        Ok(inner.log.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn event(aggregate_id: AggregateId, aggregate_type: &str) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            event_type: "test.event".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({}),
        }
    }

    #[test]
    fn sequence_numbers_continue_per_stream() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();
        let b = AggregateId::new();

        store
            .append(vec![event(a, "inventory.part"), event(a, "inventory.part")], ExpectedVersion::Exact(0))
            .unwrap();
        store.append(vec![event(b, "inventory.part")], ExpectedVersion::Exact(0)).unwrap();
        let third = store.append(vec![event(a, "inventory.part")], ExpectedVersion::Exact(2)).unwrap();

        assert_eq!(third[0].sequence_number, 3);
        assert_eq!(store.load_stream(a).unwrap().len(), 3);
        assert_eq!(store.load_stream(b).unwrap().len(), 1);

        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[2].aggregate_id, b);
    }

    #[test]
    fn stale_expected_version_is_rejected_without_writing() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();
        store.append(vec![event(a, "inventory.part")], ExpectedVersion::Exact(0)).unwrap();

        let err = store
            .append(vec![event(a, "inventory.part")], ExpectedVersion::Exact(0))
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));
        assert_eq!(store.load_stream(a).unwrap().len(), 1);
    }

    #[test]
    fn mixed_batches_and_type_changes_are_rejected() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();

        let mixed = vec![event(a, "inventory.part"), event(AggregateId::new(), "inventory.part")];
        assert!(matches!(
            store.append(mixed, ExpectedVersion::Any),
            Err(EventStoreError::InvalidAppend(_))
        ));

        store.append(vec![event(a, "inventory.part")], ExpectedVersion::Any).unwrap();
        assert!(matches!(
            store.append(vec![event(a, "auth.user")], ExpectedVersion::Any),
            Err(EventStoreError::AggregateTypeMismatch(_))
        ));
    }

    #[test]
    fn unknown_stream_loads_empty() {
        let store = InMemoryEventStore::new();
        assert!(store.load_stream(AggregateId::new()).unwrap().is_empty());
    }
}
