use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use oficina_core::AggregateId;
use oficina_events::EventEnvelope;

use super::ProjectionError;

/// Per-stream cursor giving a projection at-least-once safety.
///
/// Envelopes at or below the cursor are ignored; after the first event of a
/// stream each envelope must be exactly one past the cursor.
#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: RwLock<HashMap<AggregateId, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `apply` for `envelope` unless it was already seen, then advance the cursor.
    ///
    /// The cursor lock is held while `apply` runs, so two workers cannot
    /// interleave updates for the same projection.
    pub fn apply_once<F>(&self, envelope: &EventEnvelope<JsonValue>, apply: F) -> Result<(), ProjectionError>
    where
        F: FnOnce() -> Result<(), ProjectionError>,
    {
        let mut cursors = self.inner.write().map_err(|_| ProjectionError::Poisoned)?;
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        let last = cursors.get(&aggregate_id).copied().unwrap_or(0);

        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(());
        }
        if last != 0 && seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }

        apply()?;
        cursors.insert(aggregate_id, seq);
        Ok(())
    }

    pub fn reset(&self) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.clear();
        }
    }
}
