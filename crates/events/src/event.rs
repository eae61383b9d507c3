use chrono::{DateTime, Utc};

/// A recorded business fact (stock entered, work order opened, user suspended, ...).
///
/// Events are immutable and only ever appended. `event_type` is the stable
/// name persisted next to the payload; `version` is its schema revision.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name, e.g. `"inventory.part.stock_exited"`.
    fn event_type(&self) -> &'static str;

    fn version(&self) -> u32;

    /// Business time at which the fact happened.
    fn occurred_at(&self) -> DateTime<Utc>;
}
