use chrono::{DateTime, Utc};

/// A domain event: an immutable, versioned fact about an HR record.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable dotted name (e.g. `"leave.request.approved"`).
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// Business time at which the fact happened.
    fn occurred_at(&self) -> DateTime<Utc>;
}
