//! Append-only event store boundary.
//!
//! Streams are keyed by `(tenant_id, aggregate_id)`. The store knows nothing
//! about HR semantics; payloads are opaque JSON.

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
