//! Tenant-isolated read model storage.
//!
//! Read models are disposable: they are rebuilt from the event log at startup,
//! so only an in-memory backend exists.

pub mod tenant_store;

pub use tenant_store::{InMemoryTenantStore, TenantStore};
