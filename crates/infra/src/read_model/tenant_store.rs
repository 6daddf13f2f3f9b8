use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use aura_core::TenantId;

/// Key/value store partitioned by tenant.
///
/// Every lookup takes the tenant id, so a read model can never hand one
/// tenant's rows to another.
pub trait TenantStore<K, V>: Send + Sync {
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V>;
    fn upsert(&self, tenant_id: TenantId, key: K, value: V);
    fn remove(&self, tenant_id: TenantId, key: &K) -> Option<V>;
    fn list(&self, tenant_id: TenantId) -> Vec<V>;
    /// Drop every row of a tenant (rebuild support).
    fn clear_tenant(&self, tenant_id: TenantId);
}

impl<K, V, S> TenantStore<K, V> for Arc<S>
where
    S: TenantStore<K, V> + ?Sized,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        (**self).get(tenant_id, key)
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        (**self).upsert(tenant_id, key, value)
    }

    fn remove(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        (**self).remove(tenant_id, key)
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        (**self).list(tenant_id)
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        (**self).clear_tenant(tenant_id)
    }
}

#[derive(Debug)]
pub struct InMemoryTenantStore<K, V> {
    inner: RwLock<HashMap<TenantId, HashMap<K, V>>>,
}

impl<K, V> InMemoryTenantStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryTenantStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TenantStore<K, V> for InMemoryTenantStore<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(&tenant_id)?.get(key).cloned()
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.entry(tenant_id).or_default().insert(key, value);
        }
    }

    fn remove(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        let mut map = self.inner.write().ok()?;
        map.get_mut(&tenant_id)?.remove(key)
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        let Ok(map) = self.inner.read() else {
            return vec![];
        };
        map.get(&tenant_id)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(&tenant_id);
        }
    }
}
