//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a tenant (customer organisation, the isolation boundary).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(Uuid);

/// Identifier of a login account.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

/// Identifier of an event stream (one per employee, leave request, payslip, ...).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Fresh time-ordered (UUIDv7) identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(TenantId, "TenantId");
impl_uuid_newtype!(UserId, "UserId");
impl_uuid_newtype!(AggregateId, "AggregateId");

// A user's event stream is keyed by the user id itself.
impl From<UserId> for AggregateId {
    fn from(value: UserId) -> Self {
        Self(value.0)
    }
}

impl From<AggregateId> for UserId {
    fn from(value: AggregateId) -> Self {
        Self(value.0)
    }
}

/// Namespace for name-based (v5) aggregate ids.
const AURA_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a9e_4b7d_5e08_9c31_a2d4_e5f6_0718);

impl TenantId {
    /// The platform tenant. System administrators and the tenant registry live here.
    pub const fn system() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_system(&self) -> bool {
        self.0.is_nil()
    }
}

impl AggregateId {
    /// Deterministic id for records keyed by a natural key
    /// (attendance day, payslip period, tenant settings).
    ///
    /// The same `(kind, tenant, parts)` always yields the same id, so a second
    /// create lands on the existing stream and is rejected by the aggregate.
    pub fn derived(kind: &str, tenant_id: TenantId, parts: &[&str]) -> Self {
        let mut name = String::with_capacity(64);
        name.push_str(kind);
        name.push('/');
        name.push_str(&tenant_id.to_string());
        for p in parts {
            name.push('/');
            name.push_str(p);
        }
        Self(Uuid::new_v5(&AURA_NAMESPACE, name.as_bytes()))
    }
}
