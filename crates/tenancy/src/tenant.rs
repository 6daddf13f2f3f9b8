use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use aura_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, require_email, require_non_blank};
use aura_events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    #[default]
    Active,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Trial,
    Basic,
    Professional,
    Enterprise,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub plan: Plan,
    /// Maximum number of active employees.
    pub seats: u32,
    pub renews_on: Option<NaiveDate>,
}

impl Default for Subscription {
    fn default() -> Self {
        Self {
            plan: Plan::Trial,
            seats: 10,
            renews_on: None,
        }
    }
}

impl Subscription {
    fn validate(&self) -> Result<(), DomainError> {
        if self.seats == 0 {
            return Err(DomainError::validation("subscription seats must be positive"));
        }
        Ok(())
    }
}

/// Lowercases and checks a tenant slug: `[a-z0-9-]`, 2..=63 chars, no leading/trailing dash.
pub fn normalize_slug(raw: &str) -> Result<String, DomainError> {
    let slug = raw.trim().to_ascii_lowercase();
    let valid_chars = slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !(2..=63).contains(&slug.len()) || !valid_chars || slug.starts_with('-') || slug.ends_with('-') {
        return Err(DomainError::validation(format!("invalid tenant slug '{raw}'")));
    }
    Ok(slug)
}

/// Aggregate root: a customer organisation in the tenant registry.
///
/// The stream id is the tenant id itself (see [`Tenant::stream_id`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant {
    id: TenantId,
    name: String,
    slug: String,
    contact_email: String,
    status: TenantStatus,
    subscription: Subscription,
    version: u64,
    created: bool,
}

impl Tenant {
    pub fn empty(id: TenantId) -> Self {
        Self {
            id,
            name: String::new(),
            slug: String::new(),
            contact_email: String::new(),
            status: TenantStatus::Active,
            subscription: Subscription::default(),
            version: 0,
            created: false,
        }
    }

    pub fn stream_id(id: TenantId) -> AggregateId {
        AggregateId::from_uuid(*id.as_uuid())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn contact_email(&self) -> &str {
        &self.contact_email
    }

    pub fn status(&self) -> TenantStatus {
        self.status
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    fn ensure_created(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != tenant_id {
            return Err(DomainError::invariant("tenant id mismatch"));
        }
        Ok(())
    }
}

impl AggregateRoot for Tenant {
    type Id = TenantId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// Commands

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionTenant {
    pub tenant_id: TenantId,
    pub name: String,
    pub slug: String,
    pub contact_email: String,
    pub subscription: Subscription,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTenantProfile {
    pub tenant_id: TenantId,
    pub name: Option<String>,
    pub contact_email: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSubscription {
    pub tenant_id: TenantId,
    pub subscription: Subscription,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendTenant {
    pub tenant_id: TenantId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactivateTenant {
    pub tenant_id: TenantId,
    pub occurred_at: DateTime<Utc>,
}

/// Tenant-wide notice shown to every user of the tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishAnnouncement {
    pub tenant_id: TenantId,
    pub title: String,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TenantCommand {
    Provision(ProvisionTenant),
    UpdateProfile(UpdateTenantProfile),
    ChangeSubscription(ChangeSubscription),
    Suspend(SuspendTenant),
    Reactivate(ReactivateTenant),
    PublishAnnouncement(PublishAnnouncement),
}

// Events

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantProvisioned {
    pub tenant_id: TenantId,
    pub name: String,
    pub slug: String,
    pub contact_email: String,
    pub subscription: Subscription,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantProfileUpdated {
    pub tenant_id: TenantId,
    pub name: String,
    pub contact_email: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionChanged {
    pub tenant_id: TenantId,
    pub subscription: Subscription,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSuspended {
    pub tenant_id: TenantId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantReactivated {
    pub tenant_id: TenantId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncementPublished {
    pub tenant_id: TenantId,
    pub title: String,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TenantEvent {
    Provisioned(TenantProvisioned),
    ProfileUpdated(TenantProfileUpdated),
    SubscriptionChanged(SubscriptionChanged),
    Suspended(TenantSuspended),
    Reactivated(TenantReactivated),
    AnnouncementPublished(AnnouncementPublished),
}

impl Event for TenantEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TenantEvent::Provisioned(_) => "tenancy.tenant.provisioned",
            TenantEvent::ProfileUpdated(_) => "tenancy.tenant.profile_updated",
            TenantEvent::SubscriptionChanged(_) => "tenancy.tenant.subscription_changed",
            TenantEvent::Suspended(_) => "tenancy.tenant.suspended",
            TenantEvent::Reactivated(_) => "tenancy.tenant.reactivated",
            TenantEvent::AnnouncementPublished(_) => "tenancy.tenant.announcement_published",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TenantEvent::Provisioned(e) => e.occurred_at,
            TenantEvent::ProfileUpdated(e) => e.occurred_at,
            TenantEvent::SubscriptionChanged(e) => e.occurred_at,
            TenantEvent::Suspended(e) => e.occurred_at,
            TenantEvent::Reactivated(e) => e.occurred_at,
            TenantEvent::AnnouncementPublished(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Tenant {
    type Command = TenantCommand;
    type Event = TenantEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TenantEvent::Provisioned(e) => {
                self.id = e.tenant_id;
                self.name = e.name.clone();
                self.slug = e.slug.clone();
                self.contact_email = e.contact_email.clone();
                self.subscription = e.subscription.clone();
                self.status = TenantStatus::Active;
                self.created = true;
            }
            TenantEvent::ProfileUpdated(e) => {
                self.name = e.name.clone();
                self.contact_email = e.contact_email.clone();
            }
            TenantEvent::SubscriptionChanged(e) => self.subscription = e.subscription.clone(),
            TenantEvent::Suspended(_) => self.status = TenantStatus::Suspended,
            TenantEvent::Reactivated(_) => self.status = TenantStatus::Active,
            TenantEvent::AnnouncementPublished(_) => {}
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TenantCommand::Provision(cmd) => self.handle_provision(cmd),
            TenantCommand::UpdateProfile(cmd) => self.handle_update_profile(cmd),
            TenantCommand::ChangeSubscription(cmd) => self.handle_change_subscription(cmd),
            TenantCommand::Suspend(cmd) => self.handle_suspend(cmd),
            TenantCommand::Reactivate(cmd) => self.handle_reactivate(cmd),
            TenantCommand::PublishAnnouncement(cmd) => self.handle_publish_announcement(cmd),
        }
    }
}

impl Tenant {
    fn handle_provision(&self, cmd: &ProvisionTenant) -> Result<Vec<TenantEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("tenant already exists"));
        }
        if cmd.tenant_id.is_system() {
            return Err(DomainError::validation("the system tenant cannot be provisioned"));
        }
        require_non_blank("name", &cmd.name)?;
        let slug = normalize_slug(&cmd.slug)?;
        let contact_email = cmd.contact_email.trim().to_lowercase();
        require_email("contact_email", &contact_email)?;
        cmd.subscription.validate()?;

        Ok(vec![TenantEvent::Provisioned(TenantProvisioned {
            tenant_id: cmd.tenant_id,
            name: cmd.name.trim().to_string(),
            slug,
            contact_email,
            subscription: cmd.subscription.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_profile(&self, cmd: &UpdateTenantProfile) -> Result<Vec<TenantEvent>, DomainError> {
        self.ensure_created(cmd.tenant_id)?;

        let name = cmd
            .name
            .as_deref()
            .map(str::trim)
            .unwrap_or(self.name.as_str())
            .to_string();
        require_non_blank("name", &name)?;

        let contact_email = cmd
            .contact_email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .unwrap_or_else(|| self.contact_email.clone());
        require_email("contact_email", &contact_email)?;

        if name == self.name && contact_email == self.contact_email {
            return Ok(vec![]);
        }

        Ok(vec![TenantEvent::ProfileUpdated(TenantProfileUpdated {
            tenant_id: cmd.tenant_id,
            name,
            contact_email,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_subscription(&self, cmd: &ChangeSubscription) -> Result<Vec<TenantEvent>, DomainError> {
        self.ensure_created(cmd.tenant_id)?;
        cmd.subscription.validate()?;

        Ok(vec![TenantEvent::SubscriptionChanged(SubscriptionChanged {
            tenant_id: cmd.tenant_id,
            subscription: cmd.subscription.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_suspend(&self, cmd: &SuspendTenant) -> Result<Vec<TenantEvent>, DomainError> {
        self.ensure_created(cmd.tenant_id)?;
        if self.status == TenantStatus::Suspended {
            return Err(DomainError::invariant("tenant is already suspended"));
        }

        Ok(vec![TenantEvent::Suspended(TenantSuspended {
            tenant_id: cmd.tenant_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reactivate(&self, cmd: &ReactivateTenant) -> Result<Vec<TenantEvent>, DomainError> {
        self.ensure_created(cmd.tenant_id)?;
        if self.status == TenantStatus::Active {
            return Err(DomainError::invariant("tenant is already active"));
        }

        Ok(vec![TenantEvent::Reactivated(TenantReactivated {
            tenant_id: cmd.tenant_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_publish_announcement(&self, cmd: &PublishAnnouncement) -> Result<Vec<TenantEvent>, DomainError> {
        self.ensure_created(cmd.tenant_id)?;
        if self.status == TenantStatus::Suspended {
            return Err(DomainError::invariant("cannot announce to a suspended tenant"));
        }
        require_non_blank("title", &cmd.title)?;
        require_non_blank("message", &cmd.message)?;

        Ok(vec![TenantEvent::AnnouncementPublished(AnnouncementPublished {
            tenant_id: cmd.tenant_id,
            title: cmd.title.trim().to_string(),
            message: cmd.message.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn provision(tenant_id: TenantId, slug: &str) -> TenantCommand {
        TenantCommand::Provision(ProvisionTenant {
            tenant_id,
            name: "Acme Corp".to_string(),
            slug: slug.to_string(),
            contact_email: "HR@Acme.io".to_string(),
            subscription: Subscription::default(),
            occurred_at: test_time(),
        })
    }

    fn provisioned() -> Tenant {
        let id = TenantId::new();
        let mut tenant = Tenant::empty(id);
        aura_events::execute(&mut tenant, &provision(id, "acme")).unwrap();
        tenant
    }

    #[test]
    fn provision_normalises_slug_and_email() {
        let id = TenantId::new();
        let events = Tenant::empty(id).handle(&provision(id, "  ACME-Corp ")).unwrap();
        match &events[0] {
            TenantEvent::Provisioned(e) => {
                assert_eq!(e.slug, "acme-corp");
                assert_eq!(e.contact_email, "hr@acme.io");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn provision_rejects_bad_slug_and_system_tenant() {
        let id = TenantId::new();
        assert!(Tenant::empty(id).handle(&provision(id, "acme corp")).is_err());
        assert!(Tenant::empty(id).handle(&provision(id, "-acme")).is_err());

        let sys = TenantId::system();
        assert!(Tenant::empty(sys).handle(&provision(sys, "platform")).is_err());
    }

    #[test]
    fn provision_twice_conflicts() {
        let tenant = provisioned();
        let err = tenant.handle(&provision(*tenant.id(), "acme")).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn zero_seats_rejected() {
        let tenant = provisioned();
        let err = tenant
            .handle(&TenantCommand::ChangeSubscription(ChangeSubscription {
                tenant_id: *tenant.id(),
                subscription: Subscription {
                    plan: Plan::Basic,
                    seats: 0,
                    renews_on: None,
                },
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn suspend_and_reactivate_cycle() {
        let mut tenant = provisioned();
        let id = *tenant.id();

        let events = tenant
            .handle(&TenantCommand::Suspend(SuspendTenant {
                tenant_id: id,
                reason: Some("unpaid invoice".to_string()),
                occurred_at: test_time(),
            }))
            .unwrap();
        tenant.apply(&events[0]);
        assert_eq!(tenant.status(), TenantStatus::Suspended);

        let announce = TenantCommand::PublishAnnouncement(PublishAnnouncement {
            tenant_id: id,
            title: "Hello".to_string(),
            message: "World".to_string(),
            occurred_at: test_time(),
        });
        assert!(tenant.handle(&announce).is_err());

        let events = tenant
            .handle(&TenantCommand::Reactivate(ReactivateTenant {
                tenant_id: id,
                occurred_at: test_time(),
            }))
            .unwrap();
        tenant.apply(&events[0]);
        assert_eq!(tenant.status(), TenantStatus::Active);
        assert_eq!(tenant.handle(&announce).unwrap().len(), 1);
    }

    #[test]
    fn unchanged_profile_update_emits_nothing() {
        let tenant = provisioned();
        let events = tenant
            .handle(&TenantCommand::UpdateProfile(UpdateTenantProfile {
                tenant_id: *tenant.id(),
                name: Some("Acme Corp".to_string()),
                contact_email: None,
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    proptest! {
        #[test]
        fn normalized_slugs_are_stable(raw in "[a-zA-Z0-9][a-zA-Z0-9-]{0,40}[a-zA-Z0-9]") {
            let once = normalize_slug(&raw).unwrap();
            prop_assert_eq!(normalize_slug(&once).unwrap(), once.clone());
            prop_assert!(once.chars().all(|c| !c.is_ascii_uppercase()));
        }
    }
}
