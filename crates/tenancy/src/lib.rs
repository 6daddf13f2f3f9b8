//! Tenancy domain module: the tenant registry and per-tenant settings.
//!
//! Tenant streams live in the system tenant (they describe tenants, they are
//! not owned by them). Settings streams live inside each tenant.

pub mod schedule;
pub mod settings;
pub mod tenant;

pub use schedule::{ReportFormat, ReportKind, ReportSchedule, parse_cron};
pub use settings::{
    AddReportSchedule, InitializeSettings, NotificationToggles, RemoveReportSchedule,
    ReportScheduleAdded, ReportScheduleRemoved, Settings, SettingsCommand, SettingsEvent,
    SettingsInitialized, SettingsPatch, SettingsUpdated, TenantSettings, UpdateSettings,
};
pub use tenant::{
    AnnouncementPublished, ChangeSubscription, Plan, ProvisionTenant, PublishAnnouncement,
    ReactivateTenant, Subscription, SubscriptionChanged, SuspendTenant, Tenant, TenantCommand,
    TenantEvent, TenantProfileUpdated, TenantProvisioned, TenantReactivated, TenantStatus,
    TenantSuspended, UpdateTenantProfile, normalize_slug,
};
