//! Per-tenant settings (one stream per tenant).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aura_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, require_non_blank};
use aura_events::Event;

use crate::ReportSchedule;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationToggles {
    pub leave_decisions: bool,
    pub payslips: bool,
    pub tickets: bool,
    pub announcements: bool,
}

impl Default for NotificationToggles {
    fn default() -> Self {
        Self {
            leave_decisions: true,
            payslips: true,
            tickets: true,
            announcements: true,
        }
    }
}

/// Current values of a tenant's settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSettings {
    pub company_name: String,
    pub timezone: String,
    /// ISO 4217 code.
    pub currency: String,
    pub working_days_per_month: u32,
    pub annual_leave_days: u32,
    /// Day of month payslips are paid.
    pub payroll_day: u32,
    pub notifications: NotificationToggles,
}

impl TenantSettings {
    pub fn defaults(company_name: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            timezone: "UTC".to_string(),
            currency: "USD".to_string(),
            working_days_per_month: 22,
            annual_leave_days: 20,
            payroll_day: 25,
            notifications: NotificationToggles::default(),
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        require_non_blank("company_name", &self.company_name)?;
        require_non_blank("timezone", &self.timezone)?;
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(DomainError::validation("currency must be a 3-letter ISO 4217 code"));
        }
        if !(1..=31).contains(&self.working_days_per_month) {
            return Err(DomainError::validation("working_days_per_month must be within 1..=31"));
        }
        if self.annual_leave_days > 365 {
            return Err(DomainError::validation("annual_leave_days must not exceed 365"));
        }
        if !(1..=28).contains(&self.payroll_day) {
            return Err(DomainError::validation("payroll_day must be within 1..=28"));
        }
        Ok(())
    }
}

/// Partial update; `None` keeps the current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SettingsPatch {
    pub company_name: Option<String>,
    pub timezone: Option<String>,
    pub currency: Option<String>,
    pub working_days_per_month: Option<u32>,
    pub annual_leave_days: Option<u32>,
    pub payroll_day: Option<u32>,
    pub notifications: Option<NotificationToggles>,
}

impl SettingsPatch {
    pub fn apply_to(&self, current: &TenantSettings) -> TenantSettings {
        TenantSettings {
            company_name: self
                .company_name
                .as_ref()
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|| current.company_name.clone()),
            timezone: self
                .timezone
                .as_ref()
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|| current.timezone.clone()),
            currency: self
                .currency
                .as_ref()
                .map(|s| s.trim().to_ascii_uppercase())
                .unwrap_or_else(|| current.currency.clone()),
            working_days_per_month: self.working_days_per_month.unwrap_or(current.working_days_per_month),
            annual_leave_days: self.annual_leave_days.unwrap_or(current.annual_leave_days),
            payroll_day: self.payroll_day.unwrap_or(current.payroll_day),
            notifications: self
                .notifications
                .clone()
                .unwrap_or_else(|| current.notifications.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    id: AggregateId,
    tenant_id: Option<TenantId>,
    values: TenantSettings,
    schedules: Vec<ReportSchedule>,
    version: u64,
    created: bool,
}

impl Settings {
    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            tenant_id: None,
            values: TenantSettings::defaults(String::new()),
            schedules: Vec::new(),
            version: 0,
            created: false,
        }
    }

    /// Every tenant has exactly one settings stream at this id.
    pub fn stream_id(tenant_id: TenantId) -> AggregateId {
        AggregateId::derived("tenancy.settings", tenant_id, &[])
    }

    pub fn values(&self) -> &TenantSettings {
        &self.values
    }

    pub fn schedules(&self) -> &[ReportSchedule] {
        &self.schedules
    }

    fn ensure_created(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }
}

impl AggregateRoot for Settings {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeSettings {
    pub tenant_id: TenantId,
    pub company_name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSettings {
    pub tenant_id: TenantId,
    pub patch: SettingsPatch,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddReportSchedule {
    pub tenant_id: TenantId,
    pub schedule: ReportSchedule,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveReportSchedule {
    pub tenant_id: TenantId,
    pub schedule_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingsCommand {
    Initialize(InitializeSettings),
    Update(UpdateSettings),
    AddReportSchedule(AddReportSchedule),
    RemoveReportSchedule(RemoveReportSchedule),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsInitialized {
    pub tenant_id: TenantId,
    pub settings: TenantSettings,
    pub occurred_at: DateTime<Utc>,
}

/// Carries the full post-update values, not the patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsUpdated {
    pub tenant_id: TenantId,
    pub settings: TenantSettings,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportScheduleAdded {
    pub tenant_id: TenantId,
    pub schedule: ReportSchedule,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportScheduleRemoved {
    pub tenant_id: TenantId,
    pub schedule_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingsEvent {
    Initialized(SettingsInitialized),
    Updated(SettingsUpdated),
    ReportScheduleAdded(ReportScheduleAdded),
    ReportScheduleRemoved(ReportScheduleRemoved),
}

impl Event for SettingsEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SettingsEvent::Initialized(_) => "tenancy.settings.initialized",
            SettingsEvent::Updated(_) => "tenancy.settings.updated",
            SettingsEvent::ReportScheduleAdded(_) => "tenancy.settings.report_schedule_added",
            SettingsEvent::ReportScheduleRemoved(_) => "tenancy.settings.report_schedule_removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SettingsEvent::Initialized(e) => e.occurred_at,
            SettingsEvent::Updated(e) => e.occurred_at,
            SettingsEvent::ReportScheduleAdded(e) => e.occurred_at,
            SettingsEvent::ReportScheduleRemoved(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Settings {
    type Command = SettingsCommand;
    type Event = SettingsEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SettingsEvent::Initialized(e) => {
                self.tenant_id = Some(e.tenant_id);
                self.values = e.settings.clone();
                self.created = true;
            }
            SettingsEvent::Updated(e) => self.values = e.settings.clone(),
            SettingsEvent::ReportScheduleAdded(e) => self.schedules.push(e.schedule.clone()),
            SettingsEvent::ReportScheduleRemoved(e) => self.schedules.retain(|s| s.id != e.schedule_id),
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SettingsCommand::Initialize(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("settings already initialized"));
                }
                let settings = TenantSettings::defaults(cmd.company_name.trim());
                settings.validate()?;
                Ok(vec![SettingsEvent::Initialized(SettingsInitialized {
                    tenant_id: cmd.tenant_id,
                    settings,
                    occurred_at: cmd.occurred_at,
                })])
            }
            SettingsCommand::Update(cmd) => {
                self.ensure_created(cmd.tenant_id)?;
                let next = cmd.patch.apply_to(&self.values);
                next.validate()?;
                if next == self.values {
                    return Ok(vec![]);
                }
                Ok(vec![SettingsEvent::Updated(SettingsUpdated {
                    tenant_id: cmd.tenant_id,
                    settings: next,
                    occurred_at: cmd.occurred_at,
                })])
            }
            SettingsCommand::AddReportSchedule(cmd) => {
                self.ensure_created(cmd.tenant_id)?;
                cmd.schedule.validate()?;
                if self.schedules.iter().any(|s| s.id == cmd.schedule.id) {
                    return Err(DomainError::conflict("schedule already exists"));
                }
                let mut schedule = cmd.schedule.clone();
                schedule.name = schedule.name.trim().to_string();
                schedule.cron = schedule.cron.trim().to_string();
                for r in &mut schedule.recipients {
                    *r = r.trim().to_lowercase();
                }
                Ok(vec![SettingsEvent::ReportScheduleAdded(ReportScheduleAdded {
                    tenant_id: cmd.tenant_id,
                    schedule,
                    occurred_at: cmd.occurred_at,
                })])
            }
            SettingsCommand::RemoveReportSchedule(cmd) => {
                self.ensure_created(cmd.tenant_id)?;
                if !self.schedules.iter().any(|s| s.id == cmd.schedule_id) {
                    return Err(DomainError::not_found());
                }
                Ok(vec![SettingsEvent::ReportScheduleRemoved(ReportScheduleRemoved {
                    tenant_id: cmd.tenant_id,
                    schedule_id: cmd.schedule_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ReportFormat, ReportKind};

    fn initialized(tenant_id: TenantId) -> Settings {
        let mut settings = Settings::empty(Settings::stream_id(tenant_id));
        let events = settings
            .handle(&SettingsCommand::Initialize(InitializeSettings {
                tenant_id,
                company_name: "Acme".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for ev in &events {
            settings.apply(ev);
        }
        settings
    }

    fn update(tenant_id: TenantId, patch: SettingsPatch) -> SettingsCommand {
        SettingsCommand::Update(UpdateSettings {
            tenant_id,
            patch,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn stream_id_is_per_tenant() {
        let a = TenantId::new();
        assert_eq!(Settings::stream_id(a), Settings::stream_id(a));
        assert_ne!(Settings::stream_id(a), Settings::stream_id(TenantId::new()));
    }

    #[test]
    fn patch_keeps_untouched_fields() {
        let tenant_id = TenantId::new();
        let mut settings = initialized(tenant_id);
        let events = settings
            .handle(&update(
                tenant_id,
                SettingsPatch {
                    currency: Some("eur".to_string()),
                    payroll_day: Some(28),
                    ..Default::default()
                },
            ))
            .unwrap();
        settings.apply(&events[0]);

        assert_eq!(settings.values().currency, "EUR");
        assert_eq!(settings.values().payroll_day, 28);
        assert_eq!(settings.values().working_days_per_month, 22);
        assert_eq!(settings.values().company_name, "Acme");
    }

    #[test]
    fn out_of_range_values_rejected() {
        let tenant_id = TenantId::new();
        let settings = initialized(tenant_id);
        for patch in [
            SettingsPatch {
                working_days_per_month: Some(0),
                ..Default::default()
            },
            SettingsPatch {
                payroll_day: Some(31),
                ..Default::default()
            },
            SettingsPatch {
                currency: Some("EURO".to_string()),
                ..Default::default()
            },
            SettingsPatch {
                timezone: Some("  ".to_string()),
                ..Default::default()
            },
        ] {
            let err = settings.handle(&update(tenant_id, patch)).unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }
    }

    #[test]
    fn update_before_initialize_is_not_found() {
        let tenant_id = TenantId::new();
        let settings = Settings::empty(Settings::stream_id(tenant_id));
        assert_eq!(
            settings.handle(&update(tenant_id, SettingsPatch::default())).unwrap_err(),
            DomainError::NotFound
        );
    }

    #[test]
    fn schedules_are_added_and_removed() {
        let tenant_id = TenantId::new();
        let mut settings = initialized(tenant_id);
        let schedule = ReportSchedule {
            id: AggregateId::new(),
            name: " Weekly attendance ".to_string(),
            cron: "0 0 7 * * Mon".to_string(),
            kind: ReportKind::Attendance,
            format: ReportFormat::Xlsx,
            recipients: vec!["HR@acme.io".to_string()],
            created_at: Utc::now(),
        };

        let events = settings
            .handle(&SettingsCommand::AddReportSchedule(AddReportSchedule {
                tenant_id,
                schedule: schedule.clone(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        settings.apply(&events[0]);
        assert_eq!(settings.schedules().len(), 1);
        assert_eq!(settings.schedules()[0].recipients, vec!["hr@acme.io".to_string()]);
        assert_eq!(settings.schedules()[0].name, "Weekly attendance");

        let remove = SettingsCommand::RemoveReportSchedule(RemoveReportSchedule {
            tenant_id,
            schedule_id: schedule.id,
            occurred_at: Utc::now(),
        });
        let events = settings.handle(&remove).unwrap();
        settings.apply(&events[0]);
        assert!(settings.schedules().is_empty());
        assert_eq!(settings.handle(&remove).unwrap_err(), DomainError::NotFound);
    }
}
