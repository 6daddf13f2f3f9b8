//! Cron-driven report delivery.
//!
//! Schedules live in each tenant's settings stream; run state (last run,
//! last error) is kept in memory and starts empty on every boot. A schedule
//! is due when its next fire time after the last run, or after the later of
//! its creation and scheduler start, is not in the future. All times are UTC.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use aura_core::{AggregateId, TenantId};
use aura_tenancy::{ReportSchedule, TenantStatus};

use crate::mail::{MailAttachment, MailError, Mailer, OutgoingMail};
use crate::projections::ProjectionSet;
use crate::reports::{self, ReportError, ReportParams};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunState {
    pub last_run: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("report schedule not found: {0}")]
    NotFound(AggregateId),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Mail(#[from] MailError),
}

pub struct ReportScheduler {
    projections: Arc<ProjectionSet>,
    mailer: Arc<dyn Mailer>,
    started_at: DateTime<Utc>,
    runs: Mutex<HashMap<AggregateId, RunState>>,
}

impl std::fmt::Debug for ReportScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportScheduler")
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

impl ReportScheduler {
    pub fn new(projections: Arc<ProjectionSet>, mailer: Arc<dyn Mailer>) -> Self {
        Self::starting_at(projections, mailer, Utc::now())
    }

    pub fn starting_at(projections: Arc<ProjectionSet>, mailer: Arc<dyn Mailer>, started_at: DateTime<Utc>) -> Self {
        Self {
            projections,
            mailer,
            started_at,
            runs: Mutex::new(HashMap::new()),
        }
    }

    pub fn run_state(&self, schedule_id: AggregateId) -> RunState {
        self.runs
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&schedule_id)
            .cloned()
            .unwrap_or_default()
    }

    fn is_due(&self, schedule: &ReportSchedule, now: DateTime<Utc>) -> bool {
        let since = self
            .run_state(schedule.id)
            .last_run
            .unwrap_or_else(|| schedule.created_at.max(self.started_at));
        schedule.next_after(since).is_some_and(|next| next <= now)
    }

    /// Run every due schedule of every active tenant. Returns how many ran.
    pub async fn tick(&self, now: DateTime<Utc>) -> usize {
        let mut due = Vec::new();
        for tenant in self.projections.tenants.list() {
            if tenant.status != TenantStatus::Active {
                continue;
            }
            for schedule in self.projections.settings.schedules(tenant.tenant_id) {
                if self.is_due(&schedule, now) {
                    due.push((tenant.tenant_id, schedule));
                }
            }
        }

        let count = due.len();
        for (tenant_id, schedule) in due {
            // Failures are recorded in run state; the next fire time still advances.
            let _ = self.execute(tenant_id, &schedule, now).await;
        }
        count
    }

    /// Run one schedule immediately, regardless of its cron expression.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, schedule_id = %schedule_id))]
    pub async fn run_now(&self, tenant_id: TenantId, schedule_id: AggregateId) -> Result<RunState, ScheduleError> {
        let schedule = self
            .projections
            .settings
            .schedules(tenant_id)
            .into_iter()
            .find(|s| s.id == schedule_id)
            .ok_or(ScheduleError::NotFound(schedule_id))?;
        self.execute(tenant_id, &schedule, Utc::now()).await?;
        Ok(self.run_state(schedule_id))
    }

    async fn execute(&self, tenant_id: TenantId, schedule: &ReportSchedule, now: DateTime<Utc>) -> Result<(), ScheduleError> {
        let result = self.deliver(tenant_id, schedule).await;

        let state = RunState {
            last_run: Some(now),
            last_error: result.as_ref().err().map(|e| e.to_string()),
        };
        self.runs
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(schedule.id, state);

        match &result {
            Ok(()) => info!(
                tenant_id = %tenant_id,
                schedule_id = %schedule.id,
                kind = schedule.kind.as_str(),
                recipients = schedule.recipients.len(),
                "scheduled report delivered"
            ),
            Err(err) => warn!(
                tenant_id = %tenant_id,
                schedule_id = %schedule.id,
                error = %err,
                "scheduled report failed"
            ),
        }
        result
    }

    async fn deliver(&self, tenant_id: TenantId, schedule: &ReportSchedule) -> Result<(), ScheduleError> {
        let table = reports::build_report(&self.projections, tenant_id, schedule.kind, &ReportParams::default());
        let file = reports::render(&table, schedule.format)?;

        let mail = OutgoingMail {
            to: schedule.recipients.clone(),
            subject: format!("{} ({})", table.title, schedule.name),
            body: format!(
                "The scheduled report \"{}\" generated at {} UTC is attached.\n",
                schedule.name,
                table.generated_at.format("%Y-%m-%d %H:%M")
            ),
            attachments: vec![MailAttachment {
                filename: file.filename,
                content_type: file.content_type.to_string(),
                bytes: file.bytes,
            }],
        };
        self.mailer.send(mail).await?;
        Ok(())
    }

    /// Tick on a fixed interval until the returned task is aborted.
    pub fn spawn(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            info!(every_secs = every.as_secs(), "report scheduler started");
            loop {
                interval.tick().await;
                self.tick(Utc::now()).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, TimeZone};
    use serde_json::Value as JsonValue;
    use uuid::Uuid;

    use aura_events::EventEnvelope;
    use aura_tenancy::{
        ReportFormat, ReportKind, ReportScheduleAdded, Settings, SettingsEvent, SettingsInitialized,
        Subscription, Tenant, TenantEvent, TenantProvisioned, TenantSettings,
    };

    use super::*;
    use crate::mail::InMemoryMailer;
    use crate::projections::aggregate_types;

    fn envelope(tenant: TenantId, agg: AggregateId, agg_type: &'static str, event_type: &'static str, seq: u64, payload: JsonValue) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(Uuid::now_v7(), tenant, agg, agg_type, event_type, seq, Utc::now(), payload)
    }

    fn setup(created_at: DateTime<Utc>, recipient: &str) -> (Arc<ProjectionSet>, TenantId, AggregateId) {
        let set = Arc::new(ProjectionSet::new());
        let tenant = TenantId::new();
        let provisioned = TenantEvent::Provisioned(TenantProvisioned {
            tenant_id: tenant,
            name: "Acme".into(),
            slug: "acme".into(),
            contact_email: "ops@acme.io".into(),
            subscription: Subscription::default(),
            occurred_at: created_at,
        });
        set.apply(&envelope(
            TenantId::system(),
            Tenant::stream_id(tenant),
            aggregate_types::TENANT,
            "tenancy.tenant.provisioned",
            1,
            serde_json::to_value(provisioned).unwrap(),
        ))
        .unwrap();

        let stream = Settings::stream_id(tenant);
        let init = SettingsEvent::Initialized(SettingsInitialized {
            tenant_id: tenant,
            settings: TenantSettings::defaults("Acme"),
            occurred_at: created_at,
        });
        set.apply(&envelope(tenant, stream, aggregate_types::SETTINGS, "tenancy.settings.initialized", 1, serde_json::to_value(init).unwrap()))
            .unwrap();

        let schedule = ReportSchedule {
            id: AggregateId::new(),
            name: "Daily headcount".into(),
            cron: "0 0 8 * * *".into(),
            kind: ReportKind::Employees,
            format: ReportFormat::Csv,
            recipients: vec![recipient.to_string()],
            created_at,
        };
        let id = schedule.id;
        let added = SettingsEvent::ReportScheduleAdded(ReportScheduleAdded {
            tenant_id: tenant,
            schedule,
            occurred_at: created_at,
        });
        set.apply(&envelope(
            tenant,
            stream,
            aggregate_types::SETTINGS,
            "tenancy.settings.report_schedule_added",
            2,
            serde_json::to_value(added).unwrap(),
        ))
        .unwrap();
        (set, tenant, id)
    }

    #[tokio::test]
    async fn due_schedule_runs_once_per_fire_time() {
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap();
        let (set, _tenant, id) = setup(t0, "hr@acme.io");
        let mailer = Arc::new(InMemoryMailer::new());
        let scheduler = ReportScheduler::starting_at(set, mailer.clone(), t0);

        assert_eq!(scheduler.tick(t0 + ChronoDuration::hours(1)).await, 0);

        let at_eight = t0 + ChronoDuration::hours(2);
        assert_eq!(scheduler.tick(at_eight).await, 1);
        assert_eq!(scheduler.tick(at_eight + ChronoDuration::minutes(5)).await, 0);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["hr@acme.io".to_string()]);
        assert!(sent[0].attachments[0].filename.ends_with(".csv"));
        assert_eq!(scheduler.run_state(id).last_run, Some(at_eight));
        assert!(scheduler.run_state(id).last_error.is_none());

        assert_eq!(scheduler.tick(at_eight + ChronoDuration::days(1)).await, 1);
        assert_eq!(mailer.sent().len(), 2);
    }

    #[tokio::test]
    async fn failed_delivery_is_recorded() {
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap();
        let (set, tenant, id) = setup(t0, "bad address");
        let scheduler = ReportScheduler::starting_at(set, Arc::new(InMemoryMailer::new()), t0);

        assert!(matches!(scheduler.run_now(tenant, id).await, Err(ScheduleError::Mail(_))));
        let state = scheduler.run_state(id);
        assert!(state.last_run.is_some());
        assert!(state.last_error.is_some_and(|e| e.contains("bad address")));

        assert!(matches!(
            scheduler.run_now(tenant, AggregateId::new()).await,
            Err(ScheduleError::NotFound(_))
        ));
    }
}
