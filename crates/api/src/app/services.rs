//! Infrastructure wiring: event store, bus, projections, scheduler.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use aura_auth::{CreateUser, Hs256JwtIssuer, Role, User, UserCommand, hash_password};
use aura_core::{Aggregate, AggregateId, DomainError, TenantId, UserId};
use aura_events::{EventBus, EventEnvelope, InMemoryEventBus};
use aura_tenancy::TenantSettings;
use aura_infra::{
    command_dispatcher::{CommandDispatcher, DispatchError},
    event_store::{EventStore, InMemoryEventStore, StoredEvent},
    mail::{InMemoryMailer, Mailer, SmtpMailer},
    projections::{ProjectionSet, aggregate_types},
    scheduler::ReportScheduler,
    workers::{ProjectionWorker, WorkerHandle},
};

use crate::config::{AppConfig, BootstrapAdmin};

type SharedStore = Arc<dyn EventStore>;
type SharedBus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type Dispatcher = CommandDispatcher<SharedStore, SharedBus>;

pub struct AppServices {
    dispatcher: Dispatcher,
    projections: Arc<ProjectionSet>,
    issuer: Hs256JwtIssuer,
    scheduler: Arc<ReportScheduler>,
    worker: Mutex<Option<WorkerHandle>>,
    scheduler_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppServices").finish_non_exhaustive()
    }
}

/// Pick the event store and mailer from configuration and wire everything.
pub async fn build_services(config: &AppConfig, jwt_secret: &str) -> anyhow::Result<Arc<AppServices>> {
    let store = build_store(config).await?;
    let mailer: Arc<dyn Mailer> = match config.smtp_settings() {
        Some(smtp) => Arc::new(SmtpMailer::new(&smtp).context("smtp configuration")?),
        None => {
            info!("no smtp host configured; scheduled reports go to the in-memory outbox");
            Arc::new(InMemoryMailer::new())
        }
    };
    let issuer = Hs256JwtIssuer::new(jwt_secret, chrono::Duration::minutes(config.token_ttl_minutes));

    let services = Arc::new(AppServices::new(store, mailer, issuer)?);
    services.rebuild()?;
    services.bootstrap_system_admin(&config.bootstrap_admin)?;
    Ok(services)
}

async fn build_store(config: &AppConfig) -> anyhow::Result<SharedStore> {
    if !config.use_persistent_stores {
        return Ok(Arc::new(InMemoryEventStore::new()));
    }

    #[cfg(feature = "postgres")]
    {
        let url = config
            .database_url
            .as_deref()
            .context("database_url is required for persistent stores")?;
        let store = aura_infra::event_store::PostgresEventStore::connect(url).await?;
        store.migrate().await?;
        info!("using postgres event store");
        Ok(Arc::new(store))
    }
    #[cfg(not(feature = "postgres"))]
    {
        warn!("use_persistent_stores=true but the postgres feature is not enabled; falling back to in-memory");
        Ok(Arc::new(InMemoryEventStore::new()))
    }
}

impl AppServices {
    pub fn new(store: SharedStore, mailer: Arc<dyn Mailer>, issuer: Hs256JwtIssuer) -> anyhow::Result<Self> {
        let bus: SharedBus = Arc::new(InMemoryEventBus::new());
        let projections = Arc::new(ProjectionSet::new());

        // Background subscriber: bus -> projections. Redeliveries of events
        // already applied on the request path are skipped by the cursors.
        let worker = {
            let projections = projections.clone();
            ProjectionWorker::spawn("projections", bus.subscribe(), move |env: EventEnvelope<JsonValue>| {
                projections.apply(&env)
            })
            .context("spawn projection worker")?
        };

        let scheduler = Arc::new(ReportScheduler::new(projections.clone(), mailer));

        Ok(Self {
            dispatcher: CommandDispatcher::new(store, bus),
            projections,
            issuer,
            scheduler,
            worker: Mutex::new(Some(worker)),
            scheduler_task: Mutex::new(None),
        })
    }

    /// Dispatch and apply the committed events before returning, so the
    /// caller reads its own writes.
    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: aura_events::Event + Serialize + DeserializeOwned,
    {
        let committed = self
            .dispatcher
            .dispatch::<A>(tenant_id, aggregate_id, aggregate_type, command, make_aggregate)?;
        self.projections.apply_committed(&committed);
        Ok(committed)
    }

    pub fn projections(&self) -> &ProjectionSet {
        &self.projections
    }

    /// Settings of `tenant_id`; defaults when the tenant has no settings stream.
    pub fn settings_for(&self, tenant_id: TenantId) -> TenantSettings {
        self.projections
            .settings
            .get(tenant_id)
            .map(|s| s.settings)
            .unwrap_or_else(|| TenantSettings::defaults("Aura HRMS"))
    }

    pub fn issuer(&self) -> &Hs256JwtIssuer {
        &self.issuer
    }

    pub fn scheduler(&self) -> &Arc<ReportScheduler> {
        &self.scheduler
    }

    /// Replay the whole event log into fresh read models.
    pub fn rebuild(&self) -> anyhow::Result<usize> {
        let events = self.dispatcher.store().load_all().context("load event log")?;
        let count = self.projections.rebuild(&events).context("rebuild read models")?;
        Ok(count)
    }

    /// Create the configured system administrator if it does not exist yet.
    pub fn bootstrap_system_admin(&self, admin: &BootstrapAdmin) -> anyhow::Result<()> {
        let system = TenantId::system();
        if self.projections.users.get_by_email(system, &admin.email).is_some() {
            return Ok(());
        }
        let Some(password) = admin.password.as_deref() else {
            warn!(email = %admin.email, "no bootstrap admin password configured; system admin not created");
            return Ok(());
        };

        let user_id = UserId::new();
        let cmd = UserCommand::Create(CreateUser {
            tenant_id: system,
            user_id,
            email: admin.email.clone(),
            display_name: "System Administrator".to_string(),
            password_hash: hash_password(password).context("hash bootstrap password")?,
            roles: vec![Role::SYSTEM_ADMIN],
            employee_id: None,
            occurred_at: Utc::now(),
        });
        self.dispatch::<User>(system, user_id.into(), aggregate_types::USER, cmd, |_, id| User::empty(id.into()))
            .map_err(|e| anyhow::anyhow!("bootstrap system admin: {e}"))?;
        info!(email = %admin.email, "bootstrap system admin created");
        Ok(())
    }

    pub fn start_scheduler(&self, every: Duration) {
        let handle = self.scheduler.clone().spawn(every);
        if let Some(old) = self
            .scheduler_task
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .replace(handle)
        {
            old.abort();
        }
    }

    pub fn shutdown(&self) {
        if let Some(task) = self.scheduler_task.lock().unwrap_or_else(|p| p.into_inner()).take() {
            task.abort();
        }
        if let Some(worker) = self.worker.lock().unwrap_or_else(|p| p.into_inner()).take() {
            worker.shutdown();
        }
    }
}
