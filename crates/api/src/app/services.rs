//! Infrastructure wiring: store backend, notification dispatchers and the
//! provisioning service they feed.

use std::sync::Arc;

use anyhow::Context;

use studiodesk_infra::config::{NotificationMode, StudioConfig};
use studiodesk_infra::notify::{
    BackgroundDispatcher, DelayedDispatcher, HttpEmailDispatcher, HttpFollowupDispatcher,
    InMemoryNotifier, LogNotifier, NotificationDispatcher, TokioDelayedDispatcher,
};
use studiodesk_infra::store::{InMemoryStudioStore, PostgresStudioStore, StudioStore};
use studiodesk_infra::{ProvisioningService, ProvisioningSettings};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    InMemory,
    Postgres,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::InMemory => "in_memory",
            StoreBackend::Postgres => "postgres",
        }
    }
}

#[derive(Clone)]
pub struct AppServices {
    provisioning: ProvisioningService,
    backend: StoreBackend,
}

impl AppServices {
    pub fn new(provisioning: ProvisioningService, backend: StoreBackend) -> Self {
        Self {
            provisioning,
            backend,
        }
    }

    /// Dev/test wiring: in-memory store, recording notifier for both roles.
    pub fn in_memory(
        store: Arc<InMemoryStudioStore>,
        notifier: Arc<InMemoryNotifier>,
        settings: ProvisioningSettings,
    ) -> Self {
        let provisioning =
            ProvisioningService::new(store, notifier.clone(), notifier, settings);
        Self::new(provisioning, StoreBackend::InMemory)
    }

    pub fn provisioning(&self) -> &ProvisioningService {
        &self.provisioning
    }

    pub fn backend(&self) -> StoreBackend {
        self.backend
    }
}

/// Build services from configuration. A database URL selects Postgres
/// (migrations are applied on start-up); otherwise the in-memory store is used.
pub async fn build_services(cfg: &StudioConfig) -> anyhow::Result<AppServices> {
    let settings = cfg
        .provisioning_settings()
        .context("invalid provisioning settings")?;

    let (store, backend): (Arc<dyn StudioStore>, StoreBackend) = match cfg.database.url.as_deref() {
        Some(url) => {
            let store = PostgresStudioStore::connect(url, cfg.database.max_connections)
                .await
                .context("failed to connect to postgres")?;
            store.migrate().await.context("failed to apply migrations")?;
            (Arc::new(store), StoreBackend::Postgres)
        }
        None => {
            tracing::warn!("no database url configured; using in-memory store");
            (Arc::new(InMemoryStudioStore::new()), StoreBackend::InMemory)
        }
    };

    let (notifier, followups) = build_dispatchers(cfg, &settings);
    if !notifier.is_configured() || !followups.is_configured() {
        tracing::warn!("notification credentials missing; provisioning requests will be refused");
    }

    tracing::info!(
        backend = backend.as_str(),
        notifications = ?cfg.notifications.mode,
        "services initialised"
    );
    Ok(AppServices::new(
        ProvisioningService::new(store, notifier, followups, settings),
        backend,
    ))
}

fn build_dispatchers(
    cfg: &StudioConfig,
    settings: &ProvisioningSettings,
) -> (Arc<dyn NotificationDispatcher>, Arc<dyn DelayedDispatcher>) {
    match cfg.notifications.mode {
        NotificationMode::Log => (Arc::new(LogNotifier), Arc::new(LogNotifier)),
        NotificationMode::Http => {
            let email: Arc<dyn NotificationDispatcher> = Arc::new(HttpEmailDispatcher::new(
                cfg.notifications.email_url.clone(),
                cfg.notifications.api_key.clone(),
            ));
            // Confirmations go out on their own task; the booking response
            // does not wait on the mail service.
            let immediate: Arc<dyn NotificationDispatcher> =
                Arc::new(BackgroundDispatcher::new(email.clone()));
            // Without an external scheduler, follow-ups are timed in-process.
            let followups: Arc<dyn DelayedDispatcher> = match &cfg.notifications.followup_url {
                Some(url) => Arc::new(HttpFollowupDispatcher::new(
                    Some(url.clone()),
                    cfg.notifications.api_key.clone(),
                    settings.followup_delay_cap,
                )),
                None => Arc::new(TokioDelayedDispatcher::new(
                    email.clone(),
                    settings.followup_delay_cap,
                )),
            };
            (immediate, followups)
        }
    }
}
