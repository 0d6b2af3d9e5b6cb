//! Gateway context: the lazily built capability handles shared by every
//! session, and the factory that builds them.

use std::sync::{Arc, OnceLock};

use anyhow::Context as _;
use async_trait::async_trait;
use chrono_tz::Tz;
use tracing::info;

use crate::auth::OAuthSession;
use crate::calendar::{GoogleCalendarClient, SchedulingCapability};
use crate::config::Config;
use crate::credentials::{store_for, CredentialStore};
use crate::mail::{GmailClient, MailCapability};

/// Builds capability handles on first use.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn build_mail(&self) -> anyhow::Result<Arc<dyn MailCapability>>;
    async fn build_scheduling(&self) -> anyhow::Result<Arc<dyn SchedulingCapability>>;
}

/// Production factory: resolves credentials from the configured store and
/// wraps them in Google API clients.
pub struct GoogleClientFactory {
    store: Arc<dyn CredentialStore>,
    http: reqwest::Client,
    time_zone: Tz,
}

impl GoogleClientFactory {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        Self::with_store(store_for(&config.mode, http.clone()), http, config.time_zone)
    }

    pub fn with_store(store: Arc<dyn CredentialStore>, http: reqwest::Client, time_zone: Tz) -> Self {
        Self {
            store,
            http,
            time_zone,
        }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Resolve credentials and token into an authenticated session.
    pub async fn session(&self) -> anyhow::Result<Arc<OAuthSession>> {
        let credentials = self.store.resolve_credentials().await?;
        let token = self.store.resolve_token().await?;
        Ok(Arc::new(OAuthSession::new(
            self.http.clone(),
            credentials,
            token,
        )))
    }
}

#[async_trait]
impl ClientFactory for GoogleClientFactory {
    async fn build_mail(&self) -> anyhow::Result<Arc<dyn MailCapability>> {
        Ok(Arc::new(GmailClient::new(self.session().await?)))
    }

    async fn build_scheduling(&self) -> anyhow::Result<Arc<dyn SchedulingCapability>> {
        Ok(Arc::new(GoogleCalendarClient::new(
            self.session().await?,
            self.time_zone,
        )))
    }
}

/// Owns the two write-once capability handles.
///
/// Concurrent first calls may each build a handle; the first one stored
/// is kept and the others are dropped.
pub struct GatewayContext {
    factory: Arc<dyn ClientFactory>,
    mail: OnceLock<Arc<dyn MailCapability>>,
    scheduling: OnceLock<Arc<dyn SchedulingCapability>>,
}

impl GatewayContext {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            mail: OnceLock::new(),
            scheduling: OnceLock::new(),
        }
    }

    pub async fn mail(&self) -> anyhow::Result<Arc<dyn MailCapability>> {
        if let Some(handle) = self.mail.get() {
            return Ok(handle.clone());
        }
        let built = self
            .factory
            .build_mail()
            .await
            .context("failed to initialise mail client")?;
        info!("mail client initialised");
        Ok(self.mail.get_or_init(|| built).clone())
    }

    pub async fn scheduling(&self) -> anyhow::Result<Arc<dyn SchedulingCapability>> {
        if let Some(handle) = self.scheduling.get() {
            return Ok(handle.clone());
        }
        let built = self
            .factory
            .build_scheduling()
            .await
            .context("failed to initialise calendar client")?;
        info!("calendar client initialised");
        Ok(self.scheduling.get_or_init(|| built).clone())
    }

    pub fn mail_ready(&self) -> bool {
        self.mail.get().is_some()
    }

    pub fn scheduling_ready(&self) -> bool {
        self.scheduling.get().is_some()
    }
}
