use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;

use farmcred_identity::IdentityClient;
use farmcred_location::{HttpReverseGeocoder, LocationCapture, ReverseGeocoder};
use farmcred_media::{HttpPhotoUploader, PhotoRules, PhotoUploader};
use farmcred_store::{AgentStore, AuditLog, FileStore, InMemoryStore, RequestStore};
use farmcred_workflow::{AgentMatcher, VerificationWorkflow};

use crate::config::FarmCredConfig;

#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<VerificationWorkflow>,
    pub agents: Arc<dyn AgentStore>,
    pub identity: Arc<IdentityClient>,
    pub photo_rules: Arc<PhotoRules>,
    pub uploader: Option<Arc<dyn PhotoUploader>>,
    pub location: Arc<LocationCapture>,
    pub matcher: Arc<AgentMatcher>,
    pub watch_interval: Duration,
    pub shutdown_rx: watch::Receiver<bool>,
}

impl AppState {
    /// Build the state from config, persisting under `state_dir` when enabled.
    pub fn from_config(
        config: &FarmCredConfig,
        state_dir: &Path,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Self> {
        if config.persist {
            let store = FileStore::open(state_dir)
                .with_context(|| format!("Failed to open state in {}", state_dir.display()))?;
            tracing::info!(path = %store.path().display(), "using file store");
            Self::with_store(Arc::new(store), config, shutdown_rx)
        } else {
            tracing::info!("using in-memory store");
            Self::with_store(Arc::new(InMemoryStore::new()), config, shutdown_rx)
        }
    }

    /// Wire every service around one store that holds requests, agents and
    /// the audit trail.
    pub fn with_store<S>(
        store: Arc<S>,
        config: &FarmCredConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Self>
    where
        S: RequestStore + AgentStore + AuditLog + 'static,
    {
        let workflow = Arc::new(VerificationWorkflow::new(
            store.clone(),
            store.clone(),
            config.workflow.clone(),
        ));
        let identity = IdentityClient::new(config.identity.clone())
            .context("Failed to build identity client")?;

        let uploader: Option<Arc<dyn PhotoUploader>> = match &config.storage.api_key {
            Some(key) if !key.is_empty() => {
                let uploader: Arc<dyn PhotoUploader> = Arc::new(
                    HttpPhotoUploader::new(
                        config.storage.base_url.clone(),
                        key.clone(),
                        Duration::from_secs(config.storage.timeout_secs),
                    )
                    .context("Failed to build photo uploader")?,
                );
                Some(uploader)
            }
            _ => {
                tracing::warn!("photo storage API key not set, uploads are disabled");
                None
            }
        };

        let geocoding_timeout = Duration::from_secs(config.geocoding.timeout_secs);
        let geocoder: Arc<dyn ReverseGeocoder> = Arc::new(
            HttpReverseGeocoder::new(config.geocoding.base_url.clone(), geocoding_timeout)
                .context("Failed to build reverse geocoder")?,
        );

        Ok(Self {
            workflow,
            agents: store,
            identity: Arc::new(identity),
            photo_rules: Arc::new(config.photos.clone()),
            uploader,
            location: Arc::new(LocationCapture::new(geocoder, geocoding_timeout)),
            matcher: Arc::new(AgentMatcher::new(config.search_radius_km)),
            watch_interval: Duration::from_secs(config.watch_interval_secs.max(1)),
            shutdown_rx,
        })
    }
}
