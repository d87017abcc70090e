//! Shared, per-process cluster access settings.
//!
//! Adapters hold an `Arc<ClusterAccess>` and ask it for a fresh client on
//! every invocation. The kubeconfig is re-read each time, so a context
//! switch takes effect on the very next request.

use std::{
    path::PathBuf,
    sync::{Mutex, RwLock},
    time::Duration,
};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use kubevox_contracts::error::{KubevoxError, KubevoxResult};

use crate::{
    client::ClusterClient,
    error::ClusterError,
    exec::{self, ExecPlugin},
    kubeconfig::{self, Credentials, Kubeconfig, ResolvedContext},
};

/// Plugin-issued credentials are reused until this close to their expiry.
const EXPIRY_MARGIN_SECS: i64 = 30;

/// Published marker holding the latest stable Kubernetes release.
pub const STABLE_RELEASE_URL: &str = "https://dl.k8s.io/release/stable.txt";

#[derive(Debug, Clone)]
pub struct ClusterSettings {
    /// Explicit kubeconfig path. `None` means `$KUBECONFIG` or `~/.kube/config`.
    pub kubeconfig: Option<PathBuf>,
    /// Context to use instead of the kubeconfig's `current-context`.
    pub context: Option<String>,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    pub release_url: String,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            context: None,
            request_timeout: Duration::from_secs(8),
            release_url: STABLE_RELEASE_URL.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct ClusterAccess {
    settings: ClusterSettings,
    context_override: RwLock<Option<String>>,
    public: reqwest::Client,
    exec_cache: Mutex<Option<CachedCredentials>>,
}

#[derive(Debug)]
struct CachedCredentials {
    context: String,
    plugin: ExecPlugin,
    credentials: Credentials,
    expires: DateTime<Utc>,
}

impl ClusterAccess {
    pub fn new(settings: ClusterSettings) -> KubevoxResult<Self> {
        let public = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| KubevoxError::ConfigError {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            context_override: RwLock::new(settings.context.clone()),
            settings,
            public,
            exec_cache: Mutex::new(None),
        })
    }

    pub fn kubeconfig_path(&self) -> Result<PathBuf, ClusterError> {
        match &self.settings.kubeconfig {
            Some(path) => Ok(path.clone()),
            None => kubeconfig::default_path(),
        }
    }

    pub fn load_kubeconfig(&self) -> Result<(PathBuf, Kubeconfig), ClusterError> {
        let path = self.kubeconfig_path()?;
        let config = Kubeconfig::load(&path)?;
        Ok((path, config))
    }

    /// The context in effect: the session override, else `current-context`.
    pub fn active_context(&self, config: &Kubeconfig) -> Option<String> {
        self.context_override
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .or_else(|| config.current_context.clone())
    }

    /// Resolve the active context and build a client for it.
    ///
    /// A user configured with an exec plugin has the plugin run here; its
    /// credentials are cached while they carry an unexpired expiry.
    pub async fn connect(&self) -> Result<(ClusterClient, ResolvedContext), ClusterError> {
        let (path, config) = self.load_kubeconfig()?;
        let base_dir = path.parent().map(PathBuf::from).unwrap_or_default();
        let context = self.active_context(&config);
        let mut resolved = config.resolve(context.as_deref(), &base_dir)?;
        if let Credentials::Exec(plugin) = resolved.credentials.clone() {
            resolved.credentials = self.exec_credentials(&resolved.context, &plugin).await?;
        }
        let client = ClusterClient::connect(&resolved, self.settings.request_timeout)?;
        Ok((client, resolved))
    }

    async fn exec_credentials(
        &self,
        context: &str,
        plugin: &ExecPlugin,
    ) -> Result<Credentials, ClusterError> {
        if let Some(credentials) = self.cached_credentials(context, plugin) {
            debug!(context = %context, "reusing plugin-issued credentials");
            return Ok(credentials);
        }

        let issued = exec::run(plugin, self.settings.request_timeout).await?;
        if let Some(expires) = issued.expires {
            *self.exec_cache.lock().unwrap_or_else(|e| e.into_inner()) = Some(CachedCredentials {
                context: context.to_string(),
                plugin: plugin.clone(),
                credentials: issued.credentials.clone(),
                expires,
            });
        }
        Ok(issued.credentials)
    }

    fn cached_credentials(&self, context: &str, plugin: &ExecPlugin) -> Option<Credentials> {
        let fresh_until = Utc::now() + chrono::Duration::seconds(EXPIRY_MARGIN_SECS);
        self.exec_cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .filter(|c| c.context == context && &c.plugin == plugin && c.expires > fresh_until)
            .map(|c| c.credentials.clone())
    }

    /// Persist `context` as current and make it this session's context.
    pub fn switch_context(&self, context: &str) -> Result<(), ClusterError> {
        let path = self.kubeconfig_path()?;
        kubeconfig::set_current_context(&path, context)?;
        let mut current = self.context_override.write().unwrap_or_else(|e| e.into_inner());
        if current.is_some() {
            debug!(context = %context, "replacing session context override");
            *current = Some(context.to_string());
        }
        Ok(())
    }

    /// Latest stable release, or `None` when the marker cannot be fetched.
    pub async fn latest_stable_version(&self) -> Option<String> {
        match self.fetch_release_marker().await {
            Ok(body) => Some(body.trim().to_string()).filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(
                    url = %self.settings.release_url,
                    error = %e,
                    "could not fetch stable release marker"
                );
                None
            }
        }
    }

    async fn fetch_release_marker(&self) -> Result<String, reqwest::Error> {
        self.public
            .get(&self.settings.release_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}
