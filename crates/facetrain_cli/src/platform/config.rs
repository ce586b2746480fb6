//! Client configuration: an optional RON file, then environment variables,
//! then command-line flags, each overriding the previous layer.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use facetrain_core::PROCESSING_CAPACITY;
use facetrain_engine::{
    FixtureTransport, ReqwestTransport, Transport, TransportSettings, DEFAULT_BASE_URL,
};
use facetrain_logging::{ft_info, ft_warn};
use serde::{Deserialize, Serialize};

use super::cli::Cli;

pub(crate) const DEFAULT_CONFIG_FILE: &str = "facetrain.ron";

const ENV_BASE_URL: &str = "FACETRAIN_API_BASE_URL";
const ENV_TIMEOUT: &str = "FACETRAIN_API_TIMEOUT";
const ENV_TOKEN: &str = "FACETRAIN_API_TOKEN";
const ENV_BACKEND: &str = "FACETRAIN_BACKEND";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum Backend {
    Http,
    /// Built-in canned data; no network access.
    Fixture,
}

impl Backend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "http" => Some(Backend::Http),
            "fixture" | "mock" => Some(Backend::Fixture),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ClientConfig {
    pub api_base_url: String,
    pub default_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub backend: Backend,
    pub poll_interval_ms: u64,
    pub default_domain: String,
    /// Capacity of the list of videos still processing.
    pub history_capacity: usize,
    /// Largest history file written; a bigger history is halved first.
    pub history_max_bytes: usize,
    /// Refresh period of the comparison metrics watch.
    pub metrics_poll_interval_ms: u64,
    pub data_dir: PathBuf,
    /// Token from the environment; takes precedence over the stored session.
    #[serde(skip)]
    pub token_override: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            default_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            backend: Backend::Http,
            poll_interval_ms: 3_000,
            default_domain: "serbia".to_string(),
            history_capacity: PROCESSING_CAPACITY,
            history_max_bytes: 256 * 1024,
            metrics_poll_interval_ms: 30_000,
            data_dir: PathBuf::from(".facetrain"),
            token_override: None,
        }
    }
}

impl ClientConfig {
    /// Build the effective configuration for one run.
    pub(crate) fn resolve(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_flags(cli);
        Ok(config)
    }

    pub(crate) fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_ron(&content).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub(crate) fn from_ron(content: &str) -> Result<Self> {
        Ok(ron::from_str(content)?)
    }

    pub(crate) fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = var(ENV_BASE_URL) {
            self.api_base_url = url;
        }
        if let Some(timeout) = var(ENV_TIMEOUT) {
            self.default_timeout_ms = timeout
                .trim()
                .parse()
                .with_context(|| format!("{ENV_TIMEOUT} must be milliseconds, got {timeout:?}"))?;
        }
        if let Some(token) = var(ENV_TOKEN).filter(|token| !token.is_empty()) {
            self.token_override = Some(token);
        }
        if let Some(backend) = var(ENV_BACKEND) {
            match Backend::parse(&backend) {
                Some(backend) => self.backend = backend,
                None => bail!("{ENV_BACKEND} must be `http` or `fixture`, got {backend:?}"),
            }
        }
        Ok(())
    }

    pub(crate) fn apply_flags(&mut self, cli: &Cli) {
        if let Some(url) = &cli.api_url {
            self.api_base_url = url.clone();
        }
        if let Some(backend) = cli.backend {
            self.backend = backend.into();
        }
        if let Some(timeout) = cli.timeout_ms {
            self.default_timeout_ms = timeout;
        }
        if let Some(domain) = &cli.domain {
            self.default_domain = domain.clone();
        }
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(100))
    }

    pub(crate) fn metrics_poll_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_poll_interval_ms.max(100))
    }

    /// Choose the transport strategy once for the whole run.
    pub(crate) fn build_transport(
        &self,
        session_token: Option<String>,
    ) -> Result<Arc<dyn Transport>> {
        match self.backend {
            Backend::Fixture => {
                ft_info!("using built-in fixture data");
                Ok(Arc::new(FixtureTransport::demo()))
            }
            Backend::Http => {
                let auth_token = self.token_override.clone().or(session_token);
                if auth_token.is_none() {
                    ft_warn!("no API token; run `facetrain login` first");
                }
                let transport = ReqwestTransport::new(TransportSettings {
                    base_url: self.api_base_url.clone(),
                    connect_timeout: Duration::from_millis(self.connect_timeout_ms),
                    default_timeout: Duration::from_millis(self.default_timeout_ms),
                    auth_token,
                })?;
                Ok(Arc::new(transport))
            }
        }
    }
}
