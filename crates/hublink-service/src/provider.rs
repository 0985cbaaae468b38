//! Service provider: the configuration phase.
//!
//! Configuration is two-phase: mutate a `HublinkProvider`, then consume it
//! with [`HublinkProvider::build`] to obtain the runtime service. Because
//! `build` takes the provider by value, configuration after instantiation
//! is unrepresentable.
//!
//! Defaults can be loaded from:
//! - A TOML configuration file (`hublink.toml`)
//! - Environment variables (`HUBLINK_URL`, `HUBLINK_LOGGING`)

use crate::error::HubError;
use crate::service::HubService;
use hublink_transport::{HubClient, DEFAULT_TRANSPORT_ORDER};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// On-disk provider defaults.
#[derive(Debug, Default, Deserialize)]
struct ProviderFile {
    transports: Option<Vec<String>>,
    logging: Option<bool>,
    url: Option<String>,
}

/// Configuration store for the hublink service.
#[derive(Debug, Clone)]
pub struct HublinkProvider {
    transports: Vec<String>,
    logging: bool,
    url: Option<String>,
}

impl Default for HublinkProvider {
    fn default() -> Self {
        Self {
            transports: DEFAULT_TRANSPORT_ORDER
                .iter()
                .map(|t| (*t).to_string())
                .collect(),
            logging: true,
            url: None,
        }
    }
}

impl HublinkProvider {
    /// Create a provider with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load provider defaults from the usual config locations, falling back
    /// to built-in defaults with environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load() -> Result<Self, HubError> {
        let config_paths = ["hublink.toml", "~/.config/hublink/hublink.toml"];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        let mut provider = Self::default();
        provider.apply_env();
        Ok(provider)
    }

    /// Load provider defaults from a specific TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, HubError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| HubError::Config(format!("failed to read {}: {e}", path.display())))?;
        let file: ProviderFile = toml::from_str(&contents)
            .map_err(|e| HubError::Config(format!("failed to parse {}: {e}", path.display())))?;

        let mut provider = Self::default();
        if let Some(transports) = file.transports {
            provider.transports = transports;
        }
        if let Some(logging) = file.logging {
            provider.logging = logging;
        }
        provider.url = file.url;
        provider.apply_env();

        debug!(path = %path.display(), "Loaded provider config");
        Ok(provider)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("HUBLINK_URL") {
            self.url = Some(url);
        }
        if let Ok(logging) = std::env::var("HUBLINK_LOGGING") {
            if let Ok(flag) = logging.parse() {
                self.logging = flag;
            }
        }
    }

    /// Replace the transport preference order.
    ///
    /// The value comes through the host's loosely typed config surface, so
    /// it arrives as JSON; anything other than an array of strings is
    /// rejected and the previous list is left untouched. Order is kept
    /// verbatim and duplicates are not filtered.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidTransports`] when the value is not an
    /// array of strings.
    pub fn set_transports(&mut self, value: &Value) -> Result<(), HubError> {
        let items = value.as_array().ok_or(HubError::InvalidTransports)?;
        let transports = items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<String>>>()
            .ok_or(HubError::InvalidTransports)?;
        self.transports = transports;
        Ok(())
    }

    /// The current transport preference order.
    #[must_use]
    pub fn transports(&self) -> &[String] {
        &self.transports
    }

    /// Set the logging default applied to every connection created by the
    /// built service.
    pub fn set_logging(&mut self, enabled: bool) {
        self.logging = enabled;
    }

    /// The current logging default.
    #[must_use]
    pub fn logging(&self) -> bool {
        self.logging
    }

    /// Set the default endpoint used when a connection is created without
    /// an explicit url.
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = Some(url.into());
    }

    /// The configured default endpoint, if any.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Consume the provider and build the runtime service around the given
    /// transport client.
    ///
    /// The transport list and logging default are snapshotted here; later
    /// provider mutation is impossible by construction.
    #[must_use]
    pub fn build(self, client: Arc<dyn HubClient>) -> HubService {
        HubService::new(client, self.transports, self.logging, self.url)
    }
}
