//! Configuration types for a TradeMatch deployment.

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{Result, TradematchError, constants};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradematchConfig {
    pub store: StoreConfig,
    pub reaper: ReaperConfig,
}

/// Where the three store documents live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the documents. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    pub offers_file: String,
    pub notifications_file: String,
    pub requests_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: Some(PathBuf::from(constants::DEFAULT_DATA_DIR)),
            offers_file: constants::OFFERS_FILE.to_string(),
            notifications_file: constants::NOTIFICATIONS_FILE.to_string(),
            requests_file: constants::PENDING_REQUESTS_FILE.to_string(),
        }
    }
}

impl StoreConfig {
    /// Configuration for stores that never touch the filesystem.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            data_dir: None,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn offers_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join(&self.offers_file))
    }

    #[must_use]
    pub fn notifications_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join(&self.notifications_file))
    }

    #[must_use]
    pub fn requests_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join(&self.requests_file))
    }
}

/// Expiry policy for pending requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaperConfig {
    /// How long a request stays live before it becomes sweepable.
    pub request_ttl: Duration,
    /// How often the reaper sweeps. A request lives between `request_ttl`
    /// and `request_ttl + sweep_interval`.
    pub sweep_interval: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            request_ttl: Duration::from_secs(constants::DEFAULT_REQUEST_TTL_SECS),
            sweep_interval: Duration::from_secs(constants::DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

impl ReaperConfig {
    /// Upper bound on how long a request can survive before removal.
    #[must_use]
    pub fn max_lifetime(&self) -> Duration {
        self.request_ttl + self.sweep_interval
    }

    /// Rejects a zero sweep interval.
    ///
    /// # Errors
    /// `Configuration` if the sweep interval is zero.
    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval.is_zero() {
            return Err(TradematchError::Configuration(
                "sweep interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl TradematchConfig {
    /// Build a configuration from `TRADEMATCH_*` environment variables,
    /// falling back to defaults for anything absent or unparsable.
    ///
    /// - `TRADEMATCH_DATA_DIR` (empty string = in-memory)
    /// - `TRADEMATCH_REQUEST_TTL_SECS`
    /// - `TRADEMATCH_SWEEP_INTERVAL_SECS`
    ///
    /// # Errors
    /// `Configuration` if the resulting sweep interval is zero.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an arbitrary variable source.
    ///
    /// # Errors
    /// `Configuration` if the resulting sweep interval is zero.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut store = StoreConfig::default();
        if let Some(dir) = lookup("TRADEMATCH_DATA_DIR") {
            store.data_dir = if dir.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(dir))
            };
        }

        let secs = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(default)
        };
        let reaper = ReaperConfig {
            request_ttl: Duration::from_secs(secs(
                "TRADEMATCH_REQUEST_TTL_SECS",
                constants::DEFAULT_REQUEST_TTL_SECS,
            )),
            sweep_interval: Duration::from_secs(secs(
                "TRADEMATCH_SWEEP_INTERVAL_SECS",
                constants::DEFAULT_SWEEP_INTERVAL_SECS,
            )),
        };

        let cfg = Self { store, reaper };
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    /// `Configuration` if any section is invalid.
    pub fn validate(&self) -> Result<()> {
        self.reaper.validate()
    }
}
