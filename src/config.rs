//! Config model and persistence helpers.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

/// Top-level configuration stored in `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Where the analysis service lives and how to poll it.
    pub service: ServiceCfg,
    /// How results are interpreted.
    pub scan: ScanCfg,
}

/// Analysis service connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCfg {
    /// Base URL; `/upload` and `/status/{job_id}` are appended.
    pub base_url: String,
    /// Delay between status requests.
    pub poll_interval_ms: u64,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
}

/// Result interpretation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanCfg {
    /// Scores strictly above this count as authentic when the service sends
    /// no classification.
    pub authentic_threshold: f64,
}

impl Config {
    /// Load from disk or create defaults when missing.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let s = fs::read_to_string(path)?;
            let cfg: Self = toml::from_str(&s)?;
            cfg.validate()?;
            Ok(cfg)
        } else {
            let cfg = Self::default();
            cfg.save(path)?;
            Ok(cfg)
        }
    }

    /// Persist the config as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let s = toml::to_string_pretty(self)?;
        fs::write(path, s)?;
        Ok(())
    }

    /// Reject values the worker cannot use.
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.service.base_url)
            .map_err(|e| anyhow!("invalid base_url {:?}: {e}", self.service.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!("base_url must be http or https"));
        }
        if self.service.poll_interval_ms < 100 {
            return Err(anyhow!("poll_interval_ms must be at least 100"));
        }
        if self.service.request_timeout_secs == 0 {
            return Err(anyhow!("request_timeout_secs must be positive"));
        }
        if !(0.0..=100.0).contains(&self.scan.authentic_threshold) {
            return Err(anyhow!("authentic_threshold must be within 0..=100"));
        }
        Ok(())
    }

    /// Poll period as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.service.poll_interval_ms)
    }
}

impl Default for Config {
    /// Defaults match the local development service.
    fn default() -> Self {
        Self {
            service: ServiceCfg {
                base_url: "http://localhost:8000/api/v1".into(),
                poll_interval_ms: 2000,
                request_timeout_secs: 30,
            },
            scan: ScanCfg {
                authentic_threshold: 70.0,
            },
        }
    }
}
