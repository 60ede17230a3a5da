//! Configuration management for Lapka
//!
//! This module provides configuration loading and validation.
//! Configuration is loaded from `~/.lapka/config.json` with environment
//! variable overrides; a missing file means all defaults.

mod types;

pub use types::*;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{LapkaError, Result};
use crate::providers::ModelProfile;
use crate::tools::expand_home;

impl Config {
    /// Returns the Lapka configuration directory path (~/.lapka)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".lapka")
    }

    /// Returns the path to the config file (~/.lapka/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content).map_err(|e| {
                LapkaError::Config(format!("Invalid config file {}: {}", path.display(), e))
            })?
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// - `LAPKA_API_KEY`, `LAPKA_API_BASE`, `LAPKA_MODEL`, `LAPKA_COMPACT_MODEL`
    /// - `OPENROUTER_API_KEY` when no key is configured
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(val) = lookup("LAPKA_API_KEY") {
            self.api_key = val;
        }
        if let Some(val) = lookup("LAPKA_API_BASE") {
            self.api_base = val;
        }
        if let Some(val) = lookup("LAPKA_MODEL") {
            self.model = val;
        }
        if let Some(val) = lookup("LAPKA_COMPACT_MODEL") {
            self.compact_model = val;
        }
        if self.api_key.is_empty() {
            if let Some(val) = lookup("OPENROUTER_API_KEY") {
                self.api_key = val;
            }
        }
    }

    /// Connection profile of the main model.
    pub fn main_profile(&self) -> ModelProfile {
        ModelProfile::new(&self.api_base, &self.api_key, &self.model)
    }

    /// Connection profile of the compaction model.
    ///
    /// Endpoint and key fall back to the main profile's when unset.
    pub fn compact_profile(&self) -> ModelProfile {
        let api_base = self
            .compact_api_base
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.api_base);
        let api_key = self
            .compact_api_key
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.api_key);
        ModelProfile::new(api_base, api_key, &self.compact_model)
    }

    /// Directory holding session checkpoints.
    pub fn sessions_dir(&self) -> PathBuf {
        match &self.sessions.dir {
            Some(dir) => expand_home(dir),
            None => Self::dir().join("sessions"),
        }
    }

    /// Whether an API key is configured for the main model.
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Reject settings the agent cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.compact_threshold > 0.0 && self.compact_threshold <= 1.0) {
            return Err(LapkaError::Config(format!(
                "compact_threshold must be in (0, 1], got {}",
                self.compact_threshold
            )));
        }
        if self.max_tool_iterations == 0 {
            return Err(LapkaError::Config(
                "max_tool_iterations must be at least 1".into(),
            ));
        }
        if self.keep_recent == 0 {
            return Err(LapkaError::Config("keep_recent must be at least 1".into()));
        }
        if self.max_context_tokens == 0 {
            return Err(LapkaError::Config(
                "max_context_tokens must be at least 1".into(),
            ));
        }
        if self.api_base.trim().is_empty() {
            return Err(LapkaError::Config("api_base must not be empty".into()));
        }
        Ok(())
    }
}
