//! Observability configuration parsing from environment variables.
//!
//! This module handles loading metrics reporting configuration.

use super::Vars;
use anyhow::Result;

/// Observability environment configuration
#[derive(Debug, Clone)]
pub struct ObservabilityEnvConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for ObservabilityEnvConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
        }
    }
}

impl ObservabilityEnvConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(&Vars::from_env())
    }

    pub fn from_vars(vars: &Vars) -> Result<Self> {
        let interval_secs = vars.parse("OBSERVABILITY_INTERVAL", 60u64)?;
        if interval_secs == 0 {
            anyhow::bail!("OBSERVABILITY_INTERVAL must be at least 1 second");
        }

        Ok(Self {
            enabled: vars.parse_bool("OBSERVABILITY_ENABLED", true)?,
            interval_secs,
        })
    }
}
