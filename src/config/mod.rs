//! Configuration module for the signal bot.
//!
//! This module provides structured configuration loading from environment variables,
//! organized by domain: Exchange, Strategy, Telegram, and Observability.

mod exchange_config;
mod observability_config;
mod strategy_config;
mod telegram_config;

pub use exchange_config::ExchangeEnvConfig;
pub use observability_config::ObservabilityEnvConfig;
pub use strategy_config::StrategyEnvConfig;
pub use telegram_config::TelegramEnvConfig;

use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::env;
use std::fmt::Display;
use std::str::FromStr;

/// Snapshot of the variables a config is read from.
///
/// Production code reads the process environment; tests build one from pairs
/// so they never have to mutate global state.
#[derive(Debug, Clone, Default)]
pub struct Vars(HashMap<String, String>);

impl Vars {
    pub fn from_env() -> Self {
        Self(env::vars().collect())
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Trimmed value of `key`; blank values count as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    pub fn parse<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(key) {
            Some(raw) => raw
                .parse::<T>()
                .map_err(|e| anyhow!("Failed to parse {}={}: {}", key, raw, e)),
            None => Ok(default),
        }
    }

    pub fn parse_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key).map(|v| v.to_lowercase()) {
            None => Ok(default),
            Some(v) => match v.as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => anyhow::bail!("Failed to parse {}={}: expected a boolean", key, v),
            },
        }
    }

    /// Comma separated list; `None` when unset.
    pub fn list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
    }
}

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub exchange: ExchangeEnvConfig,
    pub strategy: StrategyEnvConfig,
    pub telegram: TelegramEnvConfig,
    pub observability: ObservabilityEnvConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Call `dotenvy::dotenv()` first so `.env` values are visible.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(&Vars::from_env())
    }

    pub fn from_vars(vars: &Vars) -> Result<Self> {
        Ok(Self {
            exchange: ExchangeEnvConfig::from_vars(vars)
                .context("Failed to load exchange config")?,
            strategy: StrategyEnvConfig::from_vars(vars)
                .context("Failed to load strategy config")?,
            telegram: TelegramEnvConfig::from_vars(vars)
                .context("Failed to load telegram config")?,
            observability: ObservabilityEnvConfig::from_vars(vars)
                .context("Failed to load observability config")?,
        })
    }
}
