//! Environment variable source.
//!
//! Environment variables are read once and treated as immutable at runtime,
//! since modifying them is not thread-safe.

use std::collections::HashMap;

use super::{ConfigError, ConfigResult};

/// Read-only view over environment variables, optionally prefixed.
///
/// Tests inject a fixed map with [`EnvSource::from_map`] instead of touching
/// the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    prefix: Option<String>,
    fixed: Option<HashMap<String, String>>,
}

impl EnvSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefixed(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            fixed: None,
        }
    }

    pub fn from_map<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: None,
            fixed: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    fn env_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, key),
            None => key.to_string(),
        }
    }

    /// The raw value, or `None` when unset or blank.
    pub fn get(&self, key: &str) -> ConfigResult<Option<String>> {
        let env_key = self.env_key(key);
        let value = match &self.fixed {
            Some(vars) => vars.get(&env_key).cloned(),
            None => match std::env::var(&env_key) {
                Ok(value) => Some(value),
                Err(std::env::VarError::NotPresent) => None,
                Err(e) => return Err(ConfigError::Env(e)),
            },
        };
        Ok(value.filter(|v| !v.trim().is_empty()))
    }
}
