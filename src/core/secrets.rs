//! Project secrets

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const OPENAI_API_BASE: &str = "OPENAI_API_BASE";

/// Keys required when the project file does not list its own
pub fn default_required_secrets() -> Vec<String> {
    vec![OPENAI_API_KEY.to_string(), OPENAI_API_BASE.to_string()]
}

/// One or more required secrets are absent or empty
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} must be set", .missing.join(" and "))]
pub struct MissingSecrets {
    pub missing: Vec<String>,
}

/// Validated secret values
///
/// Values never appear in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretSet {
    values: BTreeMap<String, String>,
}

impl SecretSet {
    /// Read the required keys through `lookup`.
    ///
    /// Every key must map to a non-empty value; otherwise all missing
    /// keys are reported and nothing is returned.
    pub fn from_lookup<F>(keys: &[String], lookup: F) -> Result<Self, MissingSecrets>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut values = BTreeMap::new();
        let mut missing = Vec::new();

        for key in keys {
            match lookup(key) {
                Some(value) if !value.trim().is_empty() => {
                    values.insert(key.clone(), value);
                }
                _ => missing.push(key.clone()),
            }
        }

        if missing.is_empty() {
            Ok(Self { values })
        } else {
            Err(MissingSecrets { missing })
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw key/value pairs, for the secret store request only
    pub fn expose(&self) -> &BTreeMap<String, String> {
        &self.values
    }
}

impl fmt::Debug for SecretSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.values.keys().map(|k| (k, "<redacted>")))
            .finish()
    }
}
