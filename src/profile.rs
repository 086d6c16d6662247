//! Erasure-code profiles
//!
//! A profile is the host's string-keyed configuration dictionary, handed to
//! the plugin factory at construction time. The plugin interprets `k`, `m`,
//! `technique` and `force_all_chunks`; everything else is carried opaquely
//! so the host can round-trip its own annotations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// String-keyed codec configuration dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErasureCodeProfile(BTreeMap<String, String>);

impl ErasureCodeProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a key, returning the raw string value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Set a key, stringifying the value.
    pub fn set(&mut self, key: &str, value: impl ToString) -> &mut Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a numeric key, if present.
    ///
    /// A key that is present but not a number is a configuration error, not
    /// an absent value.
    pub fn parse_u32(&self, key: &str) -> Result<Option<u32>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<u32>().map(Some).map_err(|_| {
                Error::InvalidProfile(format!("{key}={raw} is not a non-negative integer"))
            }),
        }
    }

    /// True when the key is present with the literal value `"true"`.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key) == Some("true")
    }
}

impl From<BTreeMap<String, String>> for ErasureCodeProfile {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, String)> for ErasureCodeProfile {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
