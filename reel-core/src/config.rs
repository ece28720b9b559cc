//! # Configuration
//!
//! A minimal string key/value store. Keys are dotted paths such as
//! `http.port` or `storage.backend`; applications layer values however they
//! like and read typed values back from a [`ReelConfigSnapshot`].
//!
//! ```rust
//! use reel_core::ReelConfig;
//!
//! let mut config = ReelConfig::new();
//! config.set("http.port", "3030");
//!
//! let snapshot = config.snapshot();
//! assert_eq!(snapshot.get_u16("http.port"), Some(3030));
//! assert_eq!(snapshot.get_or("upload.max_total_chunks", 10_000u32), 10_000);
//! ```
//!
//! ## Environment overrides
//!
//! [`ReelConfig::load_env`] maps prefixed variables onto dotted keys:
//!
//! ```bash
//! export REEL__HTTP__PORT=8080          # http.port
//! export REEL__STORAGE__BACKEND=s3      # storage.backend
//! ```

use std::collections::HashMap;
use std::str::FromStr;

#[derive(Debug, Default)]
pub struct ReelConfig {
    values: HashMap<String, String>,
}

impl ReelConfig {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Set a configuration key to a string value.
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Import every `{prefix}SECTION__NAME` variable as `section.name`.
    pub fn load_env(&mut self, prefix: &str) {
        self.load_vars(prefix, std::env::vars());
    }

    /// Same as [`load_env`](Self::load_env) over an explicit set of variables.
    pub fn load_vars<I>(&mut self, prefix: &str, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                if !normalized.is_empty() {
                    self.set(normalized, value);
                }
            }
        }
    }

    pub fn snapshot(&self) -> ReelConfigSnapshot {
        ReelConfigSnapshot::new(self.values.clone())
    }
}

/// Read-only copy of a [`ReelConfig`] with typed getters.
#[derive(Debug, Clone, Default)]
pub struct ReelConfigSnapshot {
    map: HashMap<String, String>,
}

impl ReelConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map
            .get(key)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.parse::<T>().ok())
    }

    /// Parsed value, or `default` when the key is absent or unparsable.
    pub fn get_or<T: FromStr>(&self, key: &str, default: T) -> T {
        self.get_parsed(key).unwrap_or(default)
    }

    pub fn get_u16(&self, key: &str) -> Option<u16> {
        self.get_parsed(key)
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get_parsed(key)
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get_parsed(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_parsed(key)
    }
}
