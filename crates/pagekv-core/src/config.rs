//! Runtime configuration for the index and its locks.
//!
//! Both structs deserialize from TOML. Durations are written in
//! milliseconds:
//!
//! ```toml
//! include_keys = ["type", "tags"]
//! exclude_keys = ["draft"]
//!
//! [lock]
//! poll_interval_ms = 50
//! timeout_ms = 10000
//! ```

use crate::error::InternalError;
use pagekv_utils::kebab_key;
use serde::{Deserialize, Serialize};
use std::time::Duration;

///
/// LockConfig
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockConfig {
    #[serde(rename = "poll_interval_ms", with = "millis")]
    pub poll_interval: Duration,

    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,
}

impl LockConfig {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    #[must_use]
    pub const fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_POLL_INTERVAL, Self::DEFAULT_TIMEOUT)
    }
}

///
/// IndexConfig
///
/// `include_keys`/`exclude_keys` select which page context keys get
/// attribute indices. Keys are kebab-cased on load. An empty include list
/// admits every key; the exclude list always wins.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexConfig {
    pub include_keys: Vec<String>,
    pub exclude_keys: Vec<String>,
    pub lock: LockConfig,
}

impl IndexConfig {
    /// Parse and normalize a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, InternalError> {
        let config: Self = toml::from_str(source).map_err(|err| {
            InternalError::config_unsupported(format!("invalid index config: {err}"))
        })?;

        Ok(config.normalized())
    }

    /// Kebab-case every listed key and drop blanks and repeats.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.include_keys = normalize_keys(&self.include_keys);
        self.exclude_keys = normalize_keys(&self.exclude_keys);
        self
    }
}

fn normalize_keys(keys: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(keys.len());
    for key in keys {
        let key = kebab_key(key);
        if !key.is_empty() && !out.contains(&key) {
            out.push(key);
        }
    }
    out
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
