//! Hook executor and resource cache settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Hook executor settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HookSettings {
    /// How long a successful hook result stays cached.
    pub cache_ttl_ms: u64,
    /// Timeout for hooks that do not declare their own.
    pub default_timeout_ms: u64,
}

impl Default for HookSettings {
    fn default() -> Self {
        Self {
            cache_ttl_ms: 5 * 60 * 1000,
            default_timeout_ms: 10_000,
        }
    }
}

impl HookSettings {
    /// Cache TTL as a [`Duration`].
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Default hook timeout as a [`Duration`].
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}
