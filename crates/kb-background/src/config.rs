//! Background configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use kb_compiler::{CompilerOptions, RULE_ID_BASE};
use kb_core::MIN_EXPIRATION_LEAD_MS;

use crate::error::ConfigError;

/// Storage key holding the block list.
pub const STORAGE_KEY: &str = "blockedItems";

/// Alarm that sweeps expired entries across restarts.
pub const EXPIRATION_ALARM: &str = "expirationCheck";

/// Storage area that carries the block list.
pub const SYNC_AREA: &str = "sync";

pub const DEFAULT_BLOCKED_PAGE_URL: &str = "chrome-extension://keywordblocker/blocked.html";

const DEFAULT_KEYWORDS: &[&str] = &[
    "instagram.com/miss_fegz",
    "instagram.com/nextupwithfegz",
    "instagram.com/koria.brand",
    "instagram.com/being.fitfegz",
    "tiktok.com/@beingfitfegz",
    "tiktok.com/@wakawakafegz",
    "instagram.com/koriaofficial",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BlockerConfig {
    pub storage_key: String,
    /// Absolute URL of the notice page (`chrome.runtime.getURL("blocked.html")`)
    pub blocked_page_url: String,
    pub rule_id_base: u32,
    /// Period of the in-process sweep timer
    pub sweep_interval_secs: u64,
    pub alarm_name: String,
    /// Period of the persistent sweep alarm
    pub alarm_period_minutes: u32,
    pub min_expiration_lead_ms: i64,
    /// Seeded on first install when storage holds no list
    pub default_keywords: Vec<String>,
}

impl Default for BlockerConfig {
    fn default() -> Self {
        Self {
            storage_key: STORAGE_KEY.to_string(),
            blocked_page_url: DEFAULT_BLOCKED_PAGE_URL.to_string(),
            rule_id_base: RULE_ID_BASE,
            sweep_interval_secs: 60,
            alarm_name: EXPIRATION_ALARM.to_string(),
            alarm_period_minutes: 60,
            min_expiration_lead_ms: MIN_EXPIRATION_LEAD_MS,
            default_keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl BlockerConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.compiler_options()?;
        Ok(config)
    }

    pub fn compiler_options(&self) -> Result<CompilerOptions, ConfigError> {
        Ok(CompilerOptions::new(&self.blocked_page_url, self.rule_id_base)?)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}
