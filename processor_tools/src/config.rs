use std::time::Duration;

use bazaar_common::Secret;
use log::*;

const DEFAULT_TIMEOUT_MS: u64 = 15_000;

#[derive(Debug, Clone, Default)]
pub struct ProcessorConfig {
    /// Base URL of the processor REST API, without a trailing slash.
    pub base_url: String,
    pub api_key: Secret<String>,
    pub timeout: Duration,
}

impl ProcessorConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("BZR_PROCESSOR_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| {
                warn!("🪛️ BZR_PROCESSOR_URL not set, using (probably useless) default");
                "https://api.processor.example/v1".to_string()
            });
        let api_key = Secret::new(std::env::var("BZR_PROCESSOR_API_KEY").unwrap_or_else(|_| {
            warn!("🪛️ BZR_PROCESSOR_API_KEY not set, using (probably useless) default");
            "sk_test_00000000000000".to_string()
        }));
        let timeout = std::env::var("BZR_PROCESSOR_TIMEOUT_MS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid BZR_PROCESSOR_TIMEOUT_MS value ({s}): {e}. Using the default"))
                    .ok()
            })
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(DEFAULT_TIMEOUT_MS));
        Self { base_url, api_key, timeout }
    }
}
