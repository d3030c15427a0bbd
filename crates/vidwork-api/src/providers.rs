//! Builds the OCR/ASR provider pools (§4.8.1, §4.7) from the environment.
//!
//! Each pool is a priority-ordered list read from a `OCR_PROVIDERS`/
//! `ASR_PROVIDERS` comma-separated name list (mirroring `ApiConfig`'s
//! `CORS_ORIGINS` parsing), with one `<PREFIX>_<NAME>_*` env-var group per
//! provider. A provider missing its endpoint or API key is skipped with a
//! warning rather than failing startup — the spec only requires that at
//! least one OCR provider key be present (§6).

use std::sync::Arc;

use tracing::warn;
use vidwork_ocr::{AsrProvider, AsrProviderConfig, AsrProviderPool, OcrProvider, ProviderConfig, ProviderPool};

fn provider_names(env_var: &str) -> Vec<String> {
    std::env::var(env_var)
        .map(|s| {
            s.split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn env_key(prefix: &str, name: &str, suffix: &str) -> String {
    format!("{prefix}_{}_{suffix}", name.to_uppercase())
}

fn build_ocr_config(name: &str, priority: u32) -> Option<ProviderConfig> {
    let endpoint = std::env::var(env_key("OCR_PROVIDER", name, "ENDPOINT")).ok()?;
    let api_key = std::env::var(env_key("OCR_PROVIDER", name, "API_KEY")).ok()?;
    Some(ProviderConfig {
        name: name.to_string(),
        priority,
        endpoint,
        api_key,
        requests_per_minute: std::env::var(env_key("OCR_PROVIDER", name, "RPM"))
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60),
        max_parallel: std::env::var(env_key("OCR_PROVIDER", name, "MAX_PARALLEL"))
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3),
    })
}

fn build_asr_config(name: &str, priority: u32) -> Option<AsrProviderConfig> {
    let endpoint = std::env::var(env_key("ASR_PROVIDER", name, "ENDPOINT")).ok()?;
    let api_key = std::env::var(env_key("ASR_PROVIDER", name, "API_KEY")).ok()?;
    Some(AsrProviderConfig {
        name: name.to_string(),
        priority,
        endpoint,
        api_key,
        requests_per_minute: std::env::var(env_key("ASR_PROVIDER", name, "RPM"))
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60),
        max_parallel: std::env::var(env_key("ASR_PROVIDER", name, "MAX_PARALLEL"))
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3),
    })
}

/// Build the OCR provider pool. Logged, never fatal — an empty pool just
/// means every scene records empty text per §4.8.3's all-unavailable path.
pub fn build_ocr_pool(http: reqwest::Client) -> Arc<ProviderPool> {
    let names = provider_names("OCR_PROVIDERS");
    let providers = names
        .iter()
        .enumerate()
        .filter_map(|(i, name)| match build_ocr_config(name, i as u32) {
            Some(config) => Some(Arc::new(OcrProvider::new(config, http.clone()))),
            None => {
                warn!(provider = %name, "OCR provider missing endpoint/api key, skipping");
                None
            }
        })
        .collect();
    Arc::new(ProviderPool::new(providers))
}

/// Build the ASR provider pool (same shape as [`build_ocr_pool`]).
pub fn build_asr_pool(http: reqwest::Client) -> Arc<AsrProviderPool> {
    let names = provider_names("ASR_PROVIDERS");
    let providers = names
        .iter()
        .enumerate()
        .filter_map(|(i, name)| match build_asr_config(name, i as u32) {
            Some(config) => Some(Arc::new(AsrProvider::new(config, http.clone()))),
            None => {
                warn!(provider = %name, "ASR provider missing endpoint/api key, skipping");
                None
            }
        })
        .collect();
    Arc::new(AsrProviderPool::new(providers))
}
