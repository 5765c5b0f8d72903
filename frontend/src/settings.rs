use serde::{Deserialize, Serialize};
use tracing::Level;

const STORAGE_KEY: &str = "ledger_settings";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Prefix for every server route; empty means same origin.
    pub api_base_url: String,
    pub log_level: String,
    /// Ask before leaving the page.
    pub warn_on_exit: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            api_base_url: String::new(),
            log_level: "info".to_string(),
            warn_on_exit: true,
        }
    }
}

impl AppConfig {
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn max_level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }
}

pub fn load_settings() -> AppConfig {
    if let Some(window) = web_sys::window() {
        if let Ok(Some(storage)) = window.local_storage() {
            if let Ok(Some(raw)) = storage.get_item(STORAGE_KEY) {
                if let Ok(config) = serde_json::from_str::<AppConfig>(&raw) {
                    return config;
                }
            }
        }
    }
    AppConfig::default()
}

pub fn save_settings(config: &AppConfig) {
    if let Some(window) = web_sys::window() {
        if let Ok(Some(storage)) = window.local_storage() {
            if let Ok(raw) = serde_json::to_string(config) {
                let _ = storage.set_item(STORAGE_KEY, &raw);
            }
        }
    }
}

/// Routes `tracing` events to the browser console.
pub fn init_logging(config: &AppConfig) {
    let layer = tracing_wasm::WASMLayerConfigBuilder::new()
        .set_max_level(config.max_level())
        .build();
    tracing_wasm::set_as_global_default_with_config(layer);
}
