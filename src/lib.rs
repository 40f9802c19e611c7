pub mod config;
pub mod errors;
pub mod llm;
pub mod patterns;
pub mod perception;
pub mod planner;

use std::path::Path;

use crate::config::AppConfig;
use crate::errors::DeskPilotResult;
use crate::patterns::store::PatternStore;

/// Installs the global fmt subscriber. `RUST_LOG` wins over `default_filter`.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();
}

/// Loads `.env`, then the config file (explicit path or the usual lookup),
/// then environment overrides. A missing or broken config falls back to defaults.
pub fn load_app_config(explicit: Option<&Path>) -> AppConfig {
    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let loaded = match explicit {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    };
    let mut cfg = match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(error = %e, "config unavailable; using defaults");
            AppConfig::default()
        }
    };
    cfg.apply_env_overrides();
    cfg
}

/// The configured pattern file, or the built-in sample set when none is set.
pub fn load_patterns(
    cfg: &AppConfig,
    override_path: Option<&Path>,
) -> DeskPilotResult<PatternStore> {
    match override_path.or(cfg.patterns.file.as_deref()) {
        Some(path) => PatternStore::load(path),
        None => PatternStore::builtin(),
    }
}
