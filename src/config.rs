use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{DeskPilotError, DeskPilotResult};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub patterns: PatternsConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the local generation service, without the `/api/...` path.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Model name sent with every request. Must accept images when screenshots are attached.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_base() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2-vision".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PatternsConfig {
    /// Pattern file to load. The built-in sample set is used when absent.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Oldest turns are evicted once the session holds this many.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    #[serde(default)]
    pub persist_transcript: bool,
    /// Falls back to the platform data directory when unset.
    #[serde(default)]
    pub transcript_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            persist_transcript: false,
            transcript_dir: None,
        }
    }
}

fn default_max_turns() -> usize {
    100
}

impl AppConfig {
    /// Environment overrides: `DESKPILOT_API_BASE`, `DESKPILOT_MODEL`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(base) = std::env::var("DESKPILOT_API_BASE") {
            if !base.trim().is_empty() {
                tracing::debug!(api_base = %base, "api_base overridden from environment");
                self.llm.api_base = base;
            }
        }
        if let Ok(model) = std::env::var("DESKPILOT_MODEL") {
            if !model.trim().is_empty() {
                tracing::debug!(model = %model, "model overridden from environment");
                self.llm.model = model;
            }
        }
    }
}

fn resolve_config_path() -> DeskPilotResult<PathBuf> {
    if let Ok(explicit) = std::env::var("DESKPILOT_CONFIG") {
        let candidate = PathBuf::from(explicit);
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config taken from DESKPILOT_CONFIG");
            return Ok(candidate);
        }
        return Err(DeskPilotError::Config(format!(
            "DESKPILOT_CONFIG points at missing file {}",
            candidate.display()
        )));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(DeskPilotError::Config(
        "config.toml not found next to executable or in working directory".into(),
    ))
}

pub fn load_config() -> DeskPilotResult<AppConfig> {
    let path = resolve_config_path()?;
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> DeskPilotResult<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), model = %config.llm.model, "config loaded");
    Ok(config)
}

pub fn save_config(config: &AppConfig, path: &Path) -> DeskPilotResult<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}

/// Serializes tests that touch process environment variables.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
