use crate::engine::EngineConfig;
use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub server_addr: String,
    /// Delay between drained events; a UX knob, not a constant.
    pub pacing_ms: u64,
    pub active_mark_ms: u64,
    pub cleared_mark_ms: u64,
    pub event_log_capacity: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:7171".to_string(),
            pacing_ms: 1000,
            active_mark_ms: 600,
            cleared_mark_ms: 400,
            event_log_capacity: 30,
        }
    }
}

impl ViewerConfig {
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            pacing: Duration::from_millis(self.pacing_ms),
            active_mark: Duration::from_millis(self.active_mark_ms),
            cleared_mark: Duration::from_millis(self.cleared_mark_ms),
            log_capacity: self.event_log_capacity,
        }
    }
}

fn config_file_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "flowscope")?;
    Some(proj.config_dir().join("viewer.toml"))
}

pub fn load_or_default() -> ViewerConfig {
    let Some(path) = config_file_path() else {
        return ViewerConfig::default();
    };
    load_or_default_from_path(&path)
}

fn load_or_default_from_path(path: &Path) -> ViewerConfig {
    let Ok(contents) = fs::read_to_string(path) else {
        return ViewerConfig::default();
    };
    toml::from_str(&contents).unwrap_or_else(|_| ViewerConfig::default())
}

pub fn save(cfg: &ViewerConfig) -> anyhow::Result<()> {
    let Some(path) = config_file_path() else {
        return Err(anyhow::anyhow!("no config directory available"));
    };
    save_to_path(cfg, &path)
}

fn save_to_path(cfg: &ViewerConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    let data = toml::to_string_pretty(cfg).context("failed to serialize viewer config")?;
    fs::write(path, data)
        .with_context(|| format!("failed to write viewer config {}", path.display()))?;
    Ok(())
}
