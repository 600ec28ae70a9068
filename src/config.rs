// src/config.rs
use crate::game::RoundPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "RPS_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GameConfig {
    pub video_width: u32,
    pub video_height: u32,
    pub camera_index: u32,
    pub refresh_hz: u32,
    pub neighbor_count: usize,
    pub shake_duration_ms: u64,
    pub round_policy: RoundPolicy,
    pub model_path: PathBuf,
    pub images_dir: PathBuf,
    pub detector: DetectorConfig,
    pub overlay_color: [u8; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    pub python: PathBuf,
    pub script: PathBuf,
    pub min_confidence: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            video_width: 360,
            video_height: 200,
            camera_index: 0,
            refresh_hz: 60,
            neighbor_count: 25,
            shake_duration_ms: 900,
            round_policy: RoundPolicy::Serialize,
            model_path: PathBuf::from("model/myKNN4.json"),
            images_dir: PathBuf::from("images"),
            detector: DetectorConfig::default(),
            overlay_color: [255, 0, 0],
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            python: PathBuf::from("python3"),
            script: PathBuf::from("scripts/hand_detect.py"),
            min_confidence: 0.5,
        }
    }
}

impl GameConfig {
    /// Resolves the config file from `RPS_CONFIG`, then the platform config
    /// directory. Falls back to defaults when neither file exists.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            Some(path) => {
                tracing::info!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Malformed config file {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn config_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        directories::ProjectDirs::from("com", "gesturerps", "GestureRPS")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    pub fn shake_duration(&self) -> Duration {
        Duration::from_millis(self.shake_duration_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.refresh_hz.max(1) as f64)
    }
}
