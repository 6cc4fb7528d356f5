use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use faceid_vision::DetectorParams;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::matcher::{Matcher, DEFAULT_THRESHOLD};
use crate::roster::Roster;

pub static CONFIG_PATH: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("FACEID_CONFIG_PATH").unwrap_or("/usr/local/etc/faceid/config.toml"))
});

pub static STORE_PREFIX: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("FACEID_STORE_PREFIX").unwrap_or("/usr/local/etc/faceid"))
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Largest Euclidean distance still accepted as the same person.
    pub threshold: f32,
    pub labels: Vec<String>,
    /// Directory holding `<label>_<n>.<ext>` sample images.
    pub samples_dir: PathBuf,
    pub samples_per_label: usize,
    pub sample_extension: String,
    pub model_dir: PathBuf,
    /// Concurrent extractions during enrollment; 0 picks automatically.
    pub workers: usize,
    pub detection_score: f32,
    pub nms_threshold: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            labels: vec!["lennard".into(), "raj".into(), "sheldon".into()],
            samples_dir: STORE_PREFIX.join("faces"),
            samples_per_label: 22,
            sample_extension: "png".to_string(),
            model_dir: STORE_PREFIX.join("models"),
            workers: 0,
            detection_score: 0.6,
            nms_threshold: 0.3,
        }
    }
}

impl Config {
    pub fn roster(&self) -> Roster {
        Roster::from_pattern(
            &self.samples_dir,
            &self.labels,
            self.samples_per_label,
            &self.sample_extension,
        )
    }

    pub fn matcher(&self) -> Matcher {
        Matcher::new(self.threshold)
    }

    pub fn detector_params(&self) -> DetectorParams {
        DetectorParams {
            score_threshold: self.detection_score,
            nms_threshold: self.nms_threshold,
            ..DetectorParams::default()
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}
