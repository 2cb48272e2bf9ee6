use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing;

/// Top-level configuration consumed by the core. Ports, plugin wiring and
/// metric-collection intervals live with the host process, not here.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub dampening: DampeningConfig,
}

impl EngineConfig {
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join("rcaflow.toml");
        let mut cfg = if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            toml::from_str::<EngineConfig>(&text)
                .with_context(|| format!("parsing config file {}", path.display()))?
        } else {
            tracing::info!(
                "No config file found at {}. Using EngineConfig::default().",
                path.display()
            );
            EngineConfig::default()
        };
        cfg.resolve_paths(root);
        Ok(cfg)
    }

    fn resolve_paths(&mut self, root: &Path) {
        self.store.storage_dir = absolutize(root, &self.store.storage_dir);
    }
}

/// Configuration of the rotating persistent store.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "StoreConfig::default_storage_dir")]
    pub storage_dir: PathBuf,
    #[serde(default = "StoreConfig::default_base_filename")]
    pub base_filename: String,
    /// Connection-protocol prefix prepended to the file path when opening
    /// the embedded store (URI form).
    #[serde(default = "StoreConfig::default_db_protocol")]
    pub db_protocol: String,
    #[serde(default = "StoreConfig::default_rotation_unit")]
    pub rotation_unit: RotationUnit,
    #[serde(default = "StoreConfig::default_rotation_period")]
    pub rotation_period: u64,
    /// Kept as a string on purpose: an unparseable value must fall back to
    /// the default instead of aborting startup.
    #[serde(default = "StoreConfig::default_retention_count")]
    pub retention_count: String,
}

impl StoreConfig {
    pub const RETENTION_COUNT_DEFAULT: usize = 5;

    fn default_storage_dir() -> PathBuf {
        PathBuf::from("store")
    }

    fn default_base_filename() -> String {
        "rcaflow.sqlite".to_string()
    }

    fn default_db_protocol() -> String {
        "file:".to_string()
    }

    fn default_rotation_unit() -> RotationUnit {
        RotationUnit::Hours
    }

    fn default_rotation_period() -> u64 {
        1
    }

    fn default_retention_count() -> String {
        Self::RETENTION_COUNT_DEFAULT.to_string()
    }

    /// Rotation period as a duration.
    pub fn rotation_period(&self) -> Duration {
        self.rotation_unit.to_duration(self.rotation_period)
    }

    /// Retention count with a logged fallback when the configured string
    /// does not parse.
    pub fn parsed_retention_count(&self) -> usize {
        match self.retention_count.trim().parse::<usize>() {
            Ok(n) => n,
            Err(_) => {
                tracing::error!(
                    "Unable to parse '{}' as a retention count; falling back to {}",
                    self.retention_count,
                    Self::RETENTION_COUNT_DEFAULT
                );
                Self::RETENTION_COUNT_DEFAULT
            }
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_dir: Self::default_storage_dir(),
            base_filename: Self::default_base_filename(),
            db_protocol: Self::default_db_protocol(),
            rotation_unit: Self::default_rotation_unit(),
            rotation_period: Self::default_rotation_period(),
            retention_count: Self::default_retention_count(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl RotationUnit {
    pub fn to_duration(self, period: u64) -> Duration {
        match self {
            RotationUnit::Seconds => Duration::from_secs(period),
            RotationUnit::Minutes => Duration::from_secs(period * 60),
            RotationUnit::Hours => Duration::from_secs(period * 3600),
            RotationUnit::Days => Duration::from_secs(period * 86_400),
        }
    }
}

/// Configuration of the publisher's flip-flop suppression window.
#[derive(Debug, Clone, Deserialize)]
pub struct DampeningConfig {
    #[serde(default = "DampeningConfig::default_flip_flop_window_secs")]
    pub flip_flop_window_secs: u64,
    #[serde(default = "DampeningConfig::default_flip_flop_threshold")]
    pub flip_flop_threshold: usize,
}

impl DampeningConfig {
    fn default_flip_flop_window_secs() -> u64 {
        3600
    }

    fn default_flip_flop_threshold() -> usize {
        4
    }
}

impl Default for DampeningConfig {
    fn default() -> Self {
        Self {
            flip_flop_window_secs: Self::default_flip_flop_window_secs(),
            flip_flop_threshold: Self::default_flip_flop_threshold(),
        }
    }
}

fn absolutize(root: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        root.join(value)
    }
}
