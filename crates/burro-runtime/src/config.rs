//! Runtime configuration – reads `~/.burro/config.toml`.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use burro_perception::flow::FlowConfig;
use burro_types::BurroError;
use serde::Deserialize;

/// Process-wide runtime settings. Every field has a default, so an empty
/// (or absent) file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RuntimeConfig {
    /// Control-loop rate in ticks per second.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,

    /// Telemetry ring depth, in snapshots.
    #[serde(default = "default_snapshot_depth")]
    pub snapshot_depth: usize,

    /// Region-tracker grid and thresholds, the `[flow]` table.
    #[serde(default)]
    pub flow: FlowSettings,
}

/// The `[flow]` table: tracker grid shape and clustering thresholds.
/// Defaults mirror [`FlowConfig::default`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FlowSettings {
    #[serde(default = "default_flow_width")]
    pub width: usize,
    #[serde(default = "default_flow_height")]
    pub height: usize,
    #[serde(default = "default_motion_threshold")]
    pub motion_threshold: f32,
    #[serde(default = "default_coincidence_threshold")]
    pub coincidence_threshold: f32,
    #[serde(default = "default_histogram_buckets")]
    pub histogram_buckets: usize,
    #[serde(default = "default_max_regions")]
    pub max_regions: usize,
}

impl FlowSettings {
    /// Convert into the tracker's own config type.
    pub fn tracker_config(&self) -> FlowConfig {
        FlowConfig {
            width: self.width,
            height: self.height,
            motion_threshold: self.motion_threshold,
            coincidence_threshold: self.coincidence_threshold,
            histogram_buckets: self.histogram_buckets,
            max_regions: self.max_regions,
        }
    }
}

impl RuntimeConfig {
    /// Tick period derived from [`tick_hz`][RuntimeConfig::tick_hz], never
    /// shorter than one tick per second of configured zero.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.tick_hz.max(1) as f32)
    }
}

fn default_tick_hz() -> u32 {
    50
}
fn default_snapshot_depth() -> usize {
    256
}
fn default_flow_width() -> usize {
    FlowConfig::default().width
}
fn default_flow_height() -> usize {
    FlowConfig::default().height
}
fn default_motion_threshold() -> f32 {
    FlowConfig::default().motion_threshold
}
fn default_coincidence_threshold() -> f32 {
    FlowConfig::default().coincidence_threshold
}
fn default_histogram_buckets() -> usize {
    FlowConfig::default().histogram_buckets
}
fn default_max_regions() -> usize {
    FlowConfig::default().max_regions
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
            snapshot_depth: default_snapshot_depth(),
            flow: FlowSettings::default(),
        }
    }
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            width: default_flow_width(),
            height: default_flow_height(),
            motion_threshold: default_motion_threshold(),
            coincidence_threshold: default_coincidence_threshold(),
            histogram_buckets: default_histogram_buckets(),
            max_regions: default_max_regions(),
        }
    }
}

/// Return the path to `~/.burro/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
/// Extracted for testability without mutating environment variables.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".burro").join("config.toml")
}

/// Load the effective configuration for this process: the default path,
/// defaults where the file is missing, then `BURRO_*` overrides on top.
pub fn load() -> Result<RuntimeConfig, BurroError> {
    let mut cfg = load_from(&config_path())?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load the config from a specific path. Returns `None` if the file does
/// not exist. Environment overrides are not applied here.
pub fn load_from(path: &PathBuf) -> Result<Option<RuntimeConfig>, BurroError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        BurroError::Config(format!("failed to read config at {}: {}", path.display(), e))
    })?;
    let cfg: RuntimeConfig = toml::from_str(&raw)
        .map_err(|e| BurroError::Config(format!("failed to parse config: {}", e)))?;
    Ok(Some(cfg))
}

/// Apply `BURRO_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `BURRO_TICK_HZ` | `tick_hz` |
/// | `BURRO_SNAPSHOT_DEPTH` | `snapshot_depth` |
/// | `BURRO_MOTION_THRESHOLD` | `flow.motion_threshold` |
/// | `BURRO_MAX_REGIONS` | `flow.max_regions` |
///
/// Values that fail to parse are ignored.
pub fn apply_env_overrides(cfg: &mut RuntimeConfig) {
    if let Ok(v) = std::env::var("BURRO_TICK_HZ")
        && let Ok(hz) = v.parse::<u32>()
    {
        cfg.tick_hz = hz;
    }
    if let Ok(v) = std::env::var("BURRO_SNAPSHOT_DEPTH")
        && let Ok(depth) = v.parse::<usize>()
    {
        cfg.snapshot_depth = depth;
    }
    if let Ok(v) = std::env::var("BURRO_MOTION_THRESHOLD")
        && let Ok(threshold) = v.parse::<f32>()
    {
        cfg.flow.motion_threshold = threshold;
    }
    if let Ok(v) = std::env::var("BURRO_MAX_REGIONS")
        && let Ok(max) = v.parse::<usize>()
    {
        cfg.flow.max_regions = max;
    }
}
