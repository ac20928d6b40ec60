//! Layered terrain configuration
//!
//! Config is loaded with these layers of precedence (highest wins):
//! 1. Environment variables: `RELIEF_GRID_SPACING`, `RELIEF_HEIGHT_SCALE`,
//!    `RELIEF_ROWS_PER_STEP`, `RELIEF_TICK_INTERVAL_MS`
//! 2. An explicitly requested file
//! 3. Project-local: `.relief/terrain.toml`
//! 4. Global: `~/.relief/terrain.toml`
//! 5. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use relief_core::{ReliefError, Result};
use serde::{Deserialize, Serialize};

use crate::mesh::{MeshSettings, SurfaceAppearance, DEFAULT_GRID_SPACING, DEFAULT_HEIGHT_SCALE};

/// Default rows processed per chunked tick
pub const DEFAULT_ROWS_PER_STEP: u32 = 32;

/// Default interval between chunked ticks
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 10;

/// World-space mesh parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshConfig {
    #[serde(default = "default_grid_spacing")]
    pub grid_spacing: f32,
    #[serde(default = "default_height_scale")]
    pub height_scale: f32,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            grid_spacing: default_grid_spacing(),
            height_scale: default_height_scale(),
        }
    }
}

fn default_grid_spacing() -> f32 {
    DEFAULT_GRID_SPACING
}
fn default_height_scale() -> f32 {
    DEFAULT_HEIGHT_SCALE
}

/// Tuning for time-sliced generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkedConfig {
    #[serde(default = "default_rows_per_step")]
    pub rows_per_step: u32,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for ChunkedConfig {
    fn default() -> Self {
        Self {
            rows_per_step: default_rows_per_step(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

fn default_rows_per_step() -> u32 {
    DEFAULT_ROWS_PER_STEP
}
fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

/// Resolved terrain configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerrainConfig {
    #[serde(default)]
    pub mesh: MeshConfig,
    #[serde(default)]
    pub chunked: ChunkedConfig,
    #[serde(default)]
    pub surface: SurfaceAppearance,
}

/// One config file; every field optional so layers only override what they set
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    mesh: MeshOverrides,
    #[serde(default)]
    chunked: ChunkedOverrides,
    #[serde(default)]
    surface: SurfaceOverrides,
}

#[derive(Debug, Default, Deserialize)]
struct MeshOverrides {
    grid_spacing: Option<f32>,
    height_scale: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkedOverrides {
    rows_per_step: Option<u32>,
    tick_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SurfaceOverrides {
    base_texture: Option<String>,
    material: Option<String>,
}

impl TerrainConfig {
    /// Load config with layered precedence: global < project < explicit < env vars
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = TerrainConfig::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                config.merge_file(&global_path)?;
            }
        }

        let local_path = PathBuf::from(".relief/terrain.toml");
        if local_path.exists() {
            config.merge_file(&local_path)?;
        }

        if let Some(path) = explicit {
            config.merge_file(path)?;
        }

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a specific file path only (plus env overrides)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut config = TerrainConfig::default();
        config.merge_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Mesh settings for a run with the given height scale
    pub fn mesh_settings(&self, height_scale: f32) -> MeshSettings {
        MeshSettings {
            grid_spacing: self.mesh.grid_spacing,
            height_scale,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.chunked.tick_interval_ms)
    }

    /// Reject values no generation run can use
    pub fn validate(&self) -> Result<()> {
        if !self.mesh.grid_spacing.is_finite() || self.mesh.grid_spacing <= 0.0 {
            return Err(ReliefError::ConfigError(format!(
                "grid_spacing must be a positive number, got {}",
                self.mesh.grid_spacing
            )));
        }
        if !self.mesh.height_scale.is_finite() {
            return Err(ReliefError::ConfigError(format!(
                "height_scale must be finite, got {}",
                self.mesh.height_scale
            )));
        }
        if self.chunked.rows_per_step == 0 {
            return Err(ReliefError::ConfigError(
                "rows_per_step must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply `RELIEF_*` overrides using `lookup` to read variables
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("RELIEF_GRID_SPACING") {
            self.mesh.grid_spacing = parse_var("RELIEF_GRID_SPACING", &v)?;
        }
        if let Some(v) = lookup("RELIEF_HEIGHT_SCALE") {
            self.mesh.height_scale = parse_var("RELIEF_HEIGHT_SCALE", &v)?;
        }
        if let Some(v) = lookup("RELIEF_ROWS_PER_STEP") {
            self.chunked.rows_per_step = parse_var("RELIEF_ROWS_PER_STEP", &v)?;
        }
        if let Some(v) = lookup("RELIEF_TICK_INTERVAL_MS") {
            self.chunked.tick_interval_ms = parse_var("RELIEF_TICK_INTERVAL_MS", &v)?;
        }
        Ok(())
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".relief").join("terrain.toml"))
    }

    fn merge_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&content).inspect_err(|e| {
            log::error!("Failed to parse terrain config {}: {}", path.display(), e)
        })?;
        log::debug!("Merging terrain config from {}", path.display());
        self.merge(file);
        Ok(())
    }

    fn merge(&mut self, overlay: ConfigFile) {
        if let Some(v) = overlay.mesh.grid_spacing {
            self.mesh.grid_spacing = v;
        }
        if let Some(v) = overlay.mesh.height_scale {
            self.mesh.height_scale = v;
        }
        if let Some(v) = overlay.chunked.rows_per_step {
            self.chunked.rows_per_step = v;
        }
        if let Some(v) = overlay.chunked.tick_interval_ms {
            self.chunked.tick_interval_ms = v;
        }
        if overlay.surface.base_texture.is_some() {
            self.surface.base_texture = overlay.surface.base_texture;
        }
        if overlay.surface.material.is_some() {
            self.surface.material = overlay.surface.material;
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| {
        ReliefError::ConfigError(format!("{} has invalid value '{}': {}", key, value, e))
    })
}
