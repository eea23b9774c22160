//! Configuration loading and typed config structures for the Habitat core.
//!
//! The canonical configuration lives in `habitat-config.yaml` at the project
//! root; `HABITAT_CONFIG` points the loader elsewhere. Each section mirrors
//! the tunables of one crate, and every field falls back to its default,
//! so an empty file is a valid configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use habitat_agents::{LifecycleConfig, NeedsConfig};
use habitat_animals::AnimalConfig;
use habitat_world::SpatialConfig;
use serde::Deserialize;

/// Environment variable naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "HABITAT_CONFIG";

/// Config file read when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "habitat-config.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `habitat-config.yaml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimulationConfig {
    /// World size, seed, and timing.
    #[serde(default)]
    pub world: WorldConfig,

    /// Spatial index tuning.
    #[serde(default)]
    pub spatial: SpatialConfig,

    /// Needs engine tunables.
    #[serde(default)]
    pub needs: NeedsConfig,

    /// Lifecycle engine tunables.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Animal engine tunables and the species table.
    #[serde(default)]
    pub animals: AnimalConfig,

    /// Initial population.
    #[serde(default)]
    pub population: PopulationConfig,

    /// Batch compute backend selection.
    #[serde(default)]
    pub compute: ComputeConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Load from `$HABITAT_CONFIG`, else `habitat-config.yaml` in the
    /// working directory. Returns `None` when no file exists at that
    /// path, so the caller can fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read or
    /// parsed.
    pub fn load() -> Result<Option<(Self, PathBuf)>, ConfigError> {
        let path = config_path();
        if !path.exists() {
            return Ok(None);
        }
        let config = Self::from_file(&path)?;
        Ok(Some((config, path)))
    }
}

/// Path the loader reads: `$HABITAT_CONFIG` or the default file name.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV).map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorldConfig {
    /// Human-readable simulation name.
    #[serde(default = "default_world_name")]
    pub name: String,

    /// Random seed for reproducibility.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// World width in world units.
    #[serde(default = "default_extent")]
    pub width: f32,

    /// World height in world units.
    #[serde(default = "default_extent")]
    pub height: f32,

    /// Real-time milliseconds between ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Simulated milliseconds advanced per tick.
    #[serde(default = "default_tick_delta_ms")]
    pub tick_delta_ms: u64,

    /// Stop after this many ticks (0 = unlimited).
    #[serde(default)]
    pub max_ticks: u64,

    /// Stop after this many wall-clock seconds (0 = unlimited).
    #[serde(default)]
    pub max_real_time_seconds: u64,

    /// Simulated milliseconds between dead-record sweeps.
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            seed: default_seed(),
            width: default_extent(),
            height: default_extent(),
            tick_interval_ms: default_tick_interval_ms(),
            tick_delta_ms: default_tick_delta_ms(),
            max_ticks: 0,
            max_real_time_seconds: 0,
            cleanup_interval_ms: default_cleanup_interval_ms(),
        }
    }
}

impl WorldConfig {
    /// World width and height.
    pub const fn bounds(&self) -> (f32, f32) {
        (self.width, self.height)
    }
}

/// Initial population and the in-memory port sizes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PopulationConfig {
    /// Agents spawned at start.
    #[serde(default = "default_initial_agents")]
    pub initial_agents: u32,

    /// Animals spawned at start, per species.
    #[serde(default = "default_initial_animals")]
    pub initial_animals: BTreeMap<String, u32>,

    /// Food and water nodes placed at start, per resource kind.
    #[serde(default = "default_resource_nodes")]
    pub resource_nodes: u32,

    /// Units held by each starting resource node.
    #[serde(default = "default_resource_amount")]
    pub resource_amount: f32,

    /// Units of food and water each agent starts with.
    #[serde(default = "default_starting_rations")]
    pub starting_rations: u32,

    /// Carry capacity of the in-memory inventory.
    #[serde(default = "default_carry_capacity")]
    pub carry_capacity: u32,

    /// Members per household in the in-memory household registry.
    #[serde(default = "default_household_capacity")]
    pub household_capacity: usize,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            initial_agents: default_initial_agents(),
            initial_animals: default_initial_animals(),
            resource_nodes: default_resource_nodes(),
            resource_amount: default_resource_amount(),
            starting_rations: default_starting_rations(),
            carry_capacity: default_carry_capacity(),
            household_capacity: default_household_capacity(),
        }
    }
}

/// Batch compute backend selection.
///
/// With `parallel` off, both engines run their batch math on the CPU
/// kernels. With it on, the engine binary attaches the rayon backend to
/// the needs and animal batch paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ComputeConfig {
    /// Attach the rayon data-parallel backend.
    #[serde(default)]
    pub parallel: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (required by serde `default = "..."` attribute)
// ---------------------------------------------------------------------------

fn default_world_name() -> String {
    "Habitat".to_owned()
}

const fn default_seed() -> u64 {
    42
}

const fn default_extent() -> f32 {
    256.0
}

const fn default_tick_interval_ms() -> u64 {
    100
}

const fn default_tick_delta_ms() -> u64 {
    1000
}

const fn default_cleanup_interval_ms() -> u64 {
    30_000
}

const fn default_initial_agents() -> u32 {
    20
}

fn default_initial_animals() -> BTreeMap<String, u32> {
    BTreeMap::from([
        ("rabbit".to_owned(), 30),
        ("deer".to_owned(), 12),
        ("fox".to_owned(), 6),
        ("wolf".to_owned(), 3),
    ])
}

const fn default_resource_nodes() -> u32 {
    12
}

const fn default_resource_amount() -> f32 {
    200.0
}

const fn default_starting_rations() -> u32 {
    5
}

const fn default_carry_capacity() -> u32 {
    20
}

const fn default_household_capacity() -> usize {
    4
}

fn default_log_level() -> String {
    "info".to_owned()
}
