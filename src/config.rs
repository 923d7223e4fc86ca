use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::{error, info};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Everything read once at startup. There is no reconfiguration at runtime.
#[derive(Debug, Clone, Deserialize)]
pub struct FlattenConfig {
    /// Meters per cell.
    pub resolution: f64,
    pub max_width_m: f64,
    pub max_height_m: f64,
    /// Points at or below this height are ground.
    pub ground_height_threshold: f64,
    pub update_radius_m: f64,
    pub tick_rate_hz: f64,
    /// Per-subscriber depth of the input channels.
    pub queue_size: usize,
    pub cloud_topic: String,
    pub odom_topic: String,
    pub map2d_topic: String,
    pub sim: SimConfig,
}

/// Synthetic input source used when no robot is attached.
#[derive(Debug, Clone, Deserialize)]
pub struct SimConfig {
    pub enabled: bool,
    pub pose_rate_hz: f64,
    pub cloud_rate_hz: f64,
    /// Radius of the circle the simulated robot drives.
    pub orbit_radius_m: f64,
    pub points_per_frame: usize,
    pub seed: Option<u64>,
}

impl FlattenConfig {
    /// Rejects values the grid or the tick loop cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("resolution", self.resolution),
            ("max_width_m", self.max_width_m),
            ("max_height_m", self.max_height_m),
            ("tick_rate_hz", self.tick_rate_hz),
        ];
        for (key, value) in positive {
            if !(value > 0.0) || !value.is_finite() {
                return Err(ConfigError::Message(format!(
                    "{key} must be positive and finite, got {value}"
                )));
            }
        }
        if !(self.update_radius_m >= 0.0) || !self.update_radius_m.is_finite() {
            return Err(ConfigError::Message(format!(
                "update_radius_m must be non-negative and finite, got {}",
                self.update_radius_m
            )));
        }
        if !self.ground_height_threshold.is_finite() {
            return Err(ConfigError::Message(
                "ground_height_threshold must be finite".to_string(),
            ));
        }
        if self.queue_size == 0 {
            return Err(ConfigError::Message("queue_size must be non-zero".to_string()));
        }
        if self.sim.enabled {
            for (key, value) in [
                ("sim.pose_rate_hz", self.sim.pose_rate_hz),
                ("sim.cloud_rate_hz", self.sim.cloud_rate_hz),
            ] {
                if !(value > 0.0) || !value.is_finite() {
                    return Err(ConfigError::Message(format!(
                        "{key} must be positive and finite, got {value}"
                    )));
                }
            }
            if !(self.sim.orbit_radius_m >= 0.0) || !self.sim.orbit_radius_m.is_finite() {
                return Err(ConfigError::Message(format!(
                    "sim.orbit_radius_m must be non-negative and finite, got {}",
                    self.sim.orbit_radius_m
                )));
            }
        }
        Ok(())
    }

    /// Time between fusion ticks.
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz)
    }
}

fn with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("resolution", 0.05)?
        .set_default("max_width_m", 200.0)?
        .set_default("max_height_m", 200.0)?
        .set_default("ground_height_threshold", 0.55)?
        .set_default("update_radius_m", 15.0)?
        .set_default("tick_rate_hz", 0.5)?
        .set_default("queue_size", 10_i64)?
        .set_default("cloud_topic", "/map")?
        .set_default("odom_topic", "/lio_sam/mapping/odometry")?
        .set_default("map2d_topic", "/map2d")?
        .set_default("sim.enabled", true)?
        .set_default("sim.pose_rate_hz", 20.0)?
        .set_default("sim.cloud_rate_hz", 1.0)?
        .set_default("sim.orbit_radius_m", 5.0)?
        .set_default("sim.points_per_frame", 2000_i64)
}

fn finish(builder: ConfigBuilder<DefaultState>) -> Result<FlattenConfig, ConfigError> {
    let config: FlattenConfig = builder.build()?.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

/// Loads defaults, then the TOML file at `path` (or
/// [`DEFAULT_CONFIG_PATH`] if absent), then `FLATMAP_*` environment
/// variables. An explicitly given file must exist.
pub fn load_config(path: Option<&str>) -> Result<FlattenConfig, ConfigError> {
    let required = path.is_some();
    let path = path.unwrap_or(DEFAULT_CONFIG_PATH);
    info!("Attempting to load configuration from {}", path);

    let settings = with_defaults().and_then(|builder| {
        finish(
            builder
                .add_source(File::new(path, FileFormat::Toml).required(required))
                .add_source(
                    Environment::with_prefix("FLATMAP")
                        .prefix_separator("_")
                        .separator("__")
                        .try_parsing(true),
                ),
        )
    });

    match settings {
        Ok(config) => {
            info!("Successfully loaded configuration: {:?}", config);
            Ok(config)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
fn from_toml_str(toml: &str) -> Result<FlattenConfig, ConfigError> {
    finish(with_defaults()?.add_source(File::from_str(toml, FileFormat::Toml)))
}
