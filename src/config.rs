//! Tunables for crossing detection, throttling and portal raycasts.

use std::{fs, path::Path};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read transit config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse transit config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid transit config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Resource)]
#[serde(default)]
pub struct TransitConfig {
    /// Search radius handed to the spatial portal index.
    pub max_portal_radius: f64,
    /// Upper bound on transitions committed by one evaluation.
    pub combo_limit: usize,
    /// Distance the post-teleport checkpoint is pushed off the destination plane.
    pub plane_epsilon: f64,
    /// Segments longer than this are not checked for crossings at all.
    pub max_segment_length: f64,
    /// Simulation rate. Engine velocities are per tick, ECS velocities per second.
    pub ticks_per_second: f64,
    /// Cooldown set by every committed transition. Crossings chained within one
    /// evaluation are not affected by it.
    pub teleport_cooldown_ticks: u64,
    pub vehicle_cooldown_ticks: u64,
    pub forced_cooldown_ticks: u64,
    pub cleanup_cooldown_ticks: u64,
    pub frequent_teleport_window: u64,
    /// Server position syncs are ignored for observers younger than this.
    pub sync_grace_age: u64,
    pub raycast_chain_limit: usize,
    pub reach_distance: f64,
}

impl Default for TransitConfig {
    fn default() -> Self {
        TransitConfig {
            max_portal_radius: 128.,
            combo_limit: 2,
            plane_epsilon: 0.001,
            max_segment_length: 40.,
            ticks_per_second: 20.,
            teleport_cooldown_ticks: 2,
            vehicle_cooldown_ticks: 10,
            forced_cooldown_ticks: 20,
            cleanup_cooldown_ticks: 40,
            frequent_teleport_window: 100,
            sync_grace_age: 200,
            raycast_chain_limit: 4,
            reach_distance: 12.,
        }
    }
}

impl TransitConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: TransitConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = Self::from_json_str(&fs::read_to_string(path)?)?;
        info!("Loaded transit config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("max_portal_radius", self.max_portal_radius),
            ("max_segment_length", self.max_segment_length),
            ("reach_distance", self.reach_distance),
            ("ticks_per_second", self.ticks_per_second),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0. {
                return Err(ConfigError::Invalid(format!("{name} must be positive")));
            }
        }
        if !self.plane_epsilon.is_finite() || self.plane_epsilon < 0. {
            return Err(ConfigError::Invalid(
                "plane_epsilon must not be negative".to_string(),
            ));
        }
        if self.combo_limit == 0 {
            return Err(ConfigError::Invalid(
                "combo_limit must allow at least one transition".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = TransitConfig::from_json_str(r#"{ "combo_limit": 3, "plane_epsilon": 0.01 }"#)
            .unwrap();
        assert_eq!(config.combo_limit, 3);
        assert_eq!(config.plane_epsilon, 0.01);
        assert_eq!(config.max_portal_radius, 128.);
        assert_eq!(config.vehicle_cooldown_ticks, 10);
        assert_eq!(config.teleport_cooldown_ticks, 2);
    }

    #[test]
    fn rejects_zero_tick_rate() {
        let err = TransitConfig::from_json_str(r#"{ "ticks_per_second": 0.0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_combo_limit() {
        let err = TransitConfig::from_json_str(r#"{ "combo_limit": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = TransitConfig::from_json_str("{ combo_limit").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = TransitConfig::load("/nonexistent/transit.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
