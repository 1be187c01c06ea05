use std::fs;
use std::path::{Path, PathBuf};

use rescue_engine::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MISSION_CONFIG_ENV_VAR: &str = "RESCUE_MISSION_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read mission config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse mission config{}: {source}", at_path(.path))]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid mission config at {path}: {message}")]
    Invalid { path: &'static str, message: String },
}

fn at_path(path: &str) -> String {
    if path.is_empty() || path == "." {
        String::new()
    } else {
        format!(" at {path}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FireConfig {
    pub spread_radius: f32,
    pub spread_interval_seconds: f32,
    pub delayed_start_seconds: f32,
}

impl Default for FireConfig {
    fn default() -> Self {
        Self {
            spread_radius: 10.0,
            spread_interval_seconds: 6.0,
            delayed_start_seconds: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CivilianConfig {
    pub stop_at_safe_distance: f32,
    pub safe_point_sample_radius: f32,
    pub spawn_warp_radius: f32,
    pub destination_change_threshold: f32,
    pub move_speed: f32,
}

impl Default for CivilianConfig {
    fn default() -> Self {
        Self {
            stop_at_safe_distance: 1.2,
            safe_point_sample_radius: 2.0,
            spawn_warp_radius: 3.0,
            destination_change_threshold: 0.5,
            move_speed: 3.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResponderConfig {
    pub follow_distance: f32,
    pub fire_detect_range: f32,
    pub assist_range: f32,
    pub recheck_interval_seconds: f32,
    pub interact_cooldown_seconds: f32,
    pub reachable_sample_radius: f32,
    pub move_speed: f32,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            follow_distance: 5.0,
            fire_detect_range: 14.0,
            assist_range: 2.0,
            recheck_interval_seconds: 0.5,
            interact_cooldown_seconds: 0.75,
            reachable_sample_radius: 3.0,
            move_speed: 3.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VehicleConfig {
    pub stopping_distance: f32,
    pub sample_radius: f32,
    pub recheck_interval_seconds: f32,
    pub wait_seconds: f32,
    pub max_speed: f32,
    pub acceleration: f32,
    pub deceleration: f32,
    pub approach_margin: f32,
    pub approach_minimum: f32,
    pub destination_change_threshold: f32,
    pub spawn_warp_radius: f32,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            stopping_distance: 8.0,
            sample_radius: 6.0,
            recheck_interval_seconds: 0.5,
            wait_seconds: 2.0,
            max_speed: 5.5,
            acceleration: 5.0,
            deceleration: 10.0,
            approach_margin: 1.5,
            approach_minimum: 3.0,
            destination_change_threshold: 1.0,
            spawn_warp_radius: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlayerConfig {
    pub interaction_range: f32,
    pub move_speed: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            interaction_range: 5.0,
            move_speed: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoopSettings {
    pub target_tps: u32,
    pub max_sim_seconds: f32,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_sim_seconds: 600.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectConfig {
    pub id: u64,
    pub position: Vec3,
    #[serde(default = "default_object_tag")]
    pub tag: String,
    #[serde(default)]
    pub structure: Option<u64>,
}

fn default_object_tag() -> String {
    rescue_engine::FLAMMABLE_TAG.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FireSpawnConfig {
    pub host: u64,
    #[serde(default)]
    pub delayed: bool,
    #[serde(default)]
    pub emitter: Option<Vec3>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CivilianSpawnConfig {
    pub position: Vec3,
    #[serde(default)]
    pub house: Option<u64>,
    #[serde(default)]
    pub safe_points: Vec<Vec3>,
}

/// A user-supplied world. Missing fields are empty; the demo only applies when the
/// whole `scenario` section is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Navigation grid rows (`#` = blocked), row index is world `z` offset from `origin`.
    pub grid: Vec<String>,
    pub origin: Vec3,
    pub player: Vec3,
    pub objects: Vec<ObjectConfig>,
    pub fires: Vec<FireSpawnConfig>,
    pub civilians: Vec<CivilianSpawnConfig>,
    pub responders: Vec<Vec3>,
    pub vehicles: Vec<Vec3>,
}

impl ScenarioConfig {
    /// Two houses on a 40x30 lot: one burning, one lit after the start delay.
    pub fn demo() -> Self {
        let mut grid = Vec::with_capacity(30);
        for z in 0..30 {
            let row = (0..40)
                .map(|x| {
                    let house_a = (8..12).contains(&x) && (10..14).contains(&z);
                    let house_b = (18..22).contains(&x) && (10..14).contains(&z);
                    if house_a || house_b {
                        '#'
                    } else {
                        '.'
                    }
                })
                .collect::<String>();
            grid.push(row);
        }
        Self {
            grid,
            origin: Vec3::ZERO,
            player: Vec3::new(4.0, 0.0, 4.0),
            objects: vec![
                ObjectConfig {
                    id: 1,
                    position: Vec3::new(10.0, 0.0, 12.0),
                    tag: default_object_tag(),
                    structure: None,
                },
                ObjectConfig {
                    id: 2,
                    position: Vec3::new(20.0, 0.0, 12.0),
                    tag: default_object_tag(),
                    structure: None,
                },
                ObjectConfig {
                    id: 3,
                    position: Vec3::new(14.0, 0.0, 12.0),
                    tag: "Untagged".to_string(),
                    structure: Some(1),
                },
            ],
            fires: vec![
                FireSpawnConfig {
                    host: 1,
                    delayed: false,
                    emitter: Some(Vec3::new(10.0, 2.0, 12.0)),
                },
                FireSpawnConfig {
                    host: 2,
                    delayed: true,
                    emitter: Some(Vec3::new(20.0, 2.0, 12.0)),
                },
            ],
            civilians: vec![
                CivilianSpawnConfig {
                    position: Vec3::new(10.5, 0.0, 9.5),
                    house: Some(1),
                    safe_points: vec![
                        Vec3::new(2.5, 0.0, 2.5),
                        Vec3::new(14.5, 0.0, 3.5),
                        Vec3::new(35.5, 0.0, 25.5),
                    ],
                },
                CivilianSpawnConfig {
                    position: Vec3::new(20.5, 0.0, 9.5),
                    house: Some(2),
                    safe_points: vec![Vec3::new(25.5, 0.0, 3.5), Vec3::new(35.5, 0.0, 25.5)],
                },
            ],
            responders: vec![Vec3::new(6.5, 0.0, 4.5)],
            vehicles: vec![Vec3::new(30.5, 0.0, 27.5)],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MissionConfig {
    pub fire: FireConfig,
    pub civilian: CivilianConfig,
    pub responder: ResponderConfig,
    pub vehicle: VehicleConfig,
    pub player: PlayerConfig,
    #[serde(rename = "loop")]
    pub run: LoopSettings,
    pub scenario: Option<ScenarioConfig>,
}

impl MissionConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let config = serde_path_to_error::deserialize::<_, MissionConfig>(&mut deserializer)
            .map_err(|error| {
                let path = error.path().to_string();
                ConfigError::Parse {
                    path,
                    source: error.into_inner(),
                }
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Reads the file named by [`MISSION_CONFIG_ENV_VAR`], or defaults when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(MISSION_CONFIG_ENV_VAR) {
            Some(path) if !path.is_empty() => Self::load(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("fire.spread_interval_seconds", self.fire.spread_interval_seconds),
            ("responder.follow_distance", self.responder.follow_distance),
            ("responder.recheck_interval_seconds", self.responder.recheck_interval_seconds),
            ("vehicle.recheck_interval_seconds", self.vehicle.recheck_interval_seconds),
            ("vehicle.max_speed", self.vehicle.max_speed),
            ("vehicle.acceleration", self.vehicle.acceleration),
            ("vehicle.deceleration", self.vehicle.deceleration),
            ("loop.max_sim_seconds", self.run.max_sim_seconds),
        ];
        for (path, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid {
                    path,
                    message: format!("expected a finite value > 0, got {value}"),
                });
            }
        }

        let non_negative = [
            ("fire.spread_radius", self.fire.spread_radius),
            ("fire.delayed_start_seconds", self.fire.delayed_start_seconds),
            ("civilian.stop_at_safe_distance", self.civilian.stop_at_safe_distance),
            ("civilian.safe_point_sample_radius", self.civilian.safe_point_sample_radius),
            ("civilian.spawn_warp_radius", self.civilian.spawn_warp_radius),
            ("civilian.destination_change_threshold", self.civilian.destination_change_threshold),
            ("civilian.move_speed", self.civilian.move_speed),
            ("responder.fire_detect_range", self.responder.fire_detect_range),
            ("responder.assist_range", self.responder.assist_range),
            ("responder.interact_cooldown_seconds", self.responder.interact_cooldown_seconds),
            ("responder.reachable_sample_radius", self.responder.reachable_sample_radius),
            ("responder.move_speed", self.responder.move_speed),
            ("vehicle.stopping_distance", self.vehicle.stopping_distance),
            ("vehicle.sample_radius", self.vehicle.sample_radius),
            ("vehicle.wait_seconds", self.vehicle.wait_seconds),
            ("vehicle.approach_margin", self.vehicle.approach_margin),
            ("vehicle.approach_minimum", self.vehicle.approach_minimum),
            ("vehicle.destination_change_threshold", self.vehicle.destination_change_threshold),
            ("vehicle.spawn_warp_radius", self.vehicle.spawn_warp_radius),
            ("player.interaction_range", self.player.interaction_range),
            ("player.move_speed", self.player.move_speed),
        ];
        for (path, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid {
                    path,
                    message: format!("expected a finite value >= 0, got {value}"),
                });
            }
        }

        if self.run.target_tps == 0 {
            return Err(ConfigError::Invalid {
                path: "loop.target_tps",
                message: "expected at least 1 tick per second".to_string(),
            });
        }
        Ok(())
    }

    pub fn scenario_or_demo(&self) -> ScenarioConfig {
        self.scenario.clone().unwrap_or_else(ScenarioConfig::demo)
    }
}
