use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use super::error::ConfigError;

const CONFIG_FILE: &str = "config.json";
const FALLBACK_CONFIG_FILE: &str = "_config.json";

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    NearestIdle,
    DirectionAware,
    LookAhead,
    Scan,
}

impl StrategyKind {
    pub fn as_string(self) -> String {
        match self {
            StrategyKind::NearestIdle => String::from("nearest_idle"),
            StrategyKind::DirectionAware => String::from("direction_aware"),
            StrategyKind::LookAhead => String::from("look_ahead"),
            StrategyKind::Scan => String::from("scan"),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "nearest_idle" | "nearest" => Ok(StrategyKind::NearestIdle),
            "direction_aware" | "direction" => Ok(StrategyKind::DirectionAware),
            "look_ahead" | "lookahead" => Ok(StrategyKind::LookAhead),
            "scan" | "look" => Ok(StrategyKind::Scan),
            other => Err(ConfigError::Invalid(format!("unknown assignment strategy `{}`", other))),
        }
    }
}

/// Everything the fleet needs to start. Times are in seconds.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FleetConfig {
    pub num_floors: u8,
    pub fleet_size: usize,
    pub floor_travel_time: f64,
    pub door_transition_time: f64,
    pub door_dwell_time: f64,
    pub car_capacity: u32,
    pub passenger_load: u32,
    pub strategy: StrategyKind,
    pub look_ahead_weight: f64,
    pub pending_timeout: f64,
    pub tick_interval: f64,
    pub event_buffer: usize,
}

impl Default for FleetConfig {
    fn default() -> Self {
        FleetConfig {
            num_floors: 10,
            fleet_size: 2,
            floor_travel_time: 2.0,
            door_transition_time: 1.0,
            door_dwell_time: 3.0,
            car_capacity: 8,
            passenger_load: 1,
            strategy: StrategyKind::Scan,
            look_ahead_weight: 1.0,
            pending_timeout: 10.0,
            tick_interval: 0.1,
            event_buffer: 256,
        }
    }
}

/// Per-car slice of the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CarSettings {
    pub num_floors: u8,
    pub capacity: u32,
    pub passenger_load: u32,
    pub floor_travel_time: Duration,
    pub door_transition_time: Duration,
    pub door_dwell_time: Duration,
}

impl FleetConfig {
    /// Reads the configuration named on the command line, else `config.json`,
    /// else `_config.json`. Falls back to defaults if nothing usable is found.
    pub fn get() -> Self {
        let args: Vec<String> = env::args().skip(1).collect();
        let candidates = match parse_env_args(&args) {
            Some(path) => vec![path],
            None => vec![CONFIG_FILE.to_string(), FALLBACK_CONFIG_FILE.to_string()],
        };
        for path in candidates {
            match Self::load(Path::new(&path)) {
                Ok(config) => {
                    tracing::info!(path = %path, "configuration loaded");
                    return config;
                }
                Err(e) => tracing::warn!("{}, skipping...", e),
            }
        }
        tracing::warn!("No configuration file provided, using default settings...");
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source: source,
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: FleetConfig = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_floors < 2 {
            return Err(ConfigError::Invalid(format!("num_floors must be at least 2, got {}", self.num_floors)));
        }
        if self.fleet_size == 0 {
            return Err(ConfigError::Invalid(String::from("fleet_size must be at least 1")));
        }
        let times = [
            ("floor_travel_time", self.floor_travel_time),
            ("door_transition_time", self.door_transition_time),
            ("door_dwell_time", self.door_dwell_time),
            ("pending_timeout", self.pending_timeout),
            ("tick_interval", self.tick_interval),
        ];
        for (name, value) in times {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!("{} must be a positive number of seconds, got {}", name, value)));
            }
        }
        if self.passenger_load == 0 || self.passenger_load > self.car_capacity {
            return Err(ConfigError::Invalid(format!(
                "passenger_load must be in 1..={}, got {}",
                self.car_capacity, self.passenger_load
            )));
        }
        if !self.look_ahead_weight.is_finite() || self.look_ahead_weight < 0.0 {
            return Err(ConfigError::Invalid(format!("look_ahead_weight must be non-negative, got {}", self.look_ahead_weight)));
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::Invalid(String::from("event_buffer must be at least 1")));
        }
        Ok(())
    }

    pub fn car_settings(&self) -> CarSettings {
        CarSettings {
            num_floors: self.num_floors,
            capacity: self.car_capacity,
            passenger_load: self.passenger_load,
            floor_travel_time: Duration::from_secs_f64(self.floor_travel_time),
            door_transition_time: Duration::from_secs_f64(self.door_transition_time),
            door_dwell_time: Duration::from_secs_f64(self.door_dwell_time),
        }
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(self.tick_interval)
    }

    pub fn pending_timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.pending_timeout)
    }
}

fn parse_env_args(args: &[String]) -> Option<String> {
    let mut config_path = None;
    let mut args = args.iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => match args.next() {
                Some(path) => config_path = Some(path.clone()),
                None => tracing::warn!("--config needs a path, skipping..."),
            },
            _ => tracing::warn!("illegal argument {}, skipping...", arg),
        }
    }
    config_path
}
