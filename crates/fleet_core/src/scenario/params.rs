use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SimError;

const DEFAULT_TAXI_COUNT: usize = 10;
const DEFAULT_CLIENT_COUNT: usize = 50;
const DEFAULT_SEAT_COUNT: usize = 4;
const DEFAULT_TAXI_SPEED: u32 = 10;
const DEFAULT_CLIENT_SPEED: u32 = 1;
/// Clients spawn uniformly in `[0, window]`.
const DEFAULT_SPAWN_WINDOW: u64 = 100;
const DEFAULT_WORLD_SIZE: i32 = 1000;

/// Integer parameters by name, as handed to dispatch policies and scenario setup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamedParams(BTreeMap<String, i64>);

impl NamedParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: i64) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: i64) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.0.get(name).copied()
    }

    pub fn get_or(&self, name: &str, default: i64) -> i64 {
        self.get(name).unwrap_or(default)
    }

    /// Non-zero means on.
    pub fn flag(&self, name: &str, default: bool) -> bool {
        self.get(name).map_or(default, |value| value != 0)
    }

    /// A value that must be `>= 0`, or `default` when absent.
    pub fn non_negative(&self, name: &str, default: u64) -> Result<u64, SimError> {
        match self.get(name) {
            None => Ok(default),
            Some(value) => u64::try_from(value).map_err(|_| SimError::InvalidParameter {
                name: name.to_string(),
                reason: format!("must be >= 0, got {value}"),
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(name, value)| (name.as_str(), *value))
    }
}

impl<K: Into<String>> FromIterator<(K, i64)> for NamedParams {
    fn from_iter<I: IntoIterator<Item = (K, i64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Fleet and demand configuration for a generated scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScenarioParams {
    pub taxi_count: usize,
    pub client_count: usize,
    pub taxi_seat_count: usize,
    pub taxi_speed: u32,
    /// Client walking speed; sets how long a client is willing to travel.
    pub client_speed: u32,
    pub client_spawn_window: u64,
    pub width: i32,
    pub height: i32,
    pub seed: Option<u64>,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            taxi_count: DEFAULT_TAXI_COUNT,
            client_count: DEFAULT_CLIENT_COUNT,
            taxi_seat_count: DEFAULT_SEAT_COUNT,
            taxi_speed: DEFAULT_TAXI_SPEED,
            client_speed: DEFAULT_CLIENT_SPEED,
            client_spawn_window: DEFAULT_SPAWN_WINDOW,
            width: DEFAULT_WORLD_SIZE,
            height: DEFAULT_WORLD_SIZE,
            seed: None,
        }
    }
}

impl ScenarioParams {
    /// Read `taxiCount`, `clientCount`, ... from `params`, keeping defaults for missing keys.
    pub fn from_named(params: &NamedParams) -> Result<Self, SimError> {
        let defaults = Self::default();
        let read_usize = |name: &str, default: usize| -> Result<usize, SimError> {
            let value = params.non_negative(name, default as u64)?;
            usize::try_from(value).map_err(|_| out_of_range(name, value))
        };
        let read_u32 = |name: &str, default: u32| -> Result<u32, SimError> {
            let value = params.non_negative(name, u64::from(default))?;
            u32::try_from(value).map_err(|_| out_of_range(name, value))
        };
        let read_i32 = |name: &str, default: i32| -> Result<i32, SimError> {
            let value = params.non_negative(name, default as u64)?;
            i32::try_from(value).map_err(|_| out_of_range(name, value))
        };

        let scenario = Self {
            taxi_count: read_usize("taxiCount", defaults.taxi_count)?,
            client_count: read_usize("clientCount", defaults.client_count)?,
            taxi_seat_count: read_usize("taxiSeatCount", defaults.taxi_seat_count)?,
            taxi_speed: read_u32("taxiSpeed", defaults.taxi_speed)?,
            client_speed: read_u32("clientSpeed", defaults.client_speed)?,
            client_spawn_window: params
                .non_negative("clientSpawnWindow", defaults.client_spawn_window)?,
            width: read_i32("width", defaults.width)?,
            height: read_i32("height", defaults.height)?,
            seed: match params.get("seed") {
                None => None,
                Some(_) => Some(params.non_negative("seed", 0)?),
            },
        };
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_fleet(mut self, taxi_count: usize, seats: usize, speed: u32) -> Self {
        self.taxi_count = taxi_count;
        self.taxi_seat_count = seats;
        self.taxi_speed = speed;
        self
    }

    pub fn with_clients(mut self, client_count: usize, walking_speed: u32) -> Self {
        self.client_count = client_count;
        self.client_speed = walking_speed;
        self
    }

    pub fn with_spawn_window(mut self, window: u64) -> Self {
        self.client_spawn_window = window;
        self
    }

    pub fn with_bounds(mut self, width: i32, height: i32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.width <= 0 || self.height <= 0 {
            return Err(SimError::InvalidParameter {
                name: "width/height".to_string(),
                reason: format!("world must be non-empty, got {}x{}", self.width, self.height),
            });
        }
        if self.client_count > 0 && i64::from(self.width) * i64::from(self.height) < 2 {
            return Err(SimError::InvalidParameter {
                name: "width/height".to_string(),
                reason: "clients need at least two distinct positions".to_string(),
            });
        }
        if self.taxi_count > 0 && self.taxi_speed == 0 {
            return Err(SimError::InvalidParameter {
                name: "taxiSpeed".to_string(),
                reason: "taxis must move at least one unit per tick".to_string(),
            });
        }
        Ok(())
    }
}

fn out_of_range(name: &str, value: u64) -> SimError {
    SimError::InvalidParameter {
        name: name.to_string(),
        reason: format!("{value} is out of range"),
    }
}
