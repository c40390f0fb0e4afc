use thiserror::Error;

use super::request::{CarId, Rejection};
use super::state::MotionState;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse configuration file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Operator and passenger commands that cannot be carried out.
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("no car with id {0}")]
    UnknownCar(CarId),

    #[error("{car} is out of service after a fault")]
    CarUnavailable { car: CarId },

    #[error("floor {floor} is outside 0..{num_floors}")]
    FloorOutOfRange { floor: u8, num_floors: u8 },

    #[error("no hall button going {direction} at floor {floor}")]
    InvalidDirection { floor: u8, direction: String },

    #[error("{car} is already at floor {floor}")]
    SameFloor { car: CarId, floor: u8 },

    #[error("{car} refused: {reason}")]
    Refused { car: CarId, reason: Rejection },

    #[error("{car} cannot {command} while {state:?}")]
    InvalidTransition {
        car: CarId,
        command: &'static str,
        state: MotionState,
    },
}
