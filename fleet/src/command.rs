use std::str::FromStr;

use thiserror::Error;

use shared_resources::config::StrategyKind;
use shared_resources::direction::Direction;
use shared_resources::error::CommandError;
use shared_resources::request::{CarId, RequestId};

use crate::controller::FleetController;

/// One line typed at the operator console.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    HallCall { floor: u8, direction: Direction },
    CarCall { car: CarId, floor: u8 },
    Maintenance { car: CarId, on: bool },
    Emergency { car: CarId },
    Reset { car: CarId },
    Strategy(StrategyKind),
    /// Dumps the fleet status as JSON.
    Status,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseCommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command `{0}`, expected one of: hall, car, maintenance, emergency, reset, strategy, status, quit")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("`{0}` is not a number")]
    NotANumber(String),

    #[error("{0}")]
    Invalid(String),
}

const HALL_USAGE: &str = "hall <floor> <up|down>";
const CAR_USAGE: &str = "car <car> <floor>";
const MAINTENANCE_USAGE: &str = "maintenance <car> <on|off>";
const EMERGENCY_USAGE: &str = "emergency <car>";
const RESET_USAGE: &str = "reset <car>";
const STRATEGY_USAGE: &str = "strategy <nearest_idle|direction_aware|look_ahead|scan>";

fn number<T: FromStr>(word: &str) -> Result<T, ParseCommandError> {
    word.parse().map_err(|_| ParseCommandError::NotANumber(word.to_string()))
}

fn car_id(word: &str) -> Result<CarId, ParseCommandError> {
    number(word).map(CarId)
}

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = s.split_whitespace().collect();
        let Some((name, args)) = words.split_first() else {
            return Err(ParseCommandError::Empty);
        };
        match (name.to_ascii_lowercase().as_str(), args) {
            ("hall", [floor, direction]) => {
                let direction: Direction = direction.parse().map_err(ParseCommandError::Invalid)?;
                if direction == Direction::Stop {
                    return Err(ParseCommandError::Usage(HALL_USAGE));
                }
                Ok(Command::HallCall {
                    floor: number(floor)?,
                    direction: direction,
                })
            }
            ("hall", _) => Err(ParseCommandError::Usage(HALL_USAGE)),
            ("car", [id, floor]) => Ok(Command::CarCall {
                car: car_id(id)?,
                floor: number(floor)?,
            }),
            ("car", _) => Err(ParseCommandError::Usage(CAR_USAGE)),
            ("maintenance", [id, switch]) => {
                let on = match switch.to_ascii_lowercase().as_str() {
                    "on" => true,
                    "off" => false,
                    _ => return Err(ParseCommandError::Usage(MAINTENANCE_USAGE)),
                };
                Ok(Command::Maintenance { car: car_id(id)?, on: on })
            }
            ("maintenance", _) => Err(ParseCommandError::Usage(MAINTENANCE_USAGE)),
            ("emergency", [id]) => Ok(Command::Emergency { car: car_id(id)? }),
            ("emergency", _) => Err(ParseCommandError::Usage(EMERGENCY_USAGE)),
            ("reset", [id]) => Ok(Command::Reset { car: car_id(id)? }),
            ("reset", _) => Err(ParseCommandError::Usage(RESET_USAGE)),
            ("strategy", [kind]) => kind
                .parse()
                .map(Command::Strategy)
                .map_err(|e| ParseCommandError::Invalid(e.to_string())),
            ("strategy", _) => Err(ParseCommandError::Usage(STRATEGY_USAGE)),
            ("status", []) => Ok(Command::Status),
            ("quit" | "exit", []) => Ok(Command::Quit),
            (other, _) => Err(ParseCommandError::Unknown(other.to_string())),
        }
    }
}

impl Command {
    /// Carries the command out. Returns the id of the request it created,
    /// if it created one.
    pub fn execute(self, controller: &FleetController) -> Result<Option<RequestId>, CommandError> {
        match self {
            Command::HallCall { floor, direction } => controller.submit_hall_call(floor, direction).map(Some),
            Command::CarCall { car, floor } => controller.submit_car_call(car, floor).map(Some),
            Command::Maintenance { car, on } => controller.set_maintenance(car, on).map(|_| None),
            Command::Emergency { car } => controller.trigger_emergency(car).map(|_| None),
            Command::Reset { car } => controller.reset_emergency(car).map(|_| None),
            Command::Strategy(kind) => {
                controller.set_strategy(kind);
                Ok(None)
            }
            Command::Status | Command::Quit => Ok(None),
        }
    }
}
