use super::call::Call;

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Down,
    Stop,
    Up,
}

impl Direction {
    /// Direction of travel needed to get from `from` to `to`.
    pub fn between(from: f64, to: f64) -> Self {
        if to > from {
            Direction::Up
        } else if to < from {
            Direction::Down
        } else {
            Direction::Stop
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Down => Direction::Up,
            Direction::Up => Direction::Down,
            Direction::Stop => Direction::Stop,
        }
    }

    pub fn sign(self) -> f64 {
        match self {
            Direction::Down => -1.0,
            Direction::Stop => 0.0,
            Direction::Up => 1.0,
        }
    }

    /// True if `floor` lies strictly ahead of `position` when travelling this way.
    pub fn is_ahead(self, position: f64, floor: u8) -> bool {
        match self {
            Direction::Up => floor as f64 > position,
            Direction::Down => (floor as f64) < position,
            Direction::Stop => false,
        }
    }

    pub fn as_string(self) -> String {
        match self {
            Direction::Down => String::from("down"),
            Direction::Stop => String::from("stop"),
            Direction::Up => String::from("up"),
        }
    }

    pub fn to_call(self) -> Option<Call> {
        match self {
            Direction::Up => Some(Call::HallUp),
            Direction::Down => Some(Call::HallDown),
            Direction::Stop => None,
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" | "u" => Ok(Direction::Up),
            "down" | "d" => Ok(Direction::Down),
            "stop" | "none" => Ok(Direction::Stop),
            other => Err(format!("unknown direction `{}`", other)),
        }
    }
}
