use super::direction::Direction;

#[derive(serde::Serialize, serde::Deserialize, PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum MotionState {
    Idle,
    MovingUp,
    MovingDown,
    DoorOpen,
    Maintenance,
    Emergency,
}

impl MotionState {
    pub fn moving(direction: Direction) -> Option<Self> {
        match direction {
            Direction::Up => Some(MotionState::MovingUp),
            Direction::Down => Some(MotionState::MovingDown),
            Direction::Stop => None,
        }
    }

    pub fn is_moving(self) -> bool {
        matches!(self, MotionState::MovingUp | MotionState::MovingDown)
    }

    /// Maintenance and emergency take the car out of service.
    pub fn is_out_of_service(self) -> bool {
        matches!(self, MotionState::Maintenance | MotionState::Emergency)
    }

    pub fn can_transition_to(self, next: MotionState) -> bool {
        use MotionState::*;
        match (self, next) {
            (_, Emergency) => self != Emergency,
            (_, Maintenance) => self != Maintenance,
            (Idle, MovingUp | MovingDown | DoorOpen) => true,
            (MovingUp | MovingDown, DoorOpen | Idle) => true,
            (DoorOpen, Idle | MovingUp | MovingDown) => true,
            (Maintenance | Emergency, Idle) => true,
            _ => false,
        }
    }

    pub fn as_string(&self) -> String {
        match self {
            MotionState::Idle => String::from("idle"),
            MotionState::MovingUp => String::from("movingUp"),
            MotionState::MovingDown => String::from("movingDown"),
            MotionState::DoorOpen => String::from("doorOpen"),
            MotionState::Maintenance => String::from("maintenance"),
            MotionState::Emergency => String::from("emergency"),
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum DoorState {
    Closed,
    Opening,
    Open,
    Closing,
}

impl DoorState {
    /// Next phase of the open/close cycle.
    pub fn next(self) -> Self {
        match self {
            DoorState::Closed => DoorState::Opening,
            DoorState::Opening => DoorState::Open,
            DoorState::Open => DoorState::Closing,
            DoorState::Closing => DoorState::Closed,
        }
    }

    pub fn as_string(&self) -> String {
        match self {
            DoorState::Closed => String::from("closed"),
            DoorState::Opening => String::from("opening"),
            DoorState::Open => String::from("open"),
            DoorState::Closing => String::from("closing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MotionState::*;

    #[test]
    fn any_state_can_be_interrupted() {
        for state in [Idle, MovingUp, MovingDown, DoorOpen, Maintenance] {
            assert!(state.can_transition_to(Emergency));
        }
        for state in [Idle, MovingUp, MovingDown, DoorOpen, Emergency] {
            assert!(state.can_transition_to(Maintenance));
        }
    }

    #[test]
    fn no_direct_reversal_or_jump_out_of_service() {
        assert!(!MovingUp.can_transition_to(MovingDown));
        assert!(!Maintenance.can_transition_to(MovingUp));
        assert!(!Emergency.can_transition_to(DoorOpen));
        assert!(!Idle.can_transition_to(Idle));
    }
}
