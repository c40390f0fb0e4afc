use shared_resources::config::FleetConfig;
use shared_resources::request::{CarId, Rejection, Request};

use car::view::CarView;

use crate::strategy::{self, AssignmentStrategy};

/// Holds the strategy currently in force. The fleet controller keeps the
/// dispatcher behind its assignment lock, so swapping the strategy and
/// assigning against it never interleave.
pub struct Dispatcher {
    strategy: Box<dyn AssignmentStrategy>,
}

impl Dispatcher {
    pub fn new(strategy: Box<dyn AssignmentStrategy>) -> Self {
        Dispatcher { strategy: strategy }
    }

    pub fn from_config(config: &FleetConfig) -> Self {
        Self::new(strategy::build(config.strategy, config.look_ahead_weight))
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn candidates(&self, request: &Request, cars: &[CarView]) -> Vec<CarId> {
        self.strategy.rank(request, cars)
    }

    pub fn assign(&self, request: &Request, cars: &[CarView]) -> Result<CarId, Rejection> {
        self.strategy.assign(request, cars)
    }

    /// Installs `strategy` and hands back the one it replaced.
    pub fn replace_strategy(&mut self, strategy: Box<dyn AssignmentStrategy>) -> Box<dyn AssignmentStrategy> {
        std::mem::replace(&mut self.strategy, strategy)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").field("strategy", &self.strategy.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use shared_resources::config::StrategyKind;
    use shared_resources::direction::Direction;
    use shared_resources::request::RequestId;
    use shared_resources::state::{DoorState, MotionState};

    use super::*;

    fn idle(id: usize, floor: f64) -> CarView {
        CarView {
            id: CarId(id),
            floor: floor,
            direction: Direction::Stop,
            motion_state: MotionState::Idle,
            door_state: DoorState::Closed,
            queue_depth: 0,
            load: 0,
            capacity: 4,
            has_room: true,
            maintenance: false,
            sweep_limit: None,
        }
    }

    #[test]
    fn follows_the_configured_strategy_until_replaced() {
        let config = FleetConfig { strategy: StrategyKind::NearestIdle, ..FleetConfig::default() };
        let mut dispatcher = Dispatcher::from_config(&config);
        assert_eq!(dispatcher.strategy_name(), "nearest_idle");

        let mut busy = idle(0, 3.0);
        busy.motion_state = MotionState::MovingUp;
        busy.direction = Direction::Up;
        let cars = vec![busy];
        let request = Request::hall(RequestId(1), 6, Direction::Up, Duration::ZERO);
        assert_eq!(dispatcher.assign(&request, &cars), Err(Rejection::Unassignable));

        let old = dispatcher.replace_strategy(strategy::build(StrategyKind::LookAhead, 1.0));
        assert_eq!(old.name(), "nearest_idle");
        assert_eq!(dispatcher.assign(&request, &cars), Ok(CarId(0)));
    }

    #[test]
    fn no_eligible_car_is_unassignable() {
        let dispatcher = Dispatcher::from_config(&FleetConfig::default());
        let mut parked = idle(0, 0.0);
        parked.motion_state = MotionState::Maintenance;
        parked.maintenance = true;
        let request = Request::hall(RequestId(1), 2, Direction::Down, Duration::ZERO);
        assert_eq!(dispatcher.assign(&request, &[parked]), Err(Rejection::Unassignable));
        assert!(dispatcher.candidates(&request, &[]).is_empty());
    }
}
