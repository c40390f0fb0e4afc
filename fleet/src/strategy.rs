//! ----- ASSIGNMENT STRATEGIES -----
//! A strategy only recommends. It ranks the cars of a snapshot from most to
//! least preferred for one request and never touches a car. Rankings are
//! deterministic: every sort ends in the car id.

use shared_resources::config::StrategyKind;
use shared_resources::direction::Direction;
use shared_resources::request::{CarId, Rejection, Request};
use shared_resources::state::MotionState;

use car::view::CarView;

pub trait AssignmentStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cars in order of preference. Cars that should not take the request
    /// at all are left out.
    fn rank(&self, request: &Request, cars: &[CarView]) -> Vec<CarId>;

    fn assign(&self, request: &Request, cars: &[CarView]) -> Result<CarId, Rejection> {
        self.rank(request, cars).first().copied().ok_or(Rejection::Unassignable)
    }
}

pub fn build(kind: StrategyKind, look_ahead_weight: f64) -> Box<dyn AssignmentStrategy> {
    match kind {
        StrategyKind::NearestIdle => Box::new(NearestIdle),
        StrategyKind::DirectionAware => Box::new(DirectionAware),
        StrategyKind::LookAhead => Box::new(LookAhead { weight: look_ahead_weight }),
        StrategyKind::Scan => Box::new(Scan),
    }
}

fn by_score(mut scored: Vec<(f64, CarId)>) -> Vec<CarId> {
    scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    scored.into_iter().map(|(_, id)| id).collect()
}

/// Chains a preferred ranking with a fallback, keeping each car once.
fn followed_by(mut preferred: Vec<CarId>, fallback: Vec<CarId>) -> Vec<CarId> {
    for id in fallback {
        if !preferred.contains(&id) {
            preferred.push(id);
        }
    }
    preferred
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NearestIdle;

impl AssignmentStrategy for NearestIdle {
    fn name(&self) -> &'static str {
        "nearest_idle"
    }

    fn rank(&self, request: &Request, cars: &[CarView]) -> Vec<CarId> {
        by_score(
            cars.iter()
                .filter(|car| car.is_eligible() && car.motion_state == MotionState::Idle)
                .map(|car| (car.distance_to(request.origin_floor), car.id))
                .collect(),
        )
    }
}

/// Prefers a car already travelling the passenger's way that has yet to
/// pass the origin floor.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectionAware;

impl AssignmentStrategy for DirectionAware {
    fn name(&self) -> &'static str {
        "direction_aware"
    }

    fn rank(&self, request: &Request, cars: &[CarView]) -> Vec<CarId> {
        let wanted = request.travel_direction();
        let passing = by_score(
            cars.iter()
                .filter(|car| car.is_eligible() && car.motion_state.is_moving())
                .filter(|car| car.direction == wanted && wanted.is_ahead(car.floor, request.origin_floor))
                .map(|car| (car.distance_to(request.origin_floor), car.id))
                .collect(),
        );
        followed_by(passing, NearestIdle.rank(request, cars))
    }
}

/// Cost = distance + weight * queue depth. Equal costs go to the lowest id.
#[derive(Debug, Clone, Copy)]
pub struct LookAhead {
    pub weight: f64,
}

impl Default for LookAhead {
    fn default() -> Self {
        LookAhead { weight: 1.0 }
    }
}

impl LookAhead {
    pub fn cost(&self, request: &Request, car: &CarView) -> f64 {
        car.distance_to(request.origin_floor) + self.weight * car.queue_depth as f64
    }
}

impl AssignmentStrategy for LookAhead {
    fn name(&self) -> &'static str {
        "look_ahead"
    }

    fn rank(&self, request: &Request, cars: &[CarView]) -> Vec<CarId> {
        by_score(
            cars.iter()
                .filter(|car| car.is_eligible())
                .map(|car| (self.cost(request, car), car.id))
                .collect(),
        )
    }
}

/// Picks a car whose current sweep runs over the origin floor before it
/// reverses.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scan;

impl Scan {
    fn sweep_covers(car: &CarView, floor: u8) -> bool {
        let Some(limit) = car.sweep_limit else {
            return false;
        };
        let floor = floor as f64;
        match car.direction {
            Direction::Up => car.floor <= floor && floor <= limit as f64,
            Direction::Down => limit as f64 <= floor && floor <= car.floor,
            Direction::Stop => false,
        }
    }
}

impl AssignmentStrategy for Scan {
    fn name(&self) -> &'static str {
        "scan"
    }

    fn rank(&self, request: &Request, cars: &[CarView]) -> Vec<CarId> {
        let covering = by_score(
            cars.iter()
                .filter(|car| car.is_eligible() && Scan::sweep_covers(car, request.origin_floor))
                .map(|car| (car.distance_to(request.origin_floor), car.id))
                .collect(),
        );
        followed_by(covering, NearestIdle.rank(request, cars))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use shared_resources::request::RequestId;
    use shared_resources::state::DoorState;

    use super::*;

    fn view(id: usize, floor: f64, motion_state: MotionState, queue_depth: usize) -> CarView {
        let direction = match motion_state {
            MotionState::MovingUp => Direction::Up,
            MotionState::MovingDown => Direction::Down,
            _ => Direction::Stop,
        };
        CarView {
            id: CarId(id),
            floor: floor,
            direction: direction,
            motion_state: motion_state,
            door_state: DoorState::Closed,
            queue_depth: queue_depth,
            load: 0,
            capacity: 8,
            has_room: true,
            maintenance: false,
            sweep_limit: None,
        }
    }

    fn hall(floor: u8, direction: Direction) -> Request {
        Request::hall(RequestId(1), floor, direction, Duration::ZERO)
    }

    #[test]
    fn nearest_idle_picks_the_closer_car() {
        let cars = vec![view(0, 0.0, MotionState::Idle, 0), view(1, 10.0, MotionState::Idle, 0)];
        assert_eq!(NearestIdle.assign(&hall(8, Direction::Up), &cars), Ok(CarId(1)));
        assert_eq!(NearestIdle.rank(&hall(8, Direction::Up), &cars), vec![CarId(1), CarId(0)]);
    }

    #[test]
    fn nearest_idle_ties_go_to_the_lowest_id() {
        let cars = vec![view(2, 7.0, MotionState::Idle, 0), view(1, 3.0, MotionState::Idle, 0)];
        assert_eq!(NearestIdle.assign(&hall(5, Direction::Down), &cars), Ok(CarId(1)));
    }

    #[test]
    fn nearest_idle_skips_busy_and_out_of_service_cars() {
        let mut parked = view(1, 5.0, MotionState::Idle, 0);
        parked.maintenance = true;
        let mut full = view(2, 5.0, MotionState::Idle, 0);
        full.has_room = false;
        let cars = vec![view(0, 5.0, MotionState::MovingUp, 1), parked, full];
        assert_eq!(NearestIdle.assign(&hall(5, Direction::Up), &cars), Err(Rejection::Unassignable));
    }

    #[test]
    fn direction_aware_prefers_a_car_that_will_pass_by() {
        let cars = vec![
            view(0, 6.0, MotionState::Idle, 0),
            view(1, 2.5, MotionState::MovingUp, 1),
            // already past the origin
            view(2, 7.5, MotionState::MovingUp, 1),
            // going the wrong way
            view(3, 5.5, MotionState::MovingDown, 1),
        ];
        let ranking = DirectionAware.rank(&hall(6, Direction::Up), &cars);
        assert_eq!(ranking, vec![CarId(1), CarId(0)]);
    }

    #[test]
    fn direction_aware_falls_back_to_idle_cars() {
        let cars = vec![view(0, 9.0, MotionState::MovingUp, 2), view(1, 1.0, MotionState::Idle, 0)];
        assert_eq!(DirectionAware.assign(&hall(4, Direction::Down), &cars), Ok(CarId(1)));
    }

    #[test]
    fn look_ahead_trades_distance_against_queue_depth() {
        let cars = vec![view(0, 4.0, MotionState::MovingUp, 5), view(1, 8.0, MotionState::Idle, 0)];
        let request = hall(4, Direction::Up);
        assert_eq!(LookAhead { weight: 1.0 }.assign(&request, &cars), Ok(CarId(1)));
        assert_eq!(LookAhead { weight: 0.5 }.assign(&request, &cars), Ok(CarId(0)));
    }

    #[test]
    fn look_ahead_equal_costs_go_to_the_lowest_id() {
        let cars = vec![view(3, 2.0, MotionState::Idle, 1), view(1, 4.0, MotionState::Idle, 1)];
        assert_eq!(LookAhead::default().assign(&hall(3, Direction::Up), &cars), Ok(CarId(1)));
    }

    #[test]
    fn scan_uses_a_sweep_that_covers_the_floor() {
        let mut sweeping = view(0, 1.0, MotionState::MovingUp, 1);
        sweeping.sweep_limit = Some(9);
        let mut short = view(1, 4.0, MotionState::MovingUp, 1);
        short.sweep_limit = Some(5);
        let cars = vec![sweeping, short, view(2, 7.0, MotionState::Idle, 0)];
        assert_eq!(Scan.rank(&hall(7, Direction::Down), &cars), vec![CarId(0), CarId(2)]);
        assert_eq!(Scan.assign(&hall(5, Direction::Up), &cars), Ok(CarId(1)));
    }

    #[test]
    fn scan_falls_back_to_nearest_idle() {
        let mut sweeping = view(0, 6.0, MotionState::MovingDown, 1);
        sweeping.sweep_limit = Some(2);
        let cars = vec![sweeping, view(1, 9.0, MotionState::Idle, 0)];
        assert_eq!(Scan.assign(&hall(8, Direction::Up), &cars), Ok(CarId(1)));
    }

    #[test]
    fn strategies_are_built_from_their_kind() {
        for kind in [StrategyKind::NearestIdle, StrategyKind::DirectionAware, StrategyKind::LookAhead, StrategyKind::Scan] {
            assert_eq!(build(kind, 1.0).name(), kind.as_string());
        }
    }
}
