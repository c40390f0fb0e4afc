use std::fmt;
use std::time::Duration;

use super::call::Call;
use super::direction::Direction;

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CarId(pub usize);

impl fmt::Display for CarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "car-{}", self.0)
    }
}

/// A desire to travel. Hall calls carry a direction and no destination,
/// car calls carry a destination and `Direction::Stop`.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct Request {
    pub id: RequestId,
    pub origin_floor: u8,
    pub direction: Direction,
    pub destination_floor: Option<u8>,
    pub created_at: Duration,
    /// Car whose panel the call was made from. Cleared when the request is
    /// handed back to the fleet for reassignment.
    pub issued_by: Option<CarId>,
}

impl Request {
    pub fn hall(id: RequestId, floor: u8, direction: Direction, created_at: Duration) -> Self {
        assert!(direction != Direction::Stop, "hall call {} needs a direction", id);
        Request {
            id: id,
            origin_floor: floor,
            direction: direction,
            destination_floor: None,
            created_at: created_at,
            issued_by: None,
        }
    }

    pub fn cab(id: RequestId, car: CarId, origin: u8, destination: u8, created_at: Duration) -> Self {
        assert!(origin != destination, "car call {} has identical origin and destination", id);
        Request {
            id: id,
            origin_floor: origin,
            direction: Direction::Stop,
            destination_floor: Some(destination),
            created_at: created_at,
            issued_by: Some(car),
        }
    }

    pub fn call(&self) -> Call {
        self.direction.to_call().unwrap_or(Call::Cab)
    }

    pub fn is_hall_call(&self) -> bool {
        self.destination_floor.is_none()
    }

    /// Direction the passenger wants to travel from `origin_floor`.
    pub fn travel_direction(&self) -> Direction {
        match self.destination_floor {
            Some(destination) => Direction::between(self.origin_floor as f64, destination as f64),
            None => self.direction,
        }
    }

    /// Key under which identical hall calls collapse. Car calls never collapse.
    pub fn dedup_key(&self) -> Option<(u8, Direction)> {
        if self.is_hall_call() {
            Some((self.origin_floor, self.direction))
        } else {
            None
        }
    }
}

/// Expected business outcomes of offering a request to a car or to the fleet.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    OverCapacity,
    MaintenanceMode,
    Duplicate,
    Unassignable,
}

impl Rejection {
    pub fn as_string(self) -> String {
        match self {
            Rejection::OverCapacity => String::from("over capacity"),
            Rejection::MaintenanceMode => String::from("maintenance mode"),
            Rejection::Duplicate => String::from("duplicate"),
            Rejection::Unassignable => String::from("unassignable"),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hall_and_car_calls_share_one_shape() {
        let hall = Request::hall(RequestId(1), 4, Direction::Down, Duration::ZERO);
        assert!(hall.is_hall_call());
        assert_eq!(hall.call(), Call::HallDown);
        assert_eq!(hall.dedup_key(), Some((4, Direction::Down)));

        let cab = Request::cab(RequestId(2), CarId(0), 4, 1, Duration::ZERO);
        assert!(!cab.is_hall_call());
        assert_eq!(cab.call(), Call::Cab);
        assert_eq!(cab.dedup_key(), None);
        assert_eq!(cab.travel_direction(), Direction::Down);
    }

    #[test]
    #[should_panic]
    fn car_call_to_its_own_floor_is_a_bug() {
        Request::cab(RequestId(3), CarId(0), 2, 2, Duration::ZERO);
    }
}
