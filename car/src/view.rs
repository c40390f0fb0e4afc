use shared_resources::direction::Direction;
use shared_resources::request::CarId;
use shared_resources::state::{DoorState, MotionState};

use crate::requests::QueuedRequest;

/// Read-only projection of a car handed to assignment strategies.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct CarView {
    pub id: CarId,
    pub floor: f64,
    pub direction: Direction,
    pub motion_state: MotionState,
    pub door_state: DoorState,
    pub queue_depth: usize,
    pub load: u32,
    pub capacity: u32,
    /// Whether one more passenger fits.
    pub has_room: bool,
    pub maintenance: bool,
    /// Farthest queued target ahead in the current direction.
    pub sweep_limit: Option<u8>,
}

impl CarView {
    /// Can take new requests at all.
    pub fn is_eligible(&self) -> bool {
        !self.maintenance && !self.motion_state.is_out_of_service() && self.has_room
    }

    pub fn distance_to(&self, floor: u8) -> f64 {
        (self.floor - floor as f64).abs()
    }
}

/// Everything the status display shows about one car.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct CarStatus {
    pub view: CarView,
    pub queue: Vec<QueuedRequest>,
}
