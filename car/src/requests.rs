//! ----- REQUEST QUEUE -----
//! The requests one car has accepted but not yet served, kept in sweep
//! order: targets ahead in the direction of travel nearest-first, then the
//! ones behind, nearest-first after the turnaround. Equal targets are served
//! oldest-first.

use std::cmp::Ordering;

use shared_resources::direction::Direction;
use shared_resources::request::{Request, RequestId};

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Car has to collect the passenger at the origin floor.
    Pickup,
    /// Passenger is on board and leaves at the destination floor.
    Dropoff,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct QueuedRequest {
    pub request: Request,
    pub phase: Phase,
    pub target: u8,
}

impl QueuedRequest {
    pub fn pickup(request: Request) -> Self {
        QueuedRequest {
            target: request.origin_floor,
            request: request,
            phase: Phase::Pickup,
        }
    }

    pub fn dropoff(request: Request, destination: u8) -> Self {
        QueuedRequest {
            target: destination,
            request: request,
            phase: Phase::Dropoff,
        }
    }

    /// Direction the car must be leaving in for this stop to count.
    /// Dropoffs count in either direction.
    pub fn service_direction(&self) -> Direction {
        match self.phase {
            Phase::Pickup => self.request.travel_direction(),
            Phase::Dropoff => Direction::Stop,
        }
    }

    fn served_going(&self, direction: Direction) -> bool {
        let wanted = self.service_direction();
        wanted == Direction::Stop || wanted == direction
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default)]
pub struct RequestQueue {
    entries: Vec<QueuedRequest>,
}

impl RequestQueue {
    pub fn new() -> Self {
        RequestQueue { entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedRequest> {
        self.entries.iter()
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.entries.iter().any(|entry| entry.request.id == id)
    }

    /// Id of the queued hall call at `floor` going `direction`, if any.
    pub fn hall_call(&self, floor: u8, direction: Direction) -> Option<RequestId> {
        self.entries
            .iter()
            .find(|entry| entry.request.dedup_key() == Some((floor, direction)))
            .map(|entry| entry.request.id)
    }

    pub fn insert(&mut self, entry: QueuedRequest, position: f64, direction: Direction) {
        self.entries.push(entry);
        self.reorder(position, direction);
    }

    pub fn reorder(&mut self, position: f64, direction: Direction) {
        self.entries.sort_by(|a, b| sweep_order(a, b, position, direction));
    }

    pub fn drain(&mut self) -> Vec<QueuedRequest> {
        self.entries.drain(..).collect()
    }

    pub fn requests_at_floor(&self, floor: u8) -> bool {
        self.entries.iter().any(|entry| entry.target == floor)
    }

    pub fn further_requests_in_direction(&self, position: f64, direction: Direction) -> bool {
        self.entries.iter().any(|entry| direction.is_ahead(position, entry.target))
    }

    /// Farthest target ahead of `position` in `direction`.
    pub fn sweep_limit(&self, position: f64, direction: Direction) -> Option<u8> {
        let ahead = self.entries.iter().map(|entry| entry.target).filter(|target| direction.is_ahead(position, *target));
        match direction {
            Direction::Up => ahead.max(),
            Direction::Down => ahead.min(),
            Direction::Stop => None,
        }
    }

    /// Should a car passing `floor` going `direction` stop there?
    pub fn should_stop(&self, floor: u8, direction: Direction) -> bool {
        let here = || self.entries.iter().filter(|entry| entry.target == floor);
        here().any(|entry| entry.served_going(direction))
            || (here().next().is_some() && !self.further_requests_in_direction(floor as f64, direction))
    }

    /// Direction to head in next. Keeps the current sweep while anything is
    /// ahead, otherwise reverses. An idle car heads for its oldest request.
    pub fn next_direction(&self, position: f64, last_direction: Direction) -> Option<Direction> {
        if last_direction == Direction::Stop {
            return self
                .entries
                .iter()
                .min_by_key(|entry| (entry.request.created_at, entry.request.id))
                .map(|entry| Direction::between(position, entry.target as f64))
                .filter(|direction| *direction != Direction::Stop);
        }
        let other_direction = last_direction.opposite();
        if self.further_requests_in_direction(position, last_direction) {
            Some(last_direction)
        } else if self.further_requests_in_direction(position, other_direction) {
            Some(other_direction)
        } else {
            None
        }
    }

    /// Removes and returns the requests served by opening the doors at
    /// `floor` before leaving `direction`, oldest first.
    pub fn take_served(&mut self, floor: u8, direction: Direction) -> Vec<QueuedRequest> {
        let (mut served, kept): (Vec<QueuedRequest>, Vec<QueuedRequest>) = self
            .entries
            .drain(..)
            .partition(|entry| entry.target == floor && entry.served_going(direction));
        self.entries = kept;
        served.sort_by_key(|entry| (entry.request.created_at, entry.request.id));
        served
    }
}

fn sweep_order(a: &QueuedRequest, b: &QueuedRequest, position: f64, direction: Direction) -> Ordering {
    let band = |entry: &QueuedRequest| {
        if direction == Direction::Stop || direction.is_ahead(position, entry.target) {
            0
        } else {
            1
        }
    };
    let distance = |entry: &QueuedRequest| (entry.target as f64 - position).abs();
    band(a)
        .cmp(&band(b))
        .then(distance(a).total_cmp(&distance(b)))
        .then(a.request.created_at.cmp(&b.request.created_at))
        .then(a.request.id.cmp(&b.request.id))
}
