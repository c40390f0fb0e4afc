//! ----- FSM MODULE -----
//! The finite state machine of one elevator car. The fleet drives it by
//! calling `advance` once per tick and hands it requests through `accept`.
//! Every motion and door transition is published as a notification.

use std::time::Duration;

use tracing::{debug, info, warn};

use shared_resources::config::CarSettings;
use shared_resources::direction::Direction;
use shared_resources::error::CommandError;
use shared_resources::event::{EventPublisher, FleetEvent};
use shared_resources::request::{CarId, Rejection, Request};
use shared_resources::state::{DoorState, MotionState};

use crate::doors::Doors;
use crate::requests::{Phase, QueuedRequest, RequestQueue};
use crate::view::{CarStatus, CarView};

const FLOOR_EPSILON: f64 = 1e-9;

/// What one call to [`Car::advance`] produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvanceOutcome {
    pub served: Vec<Request>,
    /// Requests whose passenger was refused at the door for lack of room.
    /// They need another car.
    pub refused: Vec<Request>,
    pub state_changed: bool,
}

#[derive(Debug)]
pub struct Car {
    id: CarId,
    settings: CarSettings,
    position: f64,
    direction: Direction,
    motion: MotionState,
    doors: Doors,
    queue: RequestQueue,
    load: u32,
    // riders on board that have not chosen a floor; they leave at the next stop
    unclaimed_load: u32,
    maintenance: bool,
    clock: Duration,
    state_changed: bool,
    events: EventPublisher,
}

impl Car {
    pub fn new(id: CarId, settings: CarSettings, events: EventPublisher) -> Self {
        Car {
            id: id,
            settings: settings,
            position: 0.0,
            direction: Direction::Stop,
            motion: MotionState::Idle,
            doors: Doors::new(),
            queue: RequestQueue::new(),
            load: 0,
            unclaimed_load: 0,
            maintenance: false,
            clock: Duration::ZERO,
            state_changed: false,
            events: events,
        }
    }

    pub fn starting_at(mut self, floor: u8) -> Self {
        assert!(floor < self.settings.num_floors, "{} placed on missing floor {}", self.id, floor);
        self.position = floor as f64;
        self
    }

    pub fn id(&self) -> CarId {
        self.id
    }

    pub fn floor(&self) -> f64 {
        self.position
    }

    /// The floor the car is level with, if any.
    pub fn floor_level(&self) -> Option<u8> {
        let nearest = self.position.round();
        if (self.position - nearest).abs() < FLOOR_EPSILON {
            Some(nearest as u8)
        } else {
            None
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn motion_state(&self) -> MotionState {
        self.motion
    }

    pub fn door_state(&self) -> DoorState {
        self.doors.state()
    }

    pub fn load(&self) -> u32 {
        self.load
    }

    pub fn capacity(&self) -> u32 {
        self.settings.capacity
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    pub fn view(&self) -> CarView {
        CarView {
            id: self.id,
            floor: self.position,
            direction: self.direction,
            motion_state: self.motion,
            door_state: self.doors.state(),
            queue_depth: self.queue.len(),
            load: self.load,
            capacity: self.settings.capacity,
            has_room: self.load.saturating_add(self.settings.passenger_load) <= self.settings.capacity,
            maintenance: self.maintenance,
            sweep_limit: self.queue.sweep_limit(self.position, self.direction),
        }
    }

    pub fn status(&self) -> CarStatus {
        CarStatus {
            view: self.view(),
            queue: self.queue.iter().cloned().collect(),
        }
    }

    /// Offers a request to this car. A car call made from this car's own
    /// panel becomes a dropoff, anything else a pickup at its origin.
    pub fn accept(&mut self, request: Request) -> Result<(), Rejection> {
        assert!(!self.queue.contains(request.id), "{} accepted request {} twice", self.id, request.id);
        if self.maintenance || self.motion.is_out_of_service() {
            return Err(Rejection::MaintenanceMode);
        }
        if self.load.saturating_add(self.settings.passenger_load) > self.settings.capacity {
            return Err(Rejection::OverCapacity);
        }
        if let Some((floor, direction)) = request.dedup_key() {
            if self.queue.hall_call(floor, direction).is_some() {
                return Err(Rejection::Duplicate);
            }
        }

        let entry = match request.destination_floor {
            Some(destination) if request.issued_by == Some(self.id) => {
                // the rider who pressed the button now has a floor
                self.unclaimed_load = self.unclaimed_load.saturating_sub(self.settings.passenger_load);
                QueuedRequest::dropoff(request, destination)
            }
            _ => QueuedRequest::pickup(request),
        };
        assert!(entry.target < self.settings.num_floors, "{} given missing floor {}", self.id, entry.target);
        debug!(car = %self.id, request = %entry.request.id, target = entry.target, phase = ?entry.phase, "request accepted");
        self.queue.insert(entry, self.position, self.direction);
        Ok(())
    }

    /// Passengers counted by a load sensor rather than by a request.
    pub fn board(&mut self, amount: u32) -> Result<(), Rejection> {
        self.load = self
            .load
            .checked_add(amount)
            .filter(|load| *load <= self.settings.capacity)
            .ok_or(Rejection::OverCapacity)?;
        self.unclaimed_load += amount;
        Ok(())
    }

    /// Moves the car forward in time by `dt`.
    pub fn advance(&mut self, dt: Duration) -> AdvanceOutcome {
        self.clock += dt;
        self.state_changed = false;
        let mut outcome = AdvanceOutcome::default();
        match self.motion {
            MotionState::Idle => self.advance_idle(),
            MotionState::MovingUp | MotionState::MovingDown => self.advance_moving(dt),
            MotionState::DoorOpen => self.advance_doors(dt, &mut outcome),
            MotionState::Maintenance | MotionState::Emergency => {}
        }
        outcome.state_changed = self.state_changed;
        outcome
    }

    /// Takes the car out of service (`true`) or returns it (`false`).
    /// Entering hands back every queued request; the car finishes its
    /// current door cycle or rides on to the next floor before halting.
    pub fn set_maintenance(&mut self, on: bool) -> Result<Vec<Request>, CommandError> {
        if !on {
            return match self.motion {
                MotionState::Maintenance => {
                    self.maintenance = false;
                    self.close_doors_now();
                    self.transition(MotionState::Idle);
                    info!(car = %self.id, "back in service");
                    Ok(Vec::new())
                }
                _ if self.maintenance => {
                    self.maintenance = false;
                    info!(car = %self.id, "maintenance cancelled before halting");
                    Ok(Vec::new())
                }
                state => Err(CommandError::InvalidTransition {
                    car: self.id,
                    command: "leave maintenance",
                    state: state,
                }),
            };
        }
        if self.maintenance {
            return Ok(Vec::new());
        }

        self.maintenance = true;
        let halt_floor = self.halt_floor();
        let mut returned = Vec::new();
        for entry in self.queue.drain() {
            let mut request = entry.request;
            request.issued_by = None;
            if entry.phase == Phase::Dropoff {
                // the rider gets off where the car halts and travels on from there
                if entry.target == halt_floor {
                    self.publish(FleetEvent::RequestServed { request_id: request.id, car_id: self.id, floor: halt_floor });
                    continue;
                }
                request.origin_floor = halt_floor;
            }
            returned.push(request);
        }
        info!(car = %self.id, halt_floor = halt_floor, returned = returned.len(), "entering maintenance");
        // an emergency keeps the car where it is until it is reset
        if self.motion == MotionState::Idle && self.floor_level().is_some() {
            self.transition(MotionState::Maintenance);
        }
        Ok(returned)
    }

    /// Stops on the spot and discards the whole queue.
    pub fn trigger_emergency(&mut self) -> Vec<Request> {
        if self.motion == MotionState::Emergency {
            return Vec::new();
        }
        let mut discarded = Vec::new();
        for entry in self.queue.drain() {
            if entry.phase == Phase::Dropoff {
                self.unclaimed_load = (self.unclaimed_load + self.settings.passenger_load).min(self.load);
            }
            self.publish(FleetEvent::RequestDiscarded { request_id: entry.request.id, car_id: self.id });
            discarded.push(entry.request);
        }
        self.transition(MotionState::Emergency);
        let doors = if self.floor_level().is_some() { DoorState::Open } else { DoorState::Closed };
        if let Some(old) = self.doors.set(doors) {
            self.publish_door(old, doors);
        }
        warn!(car = %self.id, floor = self.position, discarded = discarded.len(), "emergency stop");
        discarded
    }

    pub fn reset_emergency(&mut self) -> Result<(), CommandError> {
        if self.motion != MotionState::Emergency {
            return Err(CommandError::InvalidTransition {
                car: self.id,
                command: "reset emergency",
                state: self.motion,
            });
        }
        self.close_doors_now();
        if self.maintenance && self.floor_level().is_some() {
            self.transition(MotionState::Maintenance);
            info!(car = %self.id, "emergency cleared, still in maintenance");
        } else {
            self.transition(MotionState::Idle);
            info!(car = %self.id, maintenance = self.maintenance, "emergency cleared");
        }
        Ok(())
    }

    fn advance_idle(&mut self) {
        if self.maintenance {
            match self.floor_level() {
                Some(_) => self.transition(MotionState::Maintenance),
                // out of service only at a floor
                None => self.start_moving(Direction::between(self.position, self.position.round())),
            }
            return;
        }
        if let Some(floor) = self.floor_level() {
            if self.queue.requests_at_floor(floor) {
                self.open_doors();
                return;
            }
        }
        let next = self.queue.next_direction(self.position, self.direction).or_else(|| {
            // left between floors by an emergency: level with the nearest floor
            self.floor_level().is_none().then(|| Direction::between(self.position, self.position.round()))
        });
        if let Some(direction) = next {
            self.start_moving(direction);
        }
    }

    fn advance_moving(&mut self, dt: Duration) {
        let step = dt.as_secs_f64() / self.settings.floor_travel_time.as_secs_f64();
        let end = self.position + self.direction.sign() * step;
        loop {
            let Some(floor) = self.next_floor() else {
                let top = (self.settings.num_floors - 1) as f64;
                self.position = self.position.clamp(0.0, top);
                self.transition(MotionState::Idle);
                return;
            };
            let crossed = match self.direction {
                Direction::Up => floor as f64 <= end + FLOOR_EPSILON,
                Direction::Down => floor as f64 >= end - FLOOR_EPSILON,
                Direction::Stop => false,
            };
            if !crossed {
                self.position = end;
                return;
            }
            self.position = floor as f64;
            if self.stop_at(floor) {
                return;
            }
        }
    }

    /// Decides what happens when the car reaches `floor` while moving.
    fn stop_at(&mut self, floor: u8) -> bool {
        if self.maintenance {
            self.transition(MotionState::Maintenance);
            return true;
        }
        if self.queue.should_stop(floor, self.direction) {
            self.open_doors();
            return true;
        }
        if !self.queue.further_requests_in_direction(floor as f64, self.direction) {
            self.transition(MotionState::Idle);
            return true;
        }
        false
    }

    fn advance_doors(&mut self, dt: Duration, outcome: &mut AdvanceOutcome) {
        for (old, new) in self.doors.advance(dt, &self.settings) {
            self.publish_door(old, new);
            match new {
                DoorState::Open => self.serve_current_floor(outcome),
                DoorState::Closed => self.doors_closed(),
                DoorState::Opening | DoorState::Closing => {}
            }
        }
    }

    fn doors_closed(&mut self) {
        if self.maintenance {
            self.transition(MotionState::Maintenance);
            return;
        }
        let floor = self.position.round() as u8;
        if self.queue.should_stop(floor, self.direction) {
            // someone called the car to this floor while the doors were open
            let (old, new) = self.doors.open();
            self.publish_door(old, new);
            return;
        }
        match self.queue.next_direction(self.position, self.direction) {
            Some(direction) => self.start_moving(direction),
            None => {
                // nowhere left to go: riders without a floor got off here
                self.load = self.load.saturating_sub(self.unclaimed_load);
                self.unclaimed_load = 0;
                self.transition(MotionState::Idle);
            }
        }
    }

    fn serve_current_floor(&mut self, outcome: &mut AdvanceOutcome) {
        let floor = self.position.round() as u8;
        self.load = self.load.saturating_sub(self.unclaimed_load);
        self.unclaimed_load = 0;

        let mut direction = self.departing_direction(floor);
        let mut served = self.queue.take_served(floor, direction);
        if !self.queue.further_requests_in_direction(floor as f64, direction) {
            let turned = self.queue.take_served(floor, direction.opposite());
            if !turned.is_empty() {
                direction = direction.opposite();
                served.extend(turned);
                served.sort_by_key(|entry| (entry.request.created_at, entry.request.id));
            }
        }
        self.direction = direction;

        // everyone gets off before anyone gets on
        let (dropoffs, pickups): (Vec<QueuedRequest>, Vec<QueuedRequest>) =
            served.into_iter().partition(|entry| entry.phase == Phase::Dropoff);
        for entry in dropoffs {
            self.load = self.load.saturating_sub(self.settings.passenger_load);
            self.finish(entry.request, floor, outcome);
        }
        for entry in pickups {
            self.pick_up(entry.request, floor, outcome);
        }
        self.queue.reorder(self.position, self.direction);
    }

    fn pick_up(&mut self, request: Request, floor: u8, outcome: &mut AdvanceOutcome) {
        if self.load.saturating_add(self.settings.passenger_load) > self.settings.capacity {
            warn!(car = %self.id, request = %request.id, floor = floor, "car full, passenger refused at the door");
            self.publish(FleetEvent::BoardingRefused { request_id: request.id, car_id: self.id, floor: floor });
            let mut request = request;
            request.issued_by = None;
            outcome.refused.push(request);
            return;
        }
        self.load += self.settings.passenger_load;
        assert!(self.load <= self.settings.capacity, "{} boarded past capacity", self.id);
        match request.destination_floor {
            Some(destination) => {
                let mut request = request;
                request.issued_by = Some(self.id);
                self.queue.insert(QueuedRequest::dropoff(request, destination), self.position, self.direction);
            }
            None => {
                self.unclaimed_load += self.settings.passenger_load;
                self.finish(request, floor, outcome);
            }
        }
    }

    fn finish(&mut self, request: Request, floor: u8, outcome: &mut AdvanceOutcome) {
        debug!(car = %self.id, request = %request.id, floor = floor, "request served");
        self.publish(FleetEvent::RequestServed { request_id: request.id, car_id: self.id, floor: floor });
        outcome.served.push(request);
    }

    /// Direction the car leaves a stop in. An idle car follows the oldest
    /// request waiting at this floor.
    fn departing_direction(&self, floor: u8) -> Direction {
        if self.direction != Direction::Stop {
            return self.direction;
        }
        self.queue
            .iter()
            .filter(|entry| entry.target == floor)
            .min_by_key(|entry| (entry.request.created_at, entry.request.id))
            .map(|entry| entry.service_direction())
            .filter(|direction| *direction != Direction::Stop)
            .or_else(|| self.queue.next_direction(self.position, Direction::Stop))
            .unwrap_or(Direction::Up)
    }

    fn next_floor(&self) -> Option<u8> {
        let next = match self.direction {
            Direction::Up => (self.position + FLOOR_EPSILON).floor() + 1.0,
            Direction::Down => (self.position - FLOOR_EPSILON).ceil() - 1.0,
            Direction::Stop => return None,
        };
        if next < 0.0 || next > (self.settings.num_floors - 1) as f64 {
            None
        } else {
            Some(next as u8)
        }
    }

    /// Floor the car will be standing at once it can safely halt.
    fn halt_floor(&self) -> u8 {
        match self.motion {
            MotionState::MovingUp | MotionState::MovingDown => {
                self.next_floor().unwrap_or_else(|| self.position.round() as u8)
            }
            _ => self.position.round() as u8,
        }
    }

    fn start_moving(&mut self, direction: Direction) {
        if let Some(state) = MotionState::moving(direction) {
            self.direction = direction;
            self.queue.reorder(self.position, direction);
            self.transition(state);
        }
    }

    fn open_doors(&mut self) {
        self.transition(MotionState::DoorOpen);
        let (old, new) = self.doors.open();
        self.publish_door(old, new);
    }

    fn close_doors_now(&mut self) {
        if let Some(old) = self.doors.set(DoorState::Closed) {
            self.publish_door(old, DoorState::Closed);
        }
    }

    fn transition(&mut self, next: MotionState) {
        let old = self.motion;
        assert!(old.can_transition_to(next), "{}: illegal transition {:?} -> {:?}", self.id, old, next);
        if next.is_moving() {
            assert!(
                self.doors.state() == DoorState::Closed,
                "{} cannot move with doors {:?}",
                self.id,
                self.doors.state()
            );
        }
        self.motion = next;
        match next {
            MotionState::Idle | MotionState::Emergency => self.direction = Direction::Stop,
            MotionState::Maintenance => {
                self.direction = Direction::Stop;
                // everyone leaves a car that goes out of service
                self.load = 0;
                self.unclaimed_load = 0;
            }
            MotionState::MovingUp | MotionState::MovingDown | MotionState::DoorOpen => {}
        }
        self.state_changed = true;
        debug!(car = %self.id, from = ?old, to = ?next, floor = self.position, "state change");
        self.publish(FleetEvent::CarStateChanged {
            car_id: self.id,
            old_state: old,
            new_state: next,
            floor: self.position,
            timestamp: self.clock,
        });
    }

    fn publish_door(&self, old: DoorState, new: DoorState) {
        self.publish(FleetEvent::DoorStateChanged {
            car_id: self.id,
            old_state: old,
            new_state: new,
            floor: self.position,
            timestamp: self.clock,
        });
    }

    fn publish(&self, event: FleetEvent) {
        self.events.publish(event);
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::Receiver;
    use shared_resources::request::RequestId;

    use super::*;

    const TICK: Duration = Duration::from_millis(100);

    fn settings(capacity: u32) -> CarSettings {
        CarSettings {
            num_floors: 10,
            capacity: capacity,
            passenger_load: 1,
            floor_travel_time: Duration::from_secs(1),
            door_transition_time: Duration::from_millis(500),
            door_dwell_time: Duration::from_secs(1),
        }
    }

    fn car(capacity: u32, floor: u8) -> (Car, Receiver<FleetEvent>) {
        let events = EventPublisher::new(4096);
        let rx = events.subscribe();
        (Car::new(CarId(0), settings(capacity), events).starting_at(floor), rx)
    }

    fn hall(id: u64, floor: u8, direction: Direction) -> Request {
        Request::hall(RequestId(id), floor, direction, Duration::from_secs(id))
    }

    fn cab(id: u64, issued_by: usize, origin: u8, destination: u8) -> Request {
        Request::cab(RequestId(id), CarId(issued_by), origin, destination, Duration::from_secs(id))
    }

    /// Runs `ticks` ticks, checking the safety invariants after each one.
    fn run(car: &mut Car, ticks: usize) -> AdvanceOutcome {
        let mut total = AdvanceOutcome::default();
        for _ in 0..ticks {
            let outcome = car.advance(TICK);
            assert!(!(car.motion_state().is_moving() && car.door_state() != DoorState::Closed));
            assert!(car.load() <= car.capacity());
            total.served.extend(outcome.served);
            total.refused.extend(outcome.refused);
            total.state_changed |= outcome.state_changed;
        }
        total
    }

    fn run_until(car: &mut Car, done: impl Fn(&Car) -> bool) -> AdvanceOutcome {
        let mut total = AdvanceOutcome::default();
        for _ in 0..10_000 {
            if done(car) {
                return total;
            }
            let outcome = run(car, 1);
            total.served.extend(outcome.served);
            total.refused.extend(outcome.refused);
        }
        panic!("car never reached the expected state: {:?}", car.view());
    }

    fn motion_changes(rx: &Receiver<FleetEvent>) -> Vec<MotionState> {
        rx.try_iter()
            .filter_map(|event| match event {
                FleetEvent::CarStateChanged { new_state, .. } => Some(new_state),
                _ => None,
            })
            .collect()
    }

    fn served_ids(outcome: &AdvanceOutcome) -> Vec<u64> {
        outcome.served.iter().map(|request| request.id.0).collect()
    }

    #[test]
    fn hall_call_up_runs_the_full_cycle() {
        let (mut car, rx) = car(4, 0);
        car.accept(hall(1, 5, Direction::Up)).unwrap();

        let outcome = run(&mut car, 200);

        assert_eq!(car.floor(), 5.0);
        assert_eq!(car.motion_state(), MotionState::Idle);
        assert!(car.queue().is_empty());
        assert_eq!(served_ids(&outcome), vec![1]);
        assert_eq!(
            motion_changes(&rx),
            vec![MotionState::MovingUp, MotionState::DoorOpen, MotionState::Idle]
        );
    }

    #[test]
    fn door_cycles_through_every_phase() {
        let (mut car, rx) = car(4, 0);
        car.accept(hall(1, 0, Direction::Up)).unwrap();
        run(&mut car, 50);

        let doors: Vec<DoorState> = rx
            .try_iter()
            .filter_map(|event| match event {
                FleetEvent::DoorStateChanged { new_state, .. } => Some(new_state),
                _ => None,
            })
            .collect();
        assert_eq!(doors, vec![DoorState::Opening, DoorState::Open, DoorState::Closing, DoorState::Closed]);
    }

    #[test]
    fn no_backward_stop_mid_sweep() {
        let (mut car, _rx) = car(8, 0);
        car.accept(cab(1, 0, 0, 8)).unwrap();
        run_until(&mut car, |car| car.floor() >= 2.5);
        assert_eq!(car.motion_state(), MotionState::MovingUp);

        car.accept(cab(2, 0, 2, 1)).unwrap();
        car.accept(cab(3, 0, 2, 5)).unwrap();
        let outcome = run_until(&mut car, |car| car.queue().is_empty() && car.motion_state() == MotionState::Idle);

        assert_eq!(served_ids(&outcome), vec![3, 1, 2]);
        assert_eq!(car.floor(), 1.0);
    }

    #[test]
    fn turns_around_for_a_down_call_at_the_top_of_the_sweep() {
        let (mut car, _rx) = car(8, 0);
        car.accept(hall(1, 6, Direction::Down)).unwrap();
        car.accept(hall(2, 3, Direction::Down)).unwrap();

        let outcome = run_until(&mut car, |car| car.queue().is_empty() && car.motion_state() == MotionState::Idle);

        // the oldest call sets the sweep; the down call at 3 is passed going up
        assert_eq!(served_ids(&outcome), vec![1, 2]);
        assert_eq!(car.floor(), 3.0);
    }

    #[test]
    fn full_car_rejects_requests() {
        let (mut car, _rx) = car(4, 2);
        car.board(4).unwrap();
        assert_eq!(car.accept(cab(1, 0, 2, 7)), Err(Rejection::OverCapacity));
        assert_eq!(car.board(1), Err(Rejection::OverCapacity));
        assert!(car.queue().is_empty());
    }

    #[test]
    fn duplicate_hall_call_is_rejected_but_car_calls_are_not() {
        let (mut car, _rx) = car(8, 0);
        car.accept(hall(1, 4, Direction::Up)).unwrap();
        assert_eq!(car.accept(hall(2, 4, Direction::Up)), Err(Rejection::Duplicate));
        car.accept(hall(3, 4, Direction::Down)).unwrap();
        car.accept(cab(4, 0, 0, 6)).unwrap();
        car.accept(cab(5, 0, 0, 6)).unwrap();
        assert_eq!(car.queue().len(), 4);
    }

    #[test]
    #[should_panic(expected = "twice")]
    fn accepting_the_same_request_twice_is_a_bug() {
        let (mut car, _rx) = car(8, 0);
        car.accept(hall(1, 4, Direction::Up)).unwrap();
        let _ = car.accept(cab(1, 0, 0, 6));
    }

    #[test]
    fn passenger_refused_at_the_door_when_car_fills_up() {
        let (mut car, rx) = car(1, 0);
        car.accept(hall(1, 3, Direction::Up)).unwrap();
        car.accept(cab(2, 7, 3, 7)).unwrap();

        let outcome = run_until(&mut car, |car| car.door_state() == DoorState::Open);

        assert_eq!(served_ids(&outcome), vec![1]);
        assert_eq!(outcome.refused.len(), 1);
        assert_eq!(outcome.refused[0].id, RequestId(2));
        assert_eq!(outcome.refused[0].issued_by, None);
        assert_eq!(car.load(), 1);
        assert!(rx.try_iter().any(|event| matches!(event, FleetEvent::BoardingRefused { .. })));
    }

    #[test]
    fn reassigned_car_call_is_picked_up_then_dropped_off() {
        let (mut car, _rx) = car(4, 0);
        car.accept(cab(1, 3, 2, 6)).unwrap();

        let at_pickup = run_until(&mut car, |car| car.floor() == 2.0 && car.door_state() == DoorState::Open);
        assert!(at_pickup.served.is_empty());
        assert_eq!(car.load(), 1);

        let outcome = run_until(&mut car, |car| car.queue().is_empty() && car.motion_state() == MotionState::Idle);
        assert_eq!(served_ids(&outcome), vec![1]);
        assert_eq!(car.floor(), 6.0);
        assert_eq!(car.load(), 0);
    }

    #[test]
    fn maintenance_mid_sweep_halts_at_next_floor_and_returns_requests() {
        let (mut car, _rx) = car(8, 0);
        car.accept(hall(1, 6, Direction::Up)).unwrap();
        car.accept(hall(2, 8, Direction::Down)).unwrap();
        run_until(&mut car, |car| car.floor() >= 2.5);

        let returned = car.set_maintenance(true).unwrap();
        let ids: Vec<u64> = returned.iter().map(|request| request.id.0).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&1) && ids.contains(&2));
        assert!(car.motion_state().is_moving());
        assert_eq!(car.accept(hall(3, 5, Direction::Up)), Err(Rejection::MaintenanceMode));

        run_until(&mut car, |car| car.motion_state() == MotionState::Maintenance);
        assert_eq!(car.floor(), 3.0);
        run(&mut car, 20);
        assert_eq!(car.floor(), 3.0);

        car.set_maintenance(false).unwrap();
        assert_eq!(car.motion_state(), MotionState::Idle);
        car.accept(hall(4, 5, Direction::Up)).unwrap();
    }

    #[test]
    fn riders_leave_a_car_going_into_maintenance() {
        let (mut car, _rx) = car(8, 1);
        car.accept(cab(1, 0, 1, 4)).unwrap();
        run(&mut car, 2);
        let returned = car.set_maintenance(true).unwrap();
        assert_eq!(returned.len(), 1);
        // rider continues from the floor the car halts at
        assert_eq!(returned[0].origin_floor, 2);
        assert_eq!(returned[0].destination_floor, Some(4));
        assert_eq!(returned[0].issued_by, None);
    }

    #[test]
    fn leaving_maintenance_when_not_in_it_is_refused() {
        let (mut car, _rx) = car(8, 0);
        assert!(matches!(
            car.set_maintenance(false),
            Err(CommandError::InvalidTransition { state: MotionState::Idle, .. })
        ));
        assert!(car.reset_emergency().is_err());
    }

    #[test]
    fn emergency_between_floors_stops_immediately_and_discards_queue() {
        let (mut car, rx) = car(8, 0);
        for (id, floor) in [(1, 7), (2, 8), (3, 9)] {
            car.accept(cab(id, 0, 0, floor)).unwrap();
        }
        run_until(&mut car, |car| car.floor() > 3.3);
        let stopped_at = car.floor();
        assert!(stopped_at < 4.0);

        let discarded = car.trigger_emergency();

        assert_eq!(discarded.len(), 3);
        assert!(car.queue().is_empty());
        assert_eq!(car.motion_state(), MotionState::Emergency);
        assert_eq!(car.door_state(), DoorState::Closed);
        run(&mut car, 30);
        assert_eq!(car.floor(), stopped_at);
        let discards = rx.try_iter().filter(|event| matches!(event, FleetEvent::RequestDiscarded { .. })).count();
        assert_eq!(discards, 3);
        assert_eq!(car.accept(hall(4, 2, Direction::Up)), Err(Rejection::MaintenanceMode));

        car.reset_emergency().unwrap();
        run_until(&mut car, |car| car.motion_state() == MotionState::Idle && car.floor_level().is_some());
        assert_eq!(car.floor_level(), Some(stopped_at.round() as u8));
    }

    #[test]
    fn emergency_at_floor_level_opens_doors() {
        let (mut car, _rx) = car(8, 2);
        car.trigger_emergency();
        assert_eq!(car.door_state(), DoorState::Open);
        car.reset_emergency().unwrap();
        assert_eq!(car.door_state(), DoorState::Closed);
        assert_eq!(car.motion_state(), MotionState::Idle);
    }

    #[test]
    fn emergency_does_not_end_maintenance() {
        let (mut car, _rx) = car(8, 2);
        car.set_maintenance(true).unwrap();
        assert_eq!(car.motion_state(), MotionState::Maintenance);

        car.trigger_emergency();
        car.reset_emergency().unwrap();

        assert_eq!(car.motion_state(), MotionState::Maintenance);
        assert_eq!(car.door_state(), DoorState::Closed);
        assert!(!car.view().is_eligible());
        assert_eq!(car.accept(hall(1, 5, Direction::Up)), Err(Rejection::MaintenanceMode));
        car.set_maintenance(false).unwrap();
        assert_eq!(car.motion_state(), MotionState::Idle);
    }

    #[test]
    fn maintenance_during_an_emergency_parks_at_a_floor_after_reset() {
        let (mut car, _rx) = car(8, 0);
        car.accept(cab(1, 0, 0, 8)).unwrap();
        run_until(&mut car, |car| car.floor() > 2.5);
        car.trigger_emergency();
        let stopped_at = car.floor();
        assert!(car.floor_level().is_none());

        assert!(car.set_maintenance(true).unwrap().is_empty());
        assert_eq!(car.motion_state(), MotionState::Emergency);
        assert_eq!(car.floor(), stopped_at);

        car.reset_emergency().unwrap();
        assert!(!car.view().is_eligible());
        run_until(&mut car, |car| car.motion_state() == MotionState::Maintenance);
        assert_eq!(car.floor_level(), Some(stopped_at.round() as u8));
        run(&mut car, 20);
        assert_eq!(car.floor_level(), Some(stopped_at.round() as u8));
    }

    #[test]
    fn emergency_on_the_way_to_maintenance_keeps_it_out_of_service() {
        let (mut car, _rx) = car(8, 0);
        car.accept(cab(1, 0, 0, 8)).unwrap();
        run_until(&mut car, |car| car.floor() > 1.5);
        car.set_maintenance(true).unwrap();
        car.trigger_emergency();
        car.reset_emergency().unwrap();

        run_until(&mut car, |car| car.motion_state() == MotionState::Maintenance);
        assert_eq!(car.floor_level(), Some(2));
    }

    #[test]
    fn oversized_load_reading_is_refused() {
        let (mut car, _rx) = car(4, 0);
        car.board(1).unwrap();
        assert_eq!(car.board(u32::MAX), Err(Rejection::OverCapacity));
        assert_eq!(car.load(), 1);
        car.board(3).unwrap();
        assert_eq!(car.load(), 4);
    }

    #[test]
    fn call_at_open_doors_reopens_them() {
        let (mut car, _rx) = car(8, 0);
        car.accept(hall(1, 0, Direction::Up)).unwrap();
        run_until(&mut car, |car| car.door_state() == DoorState::Open);
        car.accept(hall(2, 0, Direction::Up)).unwrap();

        let outcome = run_until(&mut car, |car| car.motion_state() == MotionState::Idle);
        assert_eq!(served_ids(&outcome), vec![2]);
        assert_eq!(car.floor(), 0.0);
    }

    #[test]
    fn view_reports_sweep_limit() {
        let (mut car, _rx) = car(8, 0);
        car.accept(cab(1, 0, 0, 4)).unwrap();
        car.accept(cab(2, 0, 0, 7)).unwrap();
        run(&mut car, 1);
        let view = car.view();
        assert_eq!(view.motion_state, MotionState::MovingUp);
        assert_eq!(view.sweep_limit, Some(7));
        assert_eq!(view.queue_depth, 2);
        assert!(view.is_eligible());
    }
}
