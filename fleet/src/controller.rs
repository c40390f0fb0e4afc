//! ----- FLEET CONTROLLER -----
//! Owns the cars and the pending pool. Every assignment, whether it comes
//! from a new request, a car handing requests back or a retry of the
//! pending pool, goes through the dispatcher lock, so no two assignments
//! ever work against different snapshots at the same time.
//!
//! Lock order: dispatcher, then pending pool, then one car at a time. A car
//! lock is never held while another lock is taken.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{select, tick, Receiver};
use tracing::{debug, error, info, warn};

use shared_resources::config::{FleetConfig, StrategyKind};
use shared_resources::direction::Direction;
use shared_resources::error::{CommandError, ConfigError};
use shared_resources::event::{EventPublisher, FleetEvent};
use shared_resources::request::{CarId, Rejection, Request, RequestId};

use car::fsm::{AdvanceOutcome, Car};
use car::requests::Phase;
use car::view::{CarStatus, CarView};

use crate::dispatcher::Dispatcher;
use crate::pending_pool::PendingPool;
use crate::strategy;

pub struct FleetController {
    config: FleetConfig,
    cars: Vec<Mutex<Car>>,
    // set once a car's worker has panicked and its requests were rescued
    failed: Vec<AtomicBool>,
    dispatcher: Mutex<Dispatcher>,
    pending: Mutex<PendingPool>,
    next_request_id: AtomicU64,
    clock_nanos: AtomicU64,
    events: EventPublisher,
}

impl FleetController {
    /// Builds the fleet with every car waiting at the ground floor.
    pub fn new(config: FleetConfig) -> Result<Self, ConfigError> {
        let start_floors = vec![0; config.fleet_size];
        Self::with_start_floors(config, &start_floors)
    }

    pub fn with_start_floors(config: FleetConfig, start_floors: &[u8]) -> Result<Self, ConfigError> {
        config.validate()?;
        if start_floors.len() != config.fleet_size {
            return Err(ConfigError::Invalid(format!(
                "{} start floors given for a fleet of {}",
                start_floors.len(),
                config.fleet_size
            )));
        }
        if let Some(floor) = start_floors.iter().find(|floor| **floor >= config.num_floors) {
            return Err(ConfigError::Invalid(format!(
                "start floor {} is outside 0..{}",
                floor, config.num_floors
            )));
        }

        let events = EventPublisher::new(config.event_buffer);
        let settings = config.car_settings();
        let cars = start_floors
            .iter()
            .enumerate()
            .map(|(index, floor)| Mutex::new(Car::new(CarId(index), settings.clone(), events.clone()).starting_at(*floor)))
            .collect();
        info!(
            cars = config.fleet_size,
            floors = config.num_floors,
            strategy = %config.strategy.as_string(),
            "fleet ready"
        );

        Ok(FleetController {
            failed: (0..config.fleet_size).map(|_| AtomicBool::new(false)).collect(),
            dispatcher: Mutex::new(Dispatcher::from_config(&config)),
            pending: Mutex::new(PendingPool::new(config.pending_timeout_duration())),
            next_request_id: AtomicU64::new(1),
            clock_nanos: AtomicU64::new(0),
            cars: cars,
            events: events,
            config: config,
        })
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn subscribe(&self) -> Receiver<FleetEvent> {
        self.events.subscribe()
    }

    /// Simulated time since start.
    pub fn now(&self) -> Duration {
        Duration::from_nanos(self.clock_nanos.load(Ordering::SeqCst))
    }

    pub fn car_ids(&self) -> impl Iterator<Item = CarId> {
        (0..self.cars.len()).map(CarId)
    }

    pub fn strategy_name(&self) -> &'static str {
        self.authority().strategy_name()
    }

    /// Views of every car still in working order.
    pub fn snapshot(&self) -> Vec<CarView> {
        self.cars.iter().filter_map(|slot| slot.lock().ok().map(|car| car.view())).collect()
    }

    pub fn pending_requests(&self) -> Vec<Request> {
        self.pending_pool().get_requests()
    }

    pub fn car_status(&self, car_id: CarId) -> Result<CarStatus, CommandError> {
        self.lock_car(car_id).map(|car| car.status())
    }

    /// Registers a hall call. Pressing a button that is already lit joins
    /// the request that lit it.
    pub fn submit_hall_call(&self, floor: u8, direction: Direction) -> Result<RequestId, CommandError> {
        self.check_floor(floor)?;
        let has_button = match direction {
            Direction::Up => floor + 1 < self.config.num_floors,
            Direction::Down => floor > 0,
            Direction::Stop => false,
        };
        if !has_button {
            return Err(CommandError::InvalidDirection {
                floor: floor,
                direction: direction.as_string(),
            });
        }

        let dispatcher = self.authority();
        let mut pending = self.pending_pool();
        if let Some(existing) = self.find_hall_call(&pending, floor, direction) {
            debug!(request = %existing, floor = floor, direction = %direction.as_string(), "hall call already registered");
            return Ok(existing);
        }
        let request = Request::hall(self.issue_id(), floor, direction, self.now());
        let id = request.id;
        info!(request = %id, floor = floor, direction = %direction.as_string(), "hall call");
        self.place(&dispatcher, &mut pending, request);
        Ok(id)
    }

    /// Registers a destination chosen inside `car_id`. The car itself gets
    /// the first chance; if it refuses, the passenger is collected by
    /// another car from the floor they are standing at.
    pub fn submit_car_call(&self, car_id: CarId, destination: u8) -> Result<RequestId, CommandError> {
        self.check_floor(destination)?;
        let dispatcher = self.authority();
        let mut pending = self.pending_pool();
        let mut car = self.lock_car(car_id)?;
        let origin = car.floor().round() as u8;
        if origin == destination {
            return Err(CommandError::SameFloor {
                car: car_id,
                floor: destination,
            });
        }

        let mut request = Request::cab(self.issue_id(), car_id, origin, destination, self.now());
        let id = request.id;
        match car.accept(request.clone()) {
            Ok(()) => {
                info!(request = %id, car = %car_id, destination = destination, "car call");
                return Ok(id);
            }
            Err(reason) => {
                info!(request = %id, car = %car_id, reason = %reason, "car call handed to the fleet");
            }
        }
        drop(car);

        request.issued_by = None;
        self.place(&dispatcher, &mut pending, request);
        Ok(id)
    }

    /// Entering maintenance redistributes the car's queue right away.
    pub fn set_maintenance(&self, car_id: CarId, on: bool) -> Result<(), CommandError> {
        let dispatcher = self.authority();
        let returned = self.lock_car(car_id)?.set_maintenance(on)?;
        let mut pending = self.pending_pool();
        for request in returned {
            self.place(&dispatcher, &mut pending, request);
        }
        drop(pending);
        if !on {
            self.retry_pending(&dispatcher, false);
        }
        Ok(())
    }

    /// Takes effect at once; does not wait for the dispatcher.
    pub fn trigger_emergency(&self, car_id: CarId) -> Result<(), CommandError> {
        self.lock_car(car_id)?.trigger_emergency();
        Ok(())
    }

    pub fn reset_emergency(&self, car_id: CarId) -> Result<(), CommandError> {
        let dispatcher = self.authority();
        self.lock_car(car_id)?.reset_emergency()?;
        self.retry_pending(&dispatcher, false);
        Ok(())
    }

    /// Swaps the assignment strategy and gives every held request another
    /// go under the new one before any other assignment can run.
    pub fn set_strategy(&self, kind: StrategyKind) {
        let mut dispatcher = self.authority();
        let old = dispatcher.replace_strategy(strategy::build(kind, self.config.look_ahead_weight));
        info!(from = old.name(), to = dispatcher.strategy_name(), "assignment strategy replaced");
        self.retry_pending(&dispatcher, false);
    }

    /// Passengers counted by a car's load sensor.
    pub fn board(&self, car_id: CarId, amount: u32) -> Result<(), CommandError> {
        self.lock_car(car_id)?.board(amount).map_err(|reason| CommandError::Refused {
            car: car_id,
            reason: reason,
        })
    }

    /// Advances every car by one tick interval, each on its own thread, then
    /// hands refused passengers back to the fleet and retries the pending
    /// pool: all of it if any car changed state, otherwise only requests
    /// that have waited past the timeout.
    pub fn tick(&self) {
        let dt = self.config.tick_duration();
        let step = u64::try_from(dt.as_nanos()).unwrap_or(u64::MAX);
        self.clock_nanos.fetch_add(step, Ordering::SeqCst);

        let outcomes = self.advance_cars(dt);

        let dispatcher = self.authority();
        let mut pending = self.pending_pool();
        let mut changed = false;
        for (car_id, outcome) in outcomes {
            match outcome {
                Some(outcome) => {
                    changed |= outcome.state_changed || !outcome.refused.is_empty();
                    for request in outcome.refused {
                        self.place(&dispatcher, &mut pending, request);
                    }
                }
                None => {
                    changed = true;
                    self.rescue(car_id, &dispatcher, &mut pending);
                }
            }
        }
        drop(pending);
        self.retry_pending(&dispatcher, !changed);
    }

    /// Ticks on the configured interval until `stop` fires or disconnects.
    pub fn run(&self, stop: Receiver<()>) {
        let ticker = tick(self.config.tick_duration());
        info!(interval = ?self.config.tick_duration(), "simulation running");
        loop {
            select! {
                recv(ticker) -> _ => self.tick(),
                recv(stop) -> _ => {
                    info!("simulation stopped");
                    return;
                },
            }
        }
    }

    fn advance_cars(&self, dt: Duration) -> Vec<(CarId, Option<AdvanceOutcome>)> {
        thread::scope(|scope| {
            let mut workers = Vec::new();
            for (index, slot) in self.cars.iter().enumerate() {
                let car_id = CarId(index);
                if self.failed[index].load(Ordering::SeqCst) {
                    continue;
                }
                let spawned = thread::Builder::new()
                    .name(car_id.to_string())
                    .spawn_scoped(scope, move || slot.lock().ok().map(|mut car| car.advance(dt)));
                match spawned {
                    Ok(handle) => workers.push((car_id, handle)),
                    Err(e) => error!(car = %car_id, "could not start car worker: {}", e),
                }
            }
            workers
                .into_iter()
                .map(|(car_id, handle)| match handle.join() {
                    Ok(outcome) => (car_id, outcome),
                    Err(_) => {
                        error!(car = %car_id, "car worker panicked");
                        (car_id, None)
                    }
                })
                .collect()
        })
    }

    /// Takes a broken car out of the fleet. Passengers still waiting for it
    /// are reassigned, the ones on board are reported discarded.
    fn rescue(&self, car_id: CarId, dispatcher: &Dispatcher, pending: &mut PendingPool) {
        if self.failed[car_id.0].swap(true, Ordering::SeqCst) {
            return;
        }
        let queued: Vec<_> = {
            let car = self.cars[car_id.0].lock().unwrap_or_else(PoisonError::into_inner);
            car.queue().iter().cloned().collect()
        };
        error!(car = %car_id, queued = queued.len(), "car out of service after a fault");
        for entry in queued {
            match entry.phase {
                Phase::Pickup => {
                    let mut request = entry.request;
                    request.issued_by = None;
                    self.place(dispatcher, pending, request);
                }
                Phase::Dropoff => self.events.publish(FleetEvent::RequestDiscarded {
                    request_id: entry.request.id,
                    car_id: car_id,
                }),
            }
        }
    }

    /// Walks the strategy's ranking until a car accepts.
    fn dispatch(&self, dispatcher: &Dispatcher, request: &Request) -> Result<CarId, Rejection> {
        let cars = self.snapshot();
        for car_id in dispatcher.candidates(request, &cars) {
            let Ok(mut car) = self.lock_car(car_id) else {
                continue;
            };
            match car.accept(request.clone()) {
                Ok(()) => {
                    info!(request = %request.id, car = %car_id, strategy = dispatcher.strategy_name(), "request assigned");
                    return Ok(car_id);
                }
                Err(Rejection::Duplicate) => {
                    let queued = request
                        .dedup_key()
                        .and_then(|(floor, direction)| car.queue().hall_call(floor, direction));
                    if let Some(merged_into) = queued {
                        debug!(request = %request.id, car = %car_id, into = %merged_into, "merged with a stop already queued");
                        self.events.publish(FleetEvent::RequestMerged {
                            request_id: request.id,
                            merged_into: merged_into,
                            car_id: car_id,
                        });
                    }
                    return Ok(car_id);
                }
                Err(reason) => debug!(request = %request.id, car = %car_id, reason = %reason, "car rejected request"),
            }
        }
        Err(Rejection::Unassignable)
    }

    /// Dispatches `request`, holding it in the pending pool if no car takes
    /// it. Callers are told once, when the request is first held.
    fn place(&self, dispatcher: &Dispatcher, pending: &mut PendingPool, request: Request) {
        if self.dispatch(dispatcher, &request).is_ok() {
            return;
        }
        let id = request.id;
        if pending.hold(request, self.now()) {
            warn!(request = %id, held = pending.len(), "no car available, request held");
            self.events.publish(FleetEvent::NoCarAvailable { request_id: id });
        }
    }

    fn retry_pending(&self, dispatcher: &Dispatcher, timed_out_only: bool) {
        let mut pending = self.pending_pool();
        if pending.is_empty() {
            return;
        }
        let placed = pending.retry(self.now(), timed_out_only, |request| self.dispatch(dispatcher, request).is_ok());
        if placed > 0 {
            debug!(placed = placed, held = pending.len(), "pending requests reassigned");
        }
    }

    fn find_hall_call(&self, pending: &PendingPool, floor: u8, direction: Direction) -> Option<RequestId> {
        pending.find_hall_call(floor, direction).or_else(|| {
            self.cars
                .iter()
                .filter_map(|slot| slot.lock().ok())
                .find_map(|car| car.queue().hall_call(floor, direction))
        })
    }

    fn check_floor(&self, floor: u8) -> Result<(), CommandError> {
        if floor >= self.config.num_floors {
            return Err(CommandError::FloorOutOfRange {
                floor: floor,
                num_floors: self.config.num_floors,
            });
        }
        Ok(())
    }

    fn issue_id(&self) -> RequestId {
        RequestId(self.next_request_id.fetch_add(1, Ordering::SeqCst))
    }

    // neither lock guards car state, so they stay usable after a car panics
    fn authority(&self) -> MutexGuard<'_, Dispatcher> {
        self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending_pool(&self) -> MutexGuard<'_, PendingPool> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_car(&self, car_id: CarId) -> Result<MutexGuard<'_, Car>, CommandError> {
        let slot = self.cars.get(car_id.0).ok_or(CommandError::UnknownCar(car_id))?;
        slot.lock().map_err(|_| CommandError::CarUnavailable { car: car_id })
    }
}
