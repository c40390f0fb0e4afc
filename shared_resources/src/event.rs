//! ----- NOTIFICATIONS -----
//! Everything the core tells the outside world goes out to every
//! subscriber through its own bounded channel. Publishing never blocks:
//! when a subscriber's buffer is full its oldest event is dropped to make
//! room.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use super::request::{CarId, RequestId};
use super::state::{DoorState, MotionState};

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub enum FleetEvent {
    CarStateChanged {
        car_id: CarId,
        old_state: MotionState,
        new_state: MotionState,
        floor: f64,
        timestamp: Duration,
    },
    DoorStateChanged {
        car_id: CarId,
        old_state: DoorState,
        new_state: DoorState,
        floor: f64,
        timestamp: Duration,
    },
    RequestServed {
        request_id: RequestId,
        car_id: CarId,
        floor: u8,
    },
    RequestDiscarded {
        request_id: RequestId,
        car_id: CarId,
    },
    BoardingRefused {
        request_id: RequestId,
        car_id: CarId,
        floor: u8,
    },
    NoCarAvailable {
        request_id: RequestId,
    },
    /// `request_id` found the same hall call already queued on `car_id` and
    /// is served together with `merged_into`.
    RequestMerged {
        request_id: RequestId,
        merged_into: RequestId,
        car_id: CarId,
    },
}

impl FleetEvent {
    pub fn car_id(&self) -> Option<CarId> {
        match self {
            FleetEvent::CarStateChanged { car_id, .. }
            | FleetEvent::DoorStateChanged { car_id, .. }
            | FleetEvent::RequestServed { car_id, .. }
            | FleetEvent::RequestDiscarded { car_id, .. }
            | FleetEvent::BoardingRefused { car_id, .. }
            | FleetEvent::RequestMerged { car_id, .. } => Some(*car_id),
            FleetEvent::NoCarAvailable { .. } => None,
        }
    }
}

#[derive(Debug)]
struct Subscriber {
    tx: Sender<FleetEvent>,
    // kept so the oldest event can be evicted when the buffer is full
    rx: Receiver<FleetEvent>,
}

impl Subscriber {
    fn offer(&self, event: FleetEvent) {
        match self.tx.try_send(event) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(event)) => {
                let _ = self.rx.try_recv();
                if self.tx.try_send(event).is_err() {
                    tracing::trace!("notification buffer contended, event dropped");
                }
            }
        }
    }
}

/// Fans every event out to each subscriber's own bounded buffer.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    buffer: usize,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl EventPublisher {
    pub fn new(buffer: usize) -> Self {
        assert!(buffer > 0, "event buffer must hold at least one event");
        EventPublisher {
            buffer: buffer,
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Receives every event published from now on. A slow subscriber loses
    /// its own oldest events without holding back the others.
    pub fn subscribe(&self) -> Receiver<FleetEvent> {
        let (tx, rx) = bounded(self.buffer);
        self.subscribers().push(Subscriber { tx: tx, rx: rx.clone() });
        rx
    }

    pub fn publish(&self, event: FleetEvent) {
        let subscribers = self.subscribers();
        if let Some((last, rest)) = subscribers.split_last() {
            for subscriber in rest {
                subscriber.offer(event.clone());
            }
            last.offer(event);
        }
    }

    // a leaf lock: nothing else is taken while it is held
    fn subscribers(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
