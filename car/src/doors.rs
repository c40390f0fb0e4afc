//! ----- DOORS -----
//! Keeps track of how long the doors have been in their current phase and
//! steps them through CLOSED -> OPENING -> OPEN -> CLOSING -> CLOSED.

use std::time::Duration;

use shared_resources::config::CarSettings;
use shared_resources::state::DoorState;

#[derive(Debug, Clone)]
pub struct Doors {
    state: DoorState,
    elapsed: Duration,
}

impl Doors {
    pub fn new() -> Self {
        Doors {
            state: DoorState::Closed,
            elapsed: Duration::ZERO,
        }
    }

    pub fn state(&self) -> DoorState {
        self.state
    }

    /// Forces a phase, e.g. opening at floor level in an emergency.
    /// Returns the previous phase if it changed.
    pub fn set(&mut self, state: DoorState) -> Option<DoorState> {
        self.elapsed = Duration::ZERO;
        if self.state == state {
            return None;
        }
        let old = self.state;
        self.state = state;
        Some(old)
    }

    /// Starts a cycle from CLOSED. Returns the transition made.
    pub fn open(&mut self) -> (DoorState, DoorState) {
        assert!(self.state == DoorState::Closed, "doors asked to open while {:?}", self.state);
        self.elapsed = Duration::ZERO;
        self.state = DoorState::Opening;
        (DoorState::Closed, DoorState::Opening)
    }

    /// Advances the running cycle by `dt` and returns every phase change in
    /// order. The cycle stops at CLOSED.
    pub fn advance(&mut self, dt: Duration, settings: &CarSettings) -> Vec<(DoorState, DoorState)> {
        let mut changes = Vec::new();
        if self.state == DoorState::Closed {
            return changes;
        }
        self.elapsed += dt;
        loop {
            let phase_length = match self.state {
                DoorState::Opening | DoorState::Closing => settings.door_transition_time,
                DoorState::Open => settings.door_dwell_time,
                DoorState::Closed => break,
            };
            if self.elapsed < phase_length {
                break;
            }
            self.elapsed -= phase_length;
            let old = self.state;
            self.state = old.next();
            changes.push((old, self.state));
        }
        if self.state == DoorState::Closed {
            self.elapsed = Duration::ZERO;
        }
        changes
    }
}

impl Default for Doors {
    fn default() -> Self {
        Self::new()
    }
}
