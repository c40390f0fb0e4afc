use std::time::Duration;

use shared_resources::direction::Direction;
use shared_resources::request::{Request, RequestId};

/// Requests no car could take yet. Entries keep the order they were held in
/// so retries go oldest first.
#[derive(Debug, Clone)]
pub struct PendingPool {
    requests: Vec<Request>,
    held_since: Vec<Duration>,
    timeout: Duration,
}

impl PendingPool {
    pub fn new(timeout: Duration) -> Self {
        PendingPool {
            requests: Vec::new(),
            held_since: Vec::new(),
            timeout: timeout,
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn get_requests(&self) -> Vec<Request> {
        self.requests.clone()
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.requests.iter().any(|request| request.id == id)
    }

    pub fn find_hall_call(&self, floor: u8, direction: Direction) -> Option<RequestId> {
        self.requests
            .iter()
            .find(|request| request.dedup_key() == Some((floor, direction)))
            .map(|request| request.id)
    }

    /// Holds `request` from `now` on. Returns false if it was already held.
    pub fn hold(&mut self, request: Request, now: Duration) -> bool {
        if self.contains(request.id) {
            return false;
        }
        self.requests.push(request);
        self.held_since.push(now);
        true
    }

    /// Offers held requests to `place`, oldest first, and drops the ones it
    /// placed. With `timed_out_only` only requests held longer than the
    /// timeout are offered; those that stay get their timer restarted.
    /// Returns the number placed.
    pub fn retry<F>(&mut self, now: Duration, timed_out_only: bool, mut place: F) -> usize
    where
        F: FnMut(&Request) -> bool,
    {
        let mut placed = 0;
        let mut index = 0;
        while index < self.requests.len() {
            let timed_out = now.saturating_sub(self.held_since[index]) >= self.timeout;
            if timed_out_only && !timed_out {
                index += 1;
                continue;
            }
            if place(&self.requests[index]) {
                self.requests.remove(index);
                self.held_since.remove(index);
                placed += 1;
                continue;
            }
            if timed_out {
                tracing::warn!(request = %self.requests[index].id, "request still waiting for a car");
                self.held_since[index] = now;
            }
            index += 1;
        }
        placed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hall(id: u64, floor: u8) -> Request {
        Request::hall(RequestId(id), floor, Direction::Up, Duration::ZERO)
    }

    #[test]
    fn holds_each_request_once() {
        let mut pool = PendingPool::new(Duration::from_secs(5));
        assert!(pool.hold(hall(1, 2), Duration::ZERO));
        assert!(!pool.hold(hall(1, 2), Duration::from_secs(1)));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.find_hall_call(2, Direction::Up), Some(RequestId(1)));
        assert_eq!(pool.find_hall_call(2, Direction::Down), None);
    }

    #[test]
    fn retries_oldest_first_and_keeps_unplaced() {
        let mut pool = PendingPool::new(Duration::from_secs(5));
        for id in 1..=3 {
            pool.hold(hall(id, id as u8), Duration::ZERO);
        }
        let mut offered = Vec::new();
        let placed = pool.retry(Duration::from_secs(1), false, |request| {
            offered.push(request.id.0);
            request.id.0 != 2
        });
        assert_eq!(placed, 2);
        assert_eq!(offered, vec![1, 2, 3]);
        let left: Vec<u64> = pool.get_requests().iter().map(|request| request.id.0).collect();
        assert_eq!(left, vec![2]);
    }

    #[test]
    fn timed_out_retry_only_offers_old_requests() {
        let mut pool = PendingPool::new(Duration::from_secs(5));
        pool.hold(hall(1, 1), Duration::ZERO);
        pool.hold(hall(2, 2), Duration::from_secs(4));

        let mut offered = Vec::new();
        pool.retry(Duration::from_secs(6), true, |request| {
            offered.push(request.id.0);
            false
        });
        assert_eq!(offered, vec![1]);

        // the timer restarted, so nothing is offered a second later
        offered.clear();
        pool.retry(Duration::from_secs(7), true, |request| {
            offered.push(request.id.0);
            false
        });
        assert!(offered.is_empty());
        assert_eq!(pool.len(), 2);
    }
}
