use std::time::{Duration, Instant};

use glam::Vec2;

/// A multi-touch move: the current contact points in logical screen pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct TouchGesture {
    pub contacts: Vec<Vec2>,
    pub timestamp: Instant,
}

impl TouchGesture {
    pub fn new(contacts: Vec<Vec2>, timestamp: Instant) -> Self {
        Self {
            contacts,
            timestamp,
        }
    }

    /// Distance between the first two contacts, if there are at least two.
    pub fn pinch_distance(&self) -> Option<f32> {
        match self.contacts.as_slice() {
            [first, second, ..] => Some(first.distance(*second)),
            _ => None,
        }
    }
}

/// Drops events that arrive sooner than `interval` after the last accepted one.
#[derive(Debug, Clone)]
pub struct GestureThrottle {
    interval: Duration,
    last_accepted: Option<Instant>,
}

impl GestureThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_accepted: None,
        }
    }

    pub fn try_accept(&mut self, timestamp: Instant) -> bool {
        let accepted = match self.last_accepted {
            Some(last) => timestamp.saturating_duration_since(last) >= self.interval,
            None => true,
        };

        if accepted {
            self.last_accepted = Some(timestamp);
        }

        accepted
    }

    pub fn reset(&mut self) {
        self.last_accepted = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinch_needs_two_contacts() {
        let now = Instant::now();

        assert_eq!(TouchGesture::new(vec![Vec2::ZERO], now).pinch_distance(), None);
        assert_eq!(
            TouchGesture::new(
                vec![Vec2::ZERO, Vec2::new(300.0, 400.0), Vec2::new(9.0, 9.0)],
                now
            )
            .pinch_distance(),
            Some(500.0)
        );
    }

    #[test]
    fn throttle_measures_from_last_accepted_event() {
        let start = Instant::now();
        let mut throttle = GestureThrottle::new(Duration::from_millis(100));

        assert!(throttle.try_accept(start));
        assert!(!throttle.try_accept(start + Duration::from_millis(60)));
        // Dropped events do not push the window forward
        assert!(throttle.try_accept(start + Duration::from_millis(100)));
        assert!(!throttle.try_accept(start + Duration::from_millis(199)));

        throttle.reset();
        assert!(throttle.try_accept(start + Duration::from_millis(200)));
    }
}
