//! Quiescence-window debouncer for resize storms
//!
//! A raw resize stream must not trigger a render per event; only the most
//! recent size after the window has gone quiet does.

use std::time::{Duration, Instant};

/// Coalesces a stream of values, releasing only the latest one once no new
/// value has arrived for a full window.
#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Record a new value, restarting the quiescence window
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now));
    }

    /// Release the pending value if the window has elapsed since the last push
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let elapsed = now.duration_since(self.pending.as_ref()?.1);
        if elapsed >= self.window {
            self.pending.take().map(|(value, _)| value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(250);

    #[test]
    fn releases_only_after_quiescence() {
        let mut debouncer = Debouncer::new(WINDOW);
        let t0 = Instant::now();

        debouncer.push(1, t0);
        assert_eq!(debouncer.poll(t0 + Duration::from_millis(100)), None);
        assert_eq!(debouncer.poll(t0 + WINDOW), Some(1));
        assert!(debouncer.is_idle());
    }

    #[test]
    fn later_push_restarts_the_window_and_wins() {
        let mut debouncer = Debouncer::new(WINDOW);
        let t0 = Instant::now();

        debouncer.push(1, t0);
        debouncer.push(2, t0 + Duration::from_millis(200));

        // First window would have expired, but the second push restarted it
        assert_eq!(debouncer.poll(t0 + Duration::from_millis(300)), None);
        assert_eq!(debouncer.poll(t0 + Duration::from_millis(450)), Some(2));
    }

    #[test]
    fn poll_without_push_is_none() {
        let mut debouncer: Debouncer<u32> = Debouncer::new(WINDOW);
        assert_eq!(debouncer.poll(Instant::now()), None);
    }
}
