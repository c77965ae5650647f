//! Pen-trigger debouncing
//!
//! Edges from a resistive panel bounce. A trigger is accepted only when at
//! least the debounce window has passed since the last accepted one;
//! rejected triggers do not move the window.

/// Default debounce window
pub const DEFAULT_DEBOUNCE_MS: u32 = 50;

/// Debounce state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Debouncer {
    window_ms: u32,
    last_event_ms: Option<u64>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_MS)
    }
}

impl Debouncer {
    pub const fn new(window_ms: u32) -> Self {
        Self {
            window_ms,
            last_event_ms: None,
        }
    }

    /// Decide whether a trigger at `now_ms` counts
    pub fn accept(&mut self, now_ms: u64) -> bool {
        if let Some(last) = self.last_event_ms {
            if now_ms.saturating_sub(last) < u64::from(self.window_ms) {
                return false;
            }
        }
        self.last_event_ms = Some(now_ms);
        true
    }

    /// Time of the last accepted trigger
    pub fn last_event_ms(&self) -> Option<u64> {
        self.last_event_ms
    }

    pub fn window_ms(&self) -> u32 {
        self.window_ms
    }

    /// Forget the last accepted trigger
    pub fn reset(&mut self) {
        self.last_event_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_trigger_accepted() {
        let mut d = Debouncer::default();
        assert!(d.accept(0));
        assert_eq!(d.last_event_ms(), Some(0));
    }

    #[test]
    fn test_bounce_rejected() {
        let mut d = Debouncer::new(50);
        assert!(d.accept(1000));
        assert!(!d.accept(1010));
        assert!(!d.accept(1049));
        assert!(d.accept(1050));
    }

    #[test]
    fn test_rejected_trigger_does_not_extend_window() {
        let mut d = Debouncer::new(50);
        assert!(d.accept(0));
        for t in (10..50).step_by(10) {
            assert!(!d.accept(t));
        }
        assert_eq!(d.last_event_ms(), Some(0));
        assert!(d.accept(60));
    }

    #[test]
    fn test_reset() {
        let mut d = Debouncer::new(50);
        assert!(d.accept(100));
        d.reset();
        assert!(d.accept(110));
    }

    #[test]
    fn test_clock_going_backwards_is_rejected() {
        let mut d = Debouncer::new(50);
        assert!(d.accept(500));
        assert!(!d.accept(400));
    }
}
