//! Events that drive the dispatcher state machine

/// Dispatcher events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchEvent {
    /// Listening was requested
    StartListening,
    /// A pen trigger passed the debounce window
    TriggerAccepted,
    /// A pen trigger arrived inside the debounce window
    TriggerRejected,
    /// The triggered sample was taken (with or without a point)
    SampleComplete,
    /// The pen was lifted
    ReleaseDetected,
    /// The pen was still down when the release wait ran out
    ReleaseTimedOut,
    /// Listening was stopped
    StopListening,
}

impl DispatchEvent {
    /// Check if this event comes from the pen rather than the caller
    pub fn is_pen_event(&self) -> bool {
        matches!(
            self,
            DispatchEvent::TriggerAccepted
                | DispatchEvent::TriggerRejected
                | DispatchEvent::ReleaseDetected
                | DispatchEvent::ReleaseTimedOut
        )
    }
}
