//! Dispatcher state machine
//!
//! `Idle -> Armed -> Sampling -> Debouncing -> Armed`, with `Stopped`
//! reachable from everywhere and left only by a new start.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::events::DispatchEvent;

/// How pen-down is detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DispatchMode {
    /// Falling edges on PENIRQ wake the dispatcher
    #[default]
    Interrupt,
    /// The pen line (or pressure) is polled at a fixed interval
    Polling,
}

/// Dispatcher states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchState {
    /// Never started
    #[default]
    Idle,
    /// Waiting for a pen trigger
    Armed,
    /// Taking a sample
    Sampling,
    /// Waiting for the pen to lift
    Debouncing,
    /// Listening stopped
    Stopped,
}

impl DispatchState {
    /// Check if a listener loop is expected to be active
    pub fn is_listening(&self) -> bool {
        matches!(
            self,
            DispatchState::Armed | DispatchState::Sampling | DispatchState::Debouncing
        )
    }

    /// Process an event and return the next state
    pub fn transition(self, event: DispatchEvent) -> Self {
        use DispatchEvent::*;
        use DispatchState::*;

        match (self, event) {
            (Idle | Stopped, StartListening) => Armed,

            (Armed, TriggerAccepted) => Sampling,
            (Armed, TriggerRejected) => Armed,

            (Sampling, SampleComplete) => Debouncing,

            // A stuck pen does not wedge the loop
            (Debouncing, ReleaseDetected | ReleaseTimedOut) => Armed,

            (_, StopListening) => Stopped,

            // Default: stay in current state
            _ => self,
        }
    }
}
