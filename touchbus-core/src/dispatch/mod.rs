//! Touch dispatch logic
//!
//! The hardware-independent half of the touch dispatcher: its state
//! machine, detection mode and debounce rule.

pub mod debounce;
pub mod events;
pub mod machine;

pub use debounce::*;
pub use events::*;
pub use machine::*;

/// Result of a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StartOutcome {
    /// Listening started in the given mode
    Started(DispatchMode),
    /// A listener was already running; nothing changed
    AlreadyRunning,
}
