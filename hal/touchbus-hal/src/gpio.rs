//! GPIO pin abstractions
//!
//! Provides traits for digital input and output pins that can be implemented
//! by chip-specific HALs, plus the edge-trigger registration used by the
//! touch controller's PENIRQ line.

/// Logic level of a digital line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    /// Logic 0
    Low,
    /// Logic 1
    High,
}

impl Level {
    /// Check if this is the high level
    pub fn is_high(self) -> bool {
        self == Level::High
    }

    /// Check if this is the low level
    pub fn is_low(self) -> bool {
        self == Level::Low
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl core::ops::Not for Level {
    type Output = Level;

    fn not(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

/// Logical pin identifier
///
/// Physical numbering is board configuration; the transport maps ids to
/// its own pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinId(pub u8);

impl PinId {
    /// Index into a pin table
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Digital output pin
///
/// Implementations should handle the actual hardware register manipulation
/// for the specific chip.
pub trait OutputPin {
    /// Set the pin high (logic 1)
    fn set_high(&mut self);

    /// Set the pin low (logic 0)
    fn set_low(&mut self);

    /// Set the pin to a specific level
    fn set_level(&mut self, level: Level) {
        match level {
            Level::High => self.set_high(),
            Level::Low => self.set_low(),
        }
    }
}

/// Digital input pin
pub trait InputPin {
    /// Check if the pin reads high (logic 1)
    ///
    /// Takes `&mut self` because sampling may touch peripheral state.
    fn is_high(&mut self) -> bool;

    /// Check if the pin reads low (logic 0)
    fn is_low(&mut self) -> bool {
        !self.is_high()
    }

    /// Current level of the pin
    fn level(&mut self) -> Level {
        Level::from(self.is_high())
    }
}

/// Pin that can be used for both input and output
///
/// Type-erased "flex" pins on most HALs fit this; a transport keeps a table
/// of them and addresses entries by [`PinId`].
pub trait IoPin: OutputPin + InputPin {}

// Blanket implementation for types that implement both traits
impl<T: OutputPin + InputPin> IoPin for T {}

/// Falling-edge interrupt registration
///
/// Platforms that can deliver edge interrupts implement this for the
/// PENIRQ line; the interrupt handler itself forwards to the touch
/// dispatcher. Registration may fail on platforms where edge callbacks
/// are unreliable, in which case callers fall back to polling.
pub trait EdgeTrigger {
    /// Error type for registration failures
    type Error: core::fmt::Debug;

    /// Start delivering falling-edge interrupts
    fn listen_falling(&mut self) -> Result<(), Self::Error>;

    /// Stop delivering interrupts
    ///
    /// Must be safe to call when not listening.
    fn unlisten(&mut self);
}

/// Edge trigger for platforms without edge interrupts
///
/// Registration always fails, which forces polling mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEdgeTrigger;

/// Edge interrupts are not available on this platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EdgeUnavailable;

impl EdgeTrigger for NoEdgeTrigger {
    type Error = EdgeUnavailable;

    fn listen_falling(&mut self) -> Result<(), Self::Error> {
        Err(EdgeUnavailable)
    }

    fn unlisten(&mut self) {}
}
