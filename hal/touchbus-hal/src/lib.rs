//! touchbus Hardware Abstraction Layer
//!
//! This crate defines the hardware abstraction traits the arbitration and
//! touch pipeline are written against. Chip HALs (or a Linux spidev/gpio
//! backend) implement them once; everything above stays board-agnostic.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  display refresh task │ touch dispatcher │
//! └──────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌──────────────────────────────────────────┐
//! │  touchbus-core BusArbiter (owns the bus) │
//! └──────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌──────────────────────────────────────────┐
//! │  touchbus-hal Transport (this crate)     │
//! └──────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`transport::Transport`] - Byte exchange plus addressable pins
//! - [`spi::SpiBus`] - SPI bus operations
//! - [`gpio::OutputPin`], [`gpio::InputPin`] - Digital I/O
//! - [`gpio::EdgeTrigger`] - Falling-edge interrupt registration
//! - [`time::Clock`] - Monotonic millisecond time

#![no_std]
#![deny(unsafe_code)]

pub mod compat;
pub mod gpio;
pub mod spi;
pub mod time;
pub mod transport;

// Re-export key traits at crate root for convenience
pub use compat::{EhPin, EhSpi};
pub use gpio::{EdgeTrigger, EdgeUnavailable, InputPin, IoPin, Level, NoEdgeTrigger, OutputPin, PinId};
pub use spi::SpiBus;
pub use time::Clock;
#[cfg(feature = "embassy-time")]
pub use time::EmbassyClock;
pub use transport::{SpiTransport, Transport, TransportError};
