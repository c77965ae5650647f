//! Hardware driver implementations
//!
//! Concrete components of the shared-bus touch pipeline, written against
//! the traits in touchbus-hal and the logic in touchbus-core:
//!
//! - XPT2046 touch sampler running under the arbiter's touch role
//! - Display link framing commands and chunked pixel data
//! - Touch event dispatcher (interrupt or polling acquisition loop)
//! - Two-point calibration procedure

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[cfg(all(feature = "std", not(test)))]
extern crate std;

#[macro_use]
mod fmt;

pub mod calibration;
pub mod dispatcher;
pub mod display;
pub mod framing;
pub mod xpt2046;

#[cfg(test)]
mod testing;

pub use calibration::{CalibrationFailure, CalibrationProcedure, CalibrationPrompt, Corner};
pub use dispatcher::{HandlerError, TouchDispatcher, TouchHandler};
pub use display::DisplayLink;
pub use xpt2046::{TouchError, TouchSampler, Xpt2046Config};
