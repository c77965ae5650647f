//! Board-agnostic core logic for the shared-bus touch pipeline
//!
//! This crate contains everything that does not touch hardware:
//!
//! - Priority-biased arbitration of the shared SPI bus
//! - Sample filtering (rail rejection, median, pressure)
//! - Calibration profile and raw-to-screen mapping
//! - Dispatcher state machine and debounce rule
//! - Configuration type definitions

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod arbiter;
pub mod calibration;
pub mod config;
pub mod dispatch;
pub mod sample;

pub use arbiter::{ArbiterError, BusArbiter, BusGuard, Role};
pub use calibration::{CalibrationProfile, ProfileCell, ProfileError};
pub use sample::{RawSample, Screen, TouchPoint};
