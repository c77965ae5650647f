//! Touch calibration
//!
//! The profile that maps raw readings to pixels, the cell that shares it
//! between tasks, and (with the `serde` feature) its persisted form.

pub mod profile;
#[cfg(feature = "serde")]
pub mod record;

pub use profile::*;
#[cfg(feature = "serde")]
pub use record::*;
