//! Configuration types
//!
//! Board-agnostic configuration for the touch subsystem. With the `toml`
//! feature it can be loaded from a configuration file.

#[cfg(feature = "toml")]
pub mod toml;
pub mod types;

#[cfg(feature = "toml")]
pub use self::toml::parse_config;
pub use types::*;
