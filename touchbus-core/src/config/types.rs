//! Configuration type definitions
//!
//! Everything here is plain data with working defaults, so a partial
//! configuration file only has to name what differs.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::arbiter::DEFAULT_DISPLAY_STREAK_LIMIT;
use crate::calibration::CalibrationProfile;
use crate::dispatch::{DispatchMode, DEFAULT_DEBOUNCE_MS};
use crate::sample::{
    Screen, DEFAULT_PRESSURE_THRESHOLD, DEFAULT_SAMPLES_PER_AXIS, MAX_SAMPLES_PER_AXIS,
};

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// TOML parsing failed
    TomlParse,
    /// Screen has a zero dimension
    InvalidScreen,
    /// Samples per axis outside `1..=MAX_SAMPLES_PER_AXIS`
    InvalidSampleCount,
    /// A poll interval, attempt count or chunk size is zero
    ZeroInterval,
}

/// Touch controller wiring
///
/// Pin numbers index the transport's pin table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TouchPins {
    /// Touch controller chip select (active low)
    pub cs: u8,
    /// PENIRQ line (active low); `None` falls back to pressure sensing
    pub pen_irq: Option<u8>,
}

impl Default for TouchPins {
    fn default() -> Self {
        Self {
            cs: 0,
            pen_irq: None,
        }
    }
}

/// Sampling parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SamplerConfig {
    /// Minimum `z1 - z2` for a touch to count
    pub pressure_threshold: i32,
    /// Readings taken per axis before the median
    pub samples_per_axis: u8,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            pressure_threshold: DEFAULT_PRESSURE_THRESHOLD,
            samples_per_axis: DEFAULT_SAMPLES_PER_AXIS,
        }
    }
}

/// Dispatcher timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DispatchConfig {
    /// Preferred detection mode
    pub mode: DispatchMode,
    /// Minimum spacing between accepted triggers
    pub debounce_ms: u32,
    /// Longest wait for the pen to lift after a touch
    pub release_timeout_ms: u32,
    /// Pen line check interval while waiting for release
    pub release_poll_ms: u32,
    /// Pen check interval in polling mode
    pub poll_interval_ms: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::Interrupt,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            release_timeout_ms: 500,
            release_poll_ms: 10,
            poll_interval_ms: 50,
        }
    }
}

/// Interactive calibration parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CalibrationConfig {
    /// Polls per corner before giving up
    pub max_attempts: u16,
    /// Delay between polls
    pub poll_interval_ms: u32,
    /// Longest wait for the pen to lift between corners
    pub release_timeout_ms: u32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 200,
            poll_interval_ms: 50,
            release_timeout_ms: 2000,
        }
    }
}

/// Bus arbitration parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BusConfig {
    /// Display grants allowed ahead of a waiting touch; `None` for strict priority
    pub display_streak_limit: Option<u8>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            display_streak_limit: Some(DEFAULT_DISPLAY_STREAK_LIMIT),
        }
    }
}

/// Display link wiring and framing
///
/// Pin numbers index the transport's pin table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DisplayConfig {
    /// Display chip select (active low)
    pub cs: u8,
    /// Data/command select (low = command)
    pub dc: u8,
    /// Largest data burst sent under one bus grant
    pub chunk_size: u16,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            cs: 1,
            dc: 2,
            chunk_size: 4096,
        }
    }
}

/// Complete touch subsystem configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TouchConfig {
    pub screen: Screen,
    pub pins: TouchPins,
    pub bus: BusConfig,
    pub display: DisplayConfig,
    pub sampler: SamplerConfig,
    pub dispatch: DispatchConfig,
    pub calibration: CalibrationConfig,
    /// Profile used until a calibration is stored
    pub profile: CalibrationProfile,
}

impl TouchConfig {
    /// Check the configuration for values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.screen.is_valid() {
            return Err(ConfigError::InvalidScreen);
        }

        let samples = usize::from(self.sampler.samples_per_axis);
        if samples == 0 || samples > MAX_SAMPLES_PER_AXIS {
            return Err(ConfigError::InvalidSampleCount);
        }

        let d = &self.dispatch;
        let c = &self.calibration;
        if d.release_poll_ms == 0
            || d.poll_interval_ms == 0
            || c.poll_interval_ms == 0
            || c.max_attempts == 0
            || self.display.chunk_size == 0
        {
            return Err(ConfigError::ZeroInterval);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TouchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.screen, Screen::new(240, 320));
        assert_eq!(config.sampler.pressure_threshold, 100);
        assert_eq!(config.dispatch.debounce_ms, 50);
        assert_eq!(config.profile.x_min(), 300);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = TouchConfig::default();
        config.screen.width = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidScreen));

        let mut config = TouchConfig::default();
        config.sampler.samples_per_axis = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidSampleCount));
        config.sampler.samples_per_axis = MAX_SAMPLES_PER_AXIS as u8 + 1;
        assert_eq!(config.validate(), Err(ConfigError::InvalidSampleCount));

        let mut config = TouchConfig::default();
        config.dispatch.release_poll_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroInterval));

        let mut config = TouchConfig::default();
        config.display.chunk_size = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroInterval));
    }
}
