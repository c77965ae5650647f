//! Touch samples and the filtering applied to them
//!
//! The controller reports 12-bit readings. Readings pinned at either rail
//! are what a floating panel returns when nobody is touching it, so they
//! are discarded before the median is taken.

use heapless::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Largest value a 12-bit conversion can report
pub const ADC_MAX: u16 = 4095;

/// Upper bound on samples taken per axis
pub const MAX_SAMPLES_PER_AXIS: usize = 9;

/// Default samples taken per axis
pub const DEFAULT_SAMPLES_PER_AXIS: u8 = 3;

/// Default minimum pressure for a touch to count
pub const DEFAULT_PRESSURE_THRESHOLD: i32 = 100;

/// Raw controller readings for one touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawSample {
    /// Filtered X conversion
    pub x: u16,
    /// Filtered Y conversion
    pub y: u16,
    /// First pressure plate
    pub z1: u16,
    /// Second pressure plate
    pub z2: u16,
}

impl RawSample {
    /// Pressure metric for this sample
    pub fn pressure(&self) -> i32 {
        pressure(self.z1, self.z2)
    }
}

/// Pressure metric from the two plate readings
///
/// Larger means firmer contact. Negative values are possible and mean no
/// contact.
pub fn pressure(z1: u16, z2: u16) -> i32 {
    i32::from(z1) - i32::from(z2)
}

/// Check if a position reading is usable
pub fn is_valid_reading(value: u16) -> bool {
    value > 0 && value < ADC_MAX
}

/// Valid samples needed out of `taken` for an axis to count
pub fn required_valid(taken: usize) -> usize {
    taken.div_ceil(2)
}

/// Median of a set of readings
///
/// Sorts in place. For an even count the lower middle element is used.
pub fn median(samples: &mut [u16]) -> Option<u16> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_unstable();
    Some(samples[(samples.len() - 1) / 2])
}

/// Readings collected for one axis
#[derive(Debug, Clone, Default)]
pub struct AxisSamples {
    taken: usize,
    valid: Vec<u16, MAX_SAMPLES_PER_AXIS>,
}

impl AxisSamples {
    /// Create an empty collector
    pub const fn new() -> Self {
        Self {
            taken: 0,
            valid: Vec::new(),
        }
    }

    /// Record one attempted reading
    ///
    /// `None` stands for a failed transfer and counts against the axis.
    pub fn record(&mut self, reading: Option<u16>) {
        self.taken += 1;
        if let Some(value) = reading.filter(|v| is_valid_reading(*v)) {
            // Overflow beyond the cap is ignored
            let _ = self.valid.push(value);
        }
    }

    /// Attempts recorded so far
    pub fn taken(&self) -> usize {
        self.taken
    }

    /// Valid readings recorded so far
    pub fn valid(&self) -> usize {
        self.valid.len()
    }

    /// Median of the valid readings, if enough of them arrived
    pub fn resolve(mut self) -> Option<u16> {
        if self.valid.len() < required_valid(self.taken) {
            return None;
        }
        median(&mut self.valid)
    }
}

/// Screen coordinate in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TouchPoint {
    pub x: u16,
    pub y: u16,
}

impl TouchPoint {
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

/// Panel resolution in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Screen {
    pub width: u16,
    pub height: u16,
}

impl Screen {
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Check if both dimensions are non-zero
    pub const fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Bottom-right pixel
    pub const fn last_pixel(&self) -> TouchPoint {
        TouchPoint::new(self.width.saturating_sub(1), self.height.saturating_sub(1))
    }
}

impl Default for Screen {
    /// 2.8" ILI9341 panel in portrait
    fn default() -> Self {
        Self::new(240, 320)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_median_rejects_outlier() {
        assert_eq!(median(&mut [100, 5000, 110]), Some(110));
        assert_eq!(median(&mut [7]), Some(7));
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn test_median_even_count_takes_lower_middle() {
        assert_eq!(median(&mut [40, 10, 30, 20]), Some(20));
    }

    #[test]
    fn test_rail_readings_are_invalid() {
        assert!(!is_valid_reading(0));
        assert!(!is_valid_reading(ADC_MAX));
        assert!(is_valid_reading(1));
        assert!(is_valid_reading(ADC_MAX - 1));
    }

    #[test]
    fn test_axis_needs_majority() {
        let mut axis = AxisSamples::new();
        axis.record(Some(1200));
        axis.record(Some(0));
        axis.record(Some(1210));
        assert_eq!(axis.valid(), 2);
        assert_eq!(axis.resolve(), Some(1200));

        let mut axis = AxisSamples::new();
        axis.record(Some(1200));
        axis.record(None);
        axis.record(Some(ADC_MAX));
        assert_eq!(axis.taken(), 3);
        assert_eq!(axis.resolve(), None);
    }

    #[test]
    fn test_pressure_can_go_negative() {
        assert_eq!(pressure(600, 100), 500);
        assert_eq!(pressure(100, 600), -500);
        let raw = RawSample {
            x: 1,
            y: 2,
            z1: 300,
            z2: 200,
        };
        assert_eq!(raw.pressure(), 100);
    }

    #[test]
    fn test_required_valid_rounds_up() {
        assert_eq!(required_valid(1), 1);
        assert_eq!(required_valid(3), 2);
        assert_eq!(required_valid(4), 2);
        assert_eq!(required_valid(5), 3);
    }

    proptest! {
        #[test]
        fn prop_median_is_a_member_within_bounds(
            mut values in proptest::collection::vec(any::<u16>(), 1..MAX_SAMPLES_PER_AXIS)
        ) {
            let lo = *values.iter().min().unwrap();
            let hi = *values.iter().max().unwrap();
            let original = values.clone();
            let m = median(&mut values).unwrap();
            prop_assert!(lo <= m && m <= hi);
            prop_assert!(original.contains(&m));
        }
    }
}
