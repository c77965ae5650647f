//! Raw-to-screen calibration profile
//!
//! Maps 12-bit controller readings onto pixel coordinates. The X axis of
//! the panel runs opposite to the display's, so X is inverted while Y maps
//! directly.

use core::cell::Cell;
use core::fmt;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::sample::{RawSample, Screen, TouchPoint};

/// Default raw bounds for an uncalibrated panel
pub const DEFAULT_RAW_MIN: u16 = 300;
pub const DEFAULT_RAW_MAX: u16 = 3800;

/// Profile construction errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProfileError {
    /// Minimum equals maximum on an axis
    ZeroSpan,
    /// Minimum exceeds maximum on an axis
    InvertedSpan,
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileError::ZeroSpan => f.write_str("calibration axis has zero span"),
            ProfileError::InvertedSpan => f.write_str("calibration axis minimum exceeds maximum"),
        }
    }
}

/// Raw bounds and orientation of the touch panel
///
/// Always holds `min < max` on both axes; construction fails otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "ProfileFields", into = "ProfileFields")
)]
pub struct CalibrationProfile {
    x_min: u16,
    x_max: u16,
    y_min: u16,
    y_max: u16,
    rotate: bool,
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self {
            x_min: DEFAULT_RAW_MIN,
            x_max: DEFAULT_RAW_MAX,
            y_min: DEFAULT_RAW_MIN,
            y_max: DEFAULT_RAW_MAX,
            rotate: false,
        }
    }
}

const fn check_span(min: u16, max: u16) -> Result<(), ProfileError> {
    if min == max {
        Err(ProfileError::ZeroSpan)
    } else if min > max {
        Err(ProfileError::InvertedSpan)
    } else {
        Ok(())
    }
}

impl CalibrationProfile {
    /// Create a profile from raw bounds
    pub const fn new(
        x_min: u16,
        x_max: u16,
        y_min: u16,
        y_max: u16,
        rotate: bool,
    ) -> Result<Self, ProfileError> {
        if let Err(e) = check_span(x_min, x_max) {
            return Err(e);
        }
        if let Err(e) = check_span(y_min, y_max) {
            return Err(e);
        }
        Ok(Self {
            x_min,
            x_max,
            y_min,
            y_max,
            rotate,
        })
    }

    /// Derive bounds from two opposite-corner captures
    ///
    /// Corner order does not matter; each axis takes the smaller reading as
    /// its minimum.
    pub fn from_corners(a: RawSample, b: RawSample, rotate: bool) -> Result<Self, ProfileError> {
        Self::new(
            a.x.min(b.x),
            a.x.max(b.x),
            a.y.min(b.y),
            a.y.max(b.y),
            rotate,
        )
    }

    pub const fn x_min(&self) -> u16 {
        self.x_min
    }

    pub const fn x_max(&self) -> u16 {
        self.x_max
    }

    pub const fn y_min(&self) -> u16 {
        self.y_min
    }

    pub const fn y_max(&self) -> u16 {
        self.y_max
    }

    /// Check if the axes are swapped
    pub const fn rotate(&self) -> bool {
        self.rotate
    }

    /// Same bounds with a different orientation
    pub const fn with_rotate(self, rotate: bool) -> Self {
        Self { rotate, ..self }
    }

    /// Map a raw reading onto the screen
    ///
    /// Readings outside the calibrated bounds are clamped to the nearest
    /// edge pixel. With `rotate`, raw X spans the screen height and raw Y
    /// the width before the two are swapped.
    pub fn map_to_screen(&self, raw_x: u16, raw_y: u16, screen: Screen) -> TouchPoint {
        let (x_extent, y_extent) = if self.rotate {
            (screen.height, screen.width)
        } else {
            (screen.width, screen.height)
        };

        let sx = rescale(raw_x, self.x_min, self.x_max, i64::from(x_extent), 0);
        let sy = rescale(raw_y, self.y_min, self.y_max, 0, i64::from(y_extent));
        let (sx, sy) = if self.rotate { (sy, sx) } else { (sx, sy) };

        TouchPoint::new(clamp_axis(sx, screen.width), clamp_axis(sy, screen.height))
    }
}

/// Linear map of `value` from `[from_min, from_max]` onto `[to_start, to_end]`
fn rescale(value: u16, from_min: u16, from_max: u16, to_start: i64, to_end: i64) -> i64 {
    let span = i64::from(from_max) - i64::from(from_min);
    let offset = i64::from(value) - i64::from(from_min);
    to_start + ((to_end - to_start) * offset).div_euclid(span)
}

fn clamp_axis(value: i64, extent: u16) -> u16 {
    let last = (i64::from(extent) - 1).max(0);
    // In range of u16 after the clamp
    value.clamp(0, last) as u16
}

/// Serialized form, validated on the way in
#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct ProfileFields {
    x_min: u16,
    x_max: u16,
    y_min: u16,
    y_max: u16,
    #[serde(default)]
    rotate: bool,
}

#[cfg(feature = "serde")]
impl TryFrom<ProfileFields> for CalibrationProfile {
    type Error = ProfileError;

    fn try_from(f: ProfileFields) -> Result<Self, Self::Error> {
        Self::new(f.x_min, f.x_max, f.y_min, f.y_max, f.rotate)
    }
}

#[cfg(feature = "serde")]
impl From<CalibrationProfile> for ProfileFields {
    fn from(p: CalibrationProfile) -> Self {
        Self {
            x_min: p.x_min,
            x_max: p.x_max,
            y_min: p.y_min,
            y_max: p.y_max,
            rotate: p.rotate,
        }
    }
}

/// Profile shared between the sampler and the calibration procedure
///
/// Loads and stores are whole-value, so a reader never sees bounds from two
/// different profiles.
pub struct ProfileCell<M: RawMutex> {
    inner: BlockingMutex<M, Cell<CalibrationProfile>>,
}

impl<M: RawMutex> ProfileCell<M> {
    pub const fn new(profile: CalibrationProfile) -> Self {
        Self {
            inner: BlockingMutex::new(Cell::new(profile)),
        }
    }

    /// Current profile
    pub fn load(&self) -> CalibrationProfile {
        self.inner.lock(|c| c.get())
    }

    /// Install a new profile
    pub fn store(&self, profile: CalibrationProfile) {
        self.inner.lock(|c| c.set(profile));
    }

    /// Install a new profile, returning the previous one
    pub fn replace(&self, profile: CalibrationProfile) -> CalibrationProfile {
        self.inner.lock(|c| c.replace(profile))
    }
}

impl<M: RawMutex> Default for ProfileCell<M> {
    fn default() -> Self {
        Self::new(CalibrationProfile::default())
    }
}
