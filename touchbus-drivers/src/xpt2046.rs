//! XPT2046 resistive touch controller
//!
//! The controller shares the SPI bus with the display, so every conversion
//! is done under the touch role of the [`BusArbiter`]. A pressure check runs
//! first; only when it passes are the X and Y channels sampled, each read
//! under its own bus grant so the display is never locked out for a whole
//! multi-read sequence.
//!
//! Conversion framing: chip select low, one control byte, two bytes clocked
//! in, chip select high. The 12-bit result is left-aligned in the 16 bits
//! after a busy bit: `((b0 << 8) | b1) >> 3`.

use embassy_sync::blocking_mutex::raw::RawMutex;
use touchbus_core::calibration::{CalibrationProfile, ProfileCell};
use touchbus_core::config::TouchConfig;
use touchbus_core::sample::{
    pressure, AxisSamples, RawSample, Screen, TouchPoint, DEFAULT_PRESSURE_THRESHOLD,
    DEFAULT_SAMPLES_PER_AXIS, MAX_SAMPLES_PER_AXIS,
};
use touchbus_core::BusArbiter;
use touchbus_hal::{PinId, Transport};

use crate::fmt::Dbg;
use crate::framing::with_chip_select;

/// Control bytes (start bit, channel, 12-bit differential mode, power-down)
pub mod command {
    /// X position
    pub const READ_X: u8 = 0xD0;
    /// Y position
    pub const READ_Y: u8 = 0x90;
    /// First pressure plate
    pub const READ_Z1: u8 = 0xB0;
    /// Second pressure plate
    pub const READ_Z2: u8 = 0xC0;
}

/// Sampling errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TouchError<E> {
    /// The transport failed during a conversion
    Transport(E),
}

/// Sampler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Xpt2046Config {
    /// Chip select line (active low)
    pub cs: PinId,
    /// PENIRQ line (active low), if wired
    pub pen_irq: Option<PinId>,
    /// Panel resolution
    pub screen: Screen,
    /// Minimum `z1 - z2` for a touch to count
    pub pressure_threshold: i32,
    /// Readings per axis, clamped to `1..=MAX_SAMPLES_PER_AXIS`
    pub samples_per_axis: u8,
}

impl Default for Xpt2046Config {
    fn default() -> Self {
        Self {
            cs: PinId(0),
            pen_irq: None,
            screen: Screen::default(),
            pressure_threshold: DEFAULT_PRESSURE_THRESHOLD,
            samples_per_axis: DEFAULT_SAMPLES_PER_AXIS,
        }
    }
}

impl From<&TouchConfig> for Xpt2046Config {
    fn from(config: &TouchConfig) -> Self {
        Self {
            cs: PinId(config.pins.cs),
            pen_irq: config.pins.pen_irq.map(PinId),
            screen: config.screen,
            pressure_threshold: config.sampler.pressure_threshold,
            samples_per_axis: config.sampler.samples_per_axis,
        }
    }
}

/// Decode the two response bytes of a conversion
pub fn decode_reading(raw: [u8; 2]) -> u16 {
    (((u16::from(raw[0]) << 8) | u16::from(raw[1])) >> 3) & 0x0FFF
}

/// Run one conversion on a bus the caller already holds
///
/// Chip select is released again even when the exchange fails.
pub fn read_channel<T: Transport>(bus: &mut T, cs: PinId, command: u8) -> Result<u16, T::Error> {
    with_chip_select(bus, cs, |bus| exchange(bus, command))
}

fn exchange<T: Transport>(bus: &mut T, command: u8) -> Result<u16, T::Error> {
    let mut control = [command];
    bus.transfer(&mut control)?;
    let mut response = [0u8; 2];
    bus.transfer(&mut response)?;
    Ok(decode_reading(response))
}

/// Touch sampler for an XPT2046 on a shared bus
pub struct TouchSampler<'a, M: RawMutex, T: Transport> {
    bus: &'a BusArbiter<M, T>,
    config: Xpt2046Config,
    profile: ProfileCell<M>,
}

impl<'a, M: RawMutex, T: Transport> TouchSampler<'a, M, T> {
    pub fn new(bus: &'a BusArbiter<M, T>, config: Xpt2046Config, profile: CalibrationProfile) -> Self {
        Self {
            bus,
            config,
            profile: ProfileCell::new(profile),
        }
    }

    pub fn config(&self) -> &Xpt2046Config {
        &self.config
    }

    /// Active calibration profile
    pub fn profile(&self) -> &ProfileCell<M> {
        &self.profile
    }

    pub fn bus(&self) -> &'a BusArbiter<M, T> {
        self.bus
    }

    /// One conversion under its own touch grant
    async fn convert(&self, command: u8) -> Result<u16, TouchError<T::Error>> {
        let mut bus = self.bus.acquire_touch().await;
        read_channel(&mut *bus, self.config.cs, command).map_err(TouchError::Transport)
    }

    /// Read both pressure plates
    ///
    /// Returns `(z1, z2)` when the pressure reaches the threshold, `None`
    /// when nothing is pressing.
    pub async fn read_pressure(&self) -> Result<Option<(u16, u16)>, TouchError<T::Error>> {
        let (z1, z2) = {
            let mut bus = self.bus.acquire_touch().await;
            let cs = self.config.cs;
            let z1 = read_channel(&mut *bus, cs, command::READ_Z1).map_err(TouchError::Transport)?;
            let z2 = read_channel(&mut *bus, cs, command::READ_Z2).map_err(TouchError::Transport)?;
            (z1, z2)
        };

        if pressure(z1, z2) < self.config.pressure_threshold {
            Ok(None)
        } else {
            Ok(Some((z1, z2)))
        }
    }

    /// Filtered position in raw units
    ///
    /// A failed conversion counts as an invalid sample. Returns `None` when
    /// either axis has too few valid samples.
    pub async fn read_position(&self) -> Option<(u16, u16)> {
        let n = usize::from(self.config.samples_per_axis).clamp(1, MAX_SAMPLES_PER_AXIS);
        let mut xs = AxisSamples::new();
        let mut ys = AxisSamples::new();

        for _ in 0..n {
            xs.record(self.reading(command::READ_X).await);
            ys.record(self.reading(command::READ_Y).await);
        }

        trace!("position samples valid: x {}/{}, y {}/{}", xs.valid(), n, ys.valid(), n);
        Some((xs.resolve()?, ys.resolve()?))
    }

    async fn reading(&self, command: u8) -> Option<u16> {
        match self.convert(command).await {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("conversion {:#x} failed: {:?}", command, Dbg(&e));
                None
            }
        }
    }

    /// Pressure-gated raw reading, without calibration
    pub async fn read_raw(&self) -> Result<Option<RawSample>, TouchError<T::Error>> {
        let Some((z1, z2)) = self.read_pressure().await? else {
            return Ok(None);
        };
        let Some((x, y)) = self.read_position().await else {
            return Ok(None);
        };
        Ok(Some(RawSample { x, y, z1, z2 }))
    }

    /// Calibrated touch point, surfacing transport errors
    pub async fn try_sample(&self) -> Result<Option<TouchPoint>, TouchError<T::Error>> {
        let raw = self.read_raw().await?;
        let profile = self.profile.load();
        Ok(raw.map(|r| profile.map_to_screen(r.x, r.y, self.config.screen)))
    }

    /// Calibrated touch point
    ///
    /// Transport errors are logged and reported as no contact.
    pub async fn sample(&self) -> Option<TouchPoint> {
        match self.try_sample().await {
            Ok(point) => point,
            Err(e) => {
                warn!("touch sample failed: {:?}", Dbg(&e));
                None
            }
        }
    }

    /// Check if the pen is down
    ///
    /// Reads PENIRQ when it is wired, otherwise falls back to a pressure
    /// reading.
    pub async fn pen_active(&self) -> Result<bool, TouchError<T::Error>> {
        match self.config.pen_irq {
            Some(pin) => {
                let mut bus = self.bus.acquire_touch().await;
                let level = bus.read_pin(pin).map_err(TouchError::Transport)?;
                Ok(level.is_low())
            }
            None => Ok(self.read_pressure().await?.is_some()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{panel_arbiter, MockError, MockPanel, CS, PEN};
    use embassy_futures::block_on;
    use touchbus_hal::Level;

    fn config() -> Xpt2046Config {
        Xpt2046Config {
            cs: CS,
            pen_irq: Some(PEN),
            ..Xpt2046Config::default()
        }
    }

    fn wide() -> CalibrationProfile {
        CalibrationProfile::new(150, 3900, 150, 3900, false).unwrap()
    }

    #[test]
    fn test_decode_reading() {
        assert_eq!(decode_reading([0x00, 0x00]), 0);
        assert_eq!(decode_reading([0x7F, 0xF8]), 4095);
        // 2025 << 3 = 0x3F48
        assert_eq!(decode_reading([0x3F, 0x48]), 2025);
        // Busy bit is masked off
        assert_eq!(decode_reading([0xFF, 0xFF]), 4095);
    }

    #[test]
    fn test_conversion_framing() {
        let mut panel = MockPanel::touching(1000, 2000);
        assert_eq!(read_channel(&mut panel, CS, command::READ_X), Ok(1000));
        assert_eq!(panel.commands(), &[command::READ_X]);
        assert_eq!(panel.cs_level(), Level::High);
        assert_eq!(panel.cs_cycles(), 1);
    }

    #[test]
    fn test_chip_select_released_on_failure() {
        let mut panel = MockPanel::touching(1000, 2000);
        panel.fail_next(1);
        assert_eq!(read_channel(&mut panel, CS, command::READ_Y), Err(MockError));
        assert_eq!(panel.cs_level(), Level::High);
    }

    #[test]
    fn test_sample_maps_center() {
        let bus = panel_arbiter(MockPanel::touching(2025, 2025));
        let sampler = TouchSampler::new(&bus, config(), wide());
        assert_eq!(block_on(sampler.sample()), Some(TouchPoint::new(120, 160)));
    }

    #[test]
    fn test_light_pressure_is_no_contact() {
        let mut panel = MockPanel::touching(2025, 2025);
        panel.set_pressure(150, 100);
        let bus = panel_arbiter(panel);
        let sampler = TouchSampler::new(&bus, config(), wide());

        assert_eq!(block_on(sampler.read_pressure()), Ok(None));
        assert_eq!(block_on(sampler.sample()), None);
        // Position channels were never read
        let panel = bus.into_inner();
        assert!(!panel.commands().contains(&command::READ_X));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut panel = MockPanel::touching(2025, 2025);
        panel.set_pressure(200, 100);
        let bus = panel_arbiter(panel);
        let sampler = TouchSampler::new(&bus, config(), wide());
        assert_eq!(block_on(sampler.read_pressure()), Ok(Some((200, 100))));
    }

    #[test]
    fn test_median_rejects_noise() {
        let mut panel = MockPanel::touching(2025, 2025);
        panel.script_x(&[1000, 3000, 1010]);
        panel.script_y(&[500, 510, 505]);
        let bus = panel_arbiter(panel);
        let sampler = TouchSampler::new(&bus, config(), wide());

        assert_eq!(block_on(sampler.read_position()), Some((1010, 505)));
    }

    #[test]
    fn test_rail_readings_mean_no_contact() {
        let mut panel = MockPanel::touching(2025, 2025);
        panel.script_x(&[0, 4095, 1200]);
        let bus = panel_arbiter(panel);
        let sampler = TouchSampler::new(&bus, config(), wide());

        assert_eq!(block_on(sampler.read_position()), None);
    }

    #[test]
    fn test_failed_read_counts_as_invalid() {
        let mut panel = MockPanel::touching(2025, 2025);
        // Z1 and Z2 succeed, then the first X conversion fails
        panel.fail_after(4, 1);
        let bus = panel_arbiter(panel);
        let sampler = TouchSampler::new(&bus, config(), wide());

        let raw = block_on(sampler.read_raw()).unwrap().unwrap();
        assert_eq!((raw.x, raw.y), (2025, 2025));
    }

    #[test]
    fn test_transport_failure_is_no_contact() {
        let mut panel = MockPanel::touching(2025, 2025);
        panel.fail_next(u32::MAX);
        let bus = panel_arbiter(panel);
        let sampler = TouchSampler::new(&bus, config(), wide());

        assert_eq!(
            block_on(sampler.try_sample()),
            Err(TouchError::Transport(MockError))
        );
        assert_eq!(block_on(sampler.sample()), None);
        assert_eq!(bus.holder(), None);
    }

    #[test]
    fn test_read_raw_reports_pressure() {
        let bus = panel_arbiter(MockPanel::touching(1500, 2500));
        let sampler = TouchSampler::new(&bus, config(), wide());

        let raw = block_on(sampler.read_raw()).unwrap().unwrap();
        assert_eq!(raw, RawSample { x: 1500, y: 2500, z1: 600, z2: 100 });
    }

    #[test]
    fn test_pen_active_reads_irq_line() {
        let mut panel = MockPanel::touching(2025, 2025);
        panel.set_pen(Level::Low);
        let bus = panel_arbiter(panel);
        let sampler = TouchSampler::new(&bus, config(), wide());
        assert_eq!(block_on(sampler.pen_active()), Ok(true));

        block_on(bus.acquire_display()).set_pen(Level::High);
        assert_eq!(block_on(sampler.pen_active()), Ok(false));
    }

    #[test]
    fn test_pen_active_falls_back_to_pressure() {
        let bus = panel_arbiter(MockPanel::released());
        let no_irq = Xpt2046Config {
            pen_irq: None,
            ..config()
        };
        let sampler = TouchSampler::new(&bus, no_irq, wide());
        assert_eq!(block_on(sampler.pen_active()), Ok(false));

        block_on(bus.acquire_display()).set_pressure(600, 100);
        assert_eq!(block_on(sampler.pen_active()), Ok(true));
    }

    #[test]
    fn test_profile_swap_applies_to_next_sample() {
        let bus = panel_arbiter(MockPanel::touching(2025, 2025));
        let sampler = TouchSampler::new(&bus, config(), wide());

        sampler.profile().store(wide().with_rotate(true));
        assert_eq!(block_on(sampler.sample()), Some(TouchPoint::new(120, 160)));

        let narrow = CalibrationProfile::new(2000, 2100, 2000, 2100, false).unwrap();
        sampler.profile().store(narrow);
        assert_eq!(block_on(sampler.sample()), Some(TouchPoint::new(180, 80)));
    }
}
