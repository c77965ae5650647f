//! Two-point touch calibration
//!
//! The user touches a target in the top-left corner, lifts, then touches a
//! target in the bottom-right corner. The raw extremes of the two captures
//! become the new [`CalibrationProfile`]. Drawing the targets is left to
//! the display side through [`CalibrationPrompt`].

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal_async::delay::DelayNs;
use touchbus_core::calibration::CalibrationProfile;
use touchbus_core::config::CalibrationConfig;
use touchbus_core::sample::{RawSample, Screen, TouchPoint};
use touchbus_hal::Transport;

use crate::fmt::Dbg;
use crate::xpt2046::TouchSampler;

/// Reference corner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Corner {
    TopLeft,
    BottomRight,
}

impl Corner {
    /// Screen position of the target for this corner
    pub fn target(self, screen: Screen) -> TouchPoint {
        match self {
            Corner::TopLeft => TouchPoint::new(0, 0),
            Corner::BottomRight => screen.last_pixel(),
        }
    }
}

/// Calibration failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationFailure {
    /// No touch was captured for the corner within the attempt budget
    Timeout(Corner),
    /// Both captures share a raw coordinate on some axis
    Degenerate,
}

/// Display-side hooks for the calibration run
#[allow(async_fn_in_trait)]
pub trait CalibrationPrompt {
    /// Show the target the user should touch
    async fn show_target(&mut self, corner: Corner, target: TouchPoint);

    /// A raw sample was captured for `corner`
    async fn captured(&mut self, _corner: Corner, _raw: RawSample) {}
}

/// Prompt that draws nothing
impl CalibrationPrompt for () {
    async fn show_target(&mut self, _corner: Corner, _target: TouchPoint) {}
}

/// Interactive two-point calibration
pub struct CalibrationProcedure {
    config: CalibrationConfig,
}

impl CalibrationProcedure {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Run the procedure against `sampler`
    ///
    /// On success the new profile, carrying the sampler's current rotate
    /// flag, is stored in the sampler and returned. On failure the
    /// sampler's profile is left untouched.
    pub async fn run<M, T, P, D>(
        &self,
        sampler: &TouchSampler<'_, M, T>,
        prompt: &mut P,
        delay: &mut D,
    ) -> Result<CalibrationProfile, CalibrationFailure>
    where
        M: RawMutex,
        T: Transport,
        P: CalibrationPrompt,
        D: DelayNs,
    {
        info!("calibration started");

        let first = self.capture(sampler, prompt, delay, Corner::TopLeft).await?;
        self.wait_for_release(sampler, delay).await;
        let second = self.capture(sampler, prompt, delay, Corner::BottomRight).await?;
        self.wait_for_release(sampler, delay).await;

        let rotate = sampler.profile().load().rotate();
        let profile = CalibrationProfile::from_corners(first, second, rotate).map_err(|e| {
            warn!("calibration rejected: {:?}", e);
            CalibrationFailure::Degenerate
        })?;
        sampler.profile().store(profile);

        info!(
            "calibration stored: x {}..{}, y {}..{}",
            profile.x_min(),
            profile.x_max(),
            profile.y_min(),
            profile.y_max()
        );
        Ok(profile)
    }

    async fn capture<M, T, P, D>(
        &self,
        sampler: &TouchSampler<'_, M, T>,
        prompt: &mut P,
        delay: &mut D,
        corner: Corner,
    ) -> Result<RawSample, CalibrationFailure>
    where
        M: RawMutex,
        T: Transport,
        P: CalibrationPrompt,
        D: DelayNs,
    {
        prompt.show_target(corner, corner.target(sampler.config().screen)).await;
        debug!("waiting for {:?} touch", corner);

        for _ in 0..self.config.max_attempts {
            match sampler.read_raw().await {
                Ok(Some(raw)) => {
                    debug!("{:?} captured at ({}, {})", corner, raw.x, raw.y);
                    prompt.captured(corner, raw).await;
                    return Ok(raw);
                }
                Ok(None) => {}
                Err(e) => debug!("calibration read failed: {:?}", Dbg(&e)),
            }
            delay.delay_ms(self.config.poll_interval_ms).await;
        }

        warn!("no touch for {:?} after {} attempts", corner, self.config.max_attempts);
        Err(CalibrationFailure::Timeout(corner))
    }

    /// Wait for the pen to lift; a timeout is tolerated
    async fn wait_for_release<M, T, D>(&self, sampler: &TouchSampler<'_, M, T>, delay: &mut D)
    where
        M: RawMutex,
        T: Transport,
        D: DelayNs,
    {
        let mut waited = 0u32;
        loop {
            match sampler.pen_active().await {
                Ok(false) => return,
                Ok(true) => {}
                Err(e) => debug!("pen check failed: {:?}", Dbg(&e)),
            }
            if waited >= self.config.release_timeout_ms {
                debug!("pen still down after {} ms", waited);
                return;
            }
            delay.delay_ms(self.config.poll_interval_ms).await;
            waited = waited.saturating_add(self.config.poll_interval_ms);
        }
    }
}
