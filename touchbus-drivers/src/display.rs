//! Display side of the shared bus
//!
//! Frames commands and pixel data for the panel controller under the
//! display role. Large writes are split into chunks, each under its own bus
//! grant, so a pending touch request can get in between chunks once the
//! arbiter's streak limit is reached. The command set itself belongs to the
//! panel driver using this link.

use embassy_sync::blocking_mutex::raw::RawMutex;
use touchbus_core::config::DisplayConfig;
use touchbus_core::BusArbiter;
use touchbus_hal::{Level, PinId, Transport};

use crate::framing::with_chip_select;

/// Framed access to the display controller
pub struct DisplayLink<'a, M: RawMutex, T: Transport> {
    bus: &'a BusArbiter<M, T>,
    cs: PinId,
    dc: PinId,
    chunk_size: usize,
}

impl<'a, M: RawMutex, T: Transport> DisplayLink<'a, M, T> {
    /// Create a link; a zero chunk size is treated as one byte
    pub fn new(bus: &'a BusArbiter<M, T>, cs: PinId, dc: PinId, chunk_size: usize) -> Self {
        Self {
            bus,
            cs,
            dc,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn from_config(bus: &'a BusArbiter<M, T>, config: &DisplayConfig) -> Self {
        Self::new(
            bus,
            PinId(config.cs),
            PinId(config.dc),
            usize::from(config.chunk_size),
        )
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Send a command byte followed by its parameters in one grant
    pub async fn command(&self, cmd: u8, params: &[u8]) -> Result<(), T::Error> {
        let mut bus = self.bus.acquire_display().await;
        let dc = self.dc;
        with_chip_select(&mut *bus, self.cs, |bus| {
            bus.set_pin(dc, Level::Low)?;
            bus.write(&[cmd])?;
            if !params.is_empty() {
                bus.set_pin(dc, Level::High)?;
                bus.write(params)?;
            }
            Ok(())
        })
    }

    /// Send pixel data, one grant per chunk
    pub async fn write_data(&self, data: &[u8]) -> Result<(), T::Error> {
        for chunk in data.chunks(self.chunk_size) {
            let mut bus = self.bus.acquire_display().await;
            let dc = self.dc;
            with_chip_select(&mut *bus, self.cs, |bus| {
                bus.set_pin(dc, Level::High)?;
                bus.write(chunk)
            })?;
        }
        Ok(())
    }
}
