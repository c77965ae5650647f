//! SPI bus abstractions
//!
//! Provides the SPI master trait that chip-specific HALs implement. Chip
//! select is not part of it: the transport drives chip selects as ordinary
//! output pins so the display and the touch controller can share one bus.

/// SPI bus master
pub trait SpiBus {
    /// Error type for SPI operations
    type Error: core::fmt::Debug;

    /// Transfer data in place
    ///
    /// Writes data from buffer while reading into the same buffer.
    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<(), Self::Error>;

    /// Write data without reading
    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Wait until all queued words have left the shift register
    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
