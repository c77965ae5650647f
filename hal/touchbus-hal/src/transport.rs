//! Byte transport shared by the display and the touch controller
//!
//! A [`Transport`] is the whole physical interface one role needs while it
//! holds the bus: a full-duplex byte channel plus the digital lines around
//! it (chip selects, data/command, PENIRQ).

use crate::gpio::{IoPin, Level, PinId};
use crate::spi::SpiBus;

/// Full-duplex byte channel with addressable pins
pub trait Transport {
    /// Error type for transport operations
    type Error: core::fmt::Debug;

    /// Exchange bytes in place
    ///
    /// The buffer is sent and overwritten with the bytes clocked in; the
    /// length never changes.
    fn transfer(&mut self, data: &mut [u8]) -> Result<(), Self::Error>;

    /// Send bytes, discarding whatever is clocked in
    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Drive an output line
    fn set_pin(&mut self, pin: PinId, level: Level) -> Result<(), Self::Error>;

    /// Sample an input line
    fn read_pin(&mut self, pin: PinId) -> Result<Level, Self::Error>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    type Error = T::Error;

    fn transfer(&mut self, data: &mut [u8]) -> Result<(), Self::Error> {
        T::transfer(self, data)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        T::write(self, data)
    }

    fn set_pin(&mut self, pin: PinId, level: Level) -> Result<(), Self::Error> {
        T::set_pin(self, pin, level)
    }

    fn read_pin(&mut self, pin: PinId) -> Result<Level, Self::Error> {
        T::read_pin(self, pin)
    }
}

/// Errors from [`SpiTransport`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError<E> {
    /// The SPI peripheral reported an error
    Spi(E),
    /// No pin is registered under this id
    UnknownPin(PinId),
}

/// [`Transport`] built from an SPI bus and a table of pins
///
/// Pins are addressed by their index in the table, so `PinId(0)` is
/// `pins[0]`.
pub struct SpiTransport<SPI, P, const N: usize> {
    spi: SPI,
    pins: [P; N],
}

impl<SPI, P, const N: usize> SpiTransport<SPI, P, N> {
    /// Create a transport from an SPI bus and its pin table
    pub fn new(spi: SPI, pins: [P; N]) -> Self {
        Self { spi, pins }
    }

    /// Release the bus and pins
    pub fn into_parts(self) -> (SPI, [P; N]) {
        (self.spi, self.pins)
    }
}

impl<SPI, P, const N: usize> Transport for SpiTransport<SPI, P, N>
where
    SPI: SpiBus,
    P: IoPin,
{
    type Error = TransportError<SPI::Error>;

    fn transfer(&mut self, data: &mut [u8]) -> Result<(), Self::Error> {
        self.spi.transfer_in_place(data).map_err(TransportError::Spi)?;
        self.spi.flush().map_err(TransportError::Spi)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.spi.write(data).map_err(TransportError::Spi)?;
        self.spi.flush().map_err(TransportError::Spi)
    }

    fn set_pin(&mut self, pin: PinId, level: Level) -> Result<(), Self::Error> {
        let p = self
            .pins
            .get_mut(pin.index())
            .ok_or(TransportError::UnknownPin(pin))?;
        p.set_level(level);
        Ok(())
    }

    fn read_pin(&mut self, pin: PinId) -> Result<Level, Self::Error> {
        self.pins
            .get_mut(pin.index())
            .map(|p| p.level())
            .ok_or(TransportError::UnknownPin(pin))
    }
}
