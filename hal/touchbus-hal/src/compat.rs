//! Adapters for `embedded-hal` 1.0 implementations
//!
//! Most chip HALs already implement the `embedded-hal` traits; wrapping
//! their SPI bus and flex pins here is enough to build a
//! [`SpiTransport`](crate::SpiTransport).

use core::convert::Infallible;

use embedded_hal::digital::{InputPin as EhInputPin, OutputPin as EhOutputPin};
use embedded_hal::spi::SpiBus as EhSpiBus;

use crate::gpio::{InputPin, OutputPin};
use crate::spi::SpiBus;

/// `embedded-hal` SPI bus wrapper
#[derive(Debug)]
pub struct EhSpi<T>(pub T);

impl<T: EhSpiBus> SpiBus for EhSpi<T> {
    type Error = T::Error;

    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<(), Self::Error> {
        self.0.transfer_in_place(data)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.0.write(data)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.0.flush()
    }
}

/// `embedded-hal` pin wrapper
///
/// Only infallible pins are accepted, which covers on-chip GPIO on every
/// HAL in common use.
#[derive(Debug)]
pub struct EhPin<P>(pub P);

impl<P: EhOutputPin<Error = Infallible>> OutputPin for EhPin<P> {
    fn set_high(&mut self) {
        self.0.set_high().unwrap_or_else(|e| match e {})
    }

    fn set_low(&mut self) {
        self.0.set_low().unwrap_or_else(|e| match e {})
    }
}

impl<P: EhInputPin<Error = Infallible>> InputPin for EhPin<P> {
    fn is_high(&mut self) -> bool {
        self.0.is_high().unwrap_or_else(|e| match e {})
    }
}
