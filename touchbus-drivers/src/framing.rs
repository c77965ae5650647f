//! Chip-select framing on a shared transport

use touchbus_hal::{Level, PinId, Transport};

/// Run `f` with `cs` asserted (low)
///
/// Chip select is deasserted again on every path, including when `f`
/// fails; the first error wins.
pub fn with_chip_select<T, R, F>(bus: &mut T, cs: PinId, f: F) -> Result<R, T::Error>
where
    T: Transport,
    F: FnOnce(&mut T) -> Result<R, T::Error>,
{
    bus.set_pin(cs, Level::Low)?;
    let result = f(bus);
    let released = bus.set_pin(cs, Level::High);
    let value = result?;
    released?;
    Ok(value)
}
