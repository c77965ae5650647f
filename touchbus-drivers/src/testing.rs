//! Test doubles for the driver tests
//!
//! `MockPanel` behaves like an XPT2046 and a display controller sharing one
//! transport. Time is simulated: `TestDelay` advances a `TestClock` one
//! millisecond per yield, so nothing depends on the wall clock.

use core::cell::Cell;
use core::future::Future;
use std::collections::VecDeque;
use std::vec::Vec;

use embassy_futures::select::{select, Either};
use embassy_futures::{block_on, yield_now};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embedded_hal_async::delay::DelayNs;
use touchbus_core::BusArbiter;
use touchbus_hal::{Clock, EdgeTrigger, EdgeUnavailable, Level, PinId, Transport};

use crate::xpt2046::command;

pub const CS: PinId = PinId(0);
pub const DISPLAY_CS: PinId = PinId(1);
pub const DISPLAY_DC: PinId = PinId(2);
pub const PEN: PinId = PinId(3);

const PIN_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

/// One write-only burst seen by the panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Write {
    pub cs: Level,
    pub dc: Level,
    pub data: Vec<u8>,
}

pub struct MockPanel {
    x: u16,
    y: u16,
    z1: u16,
    z2: u16,
    x_script: VecDeque<u16>,
    y_script: VecDeque<u16>,
    levels: [Level; PIN_COUNT],
    pending: Option<u8>,
    commands: Vec<u8>,
    writes: Vec<Write>,
    cs_cycles: u32,
    transfers: u32,
    fail: Option<(u32, u32)>,
}

impl MockPanel {
    /// Finger down at `(x, y)`; PENIRQ idle
    pub fn touching(x: u16, y: u16) -> Self {
        Self {
            x,
            y,
            z1: 600,
            z2: 100,
            x_script: VecDeque::new(),
            y_script: VecDeque::new(),
            levels: [Level::High; PIN_COUNT],
            pending: None,
            commands: Vec::new(),
            writes: Vec::new(),
            cs_cycles: 0,
            transfers: 0,
            fail: None,
        }
    }

    /// Nothing pressing the panel
    pub fn released() -> Self {
        let mut panel = Self::touching(0, 0);
        panel.set_pressure(0, 0);
        panel
    }

    pub fn set_pressure(&mut self, z1: u16, z2: u16) {
        self.z1 = z1;
        self.z2 = z2;
    }

    pub fn set_position(&mut self, x: u16, y: u16) {
        self.x = x;
        self.y = y;
    }

    pub fn set_pen(&mut self, level: Level) {
        self.levels[PEN.index()] = level;
    }

    /// Readings returned ahead of the steady X value
    pub fn script_x(&mut self, values: &[u16]) {
        self.x_script.extend(values);
    }

    /// Readings returned ahead of the steady Y value
    pub fn script_y(&mut self, values: &[u16]) {
        self.y_script.extend(values);
    }

    /// Fail the next `count` transfers
    pub fn fail_next(&mut self, count: u32) {
        self.fail_after(0, count);
    }

    /// Let `skip` transfers through, then fail `count`
    pub fn fail_after(&mut self, skip: u32, count: u32) {
        let start = self.transfers.saturating_add(skip);
        self.fail = Some((start, start.saturating_add(count)));
    }

    pub fn commands(&self) -> &[u8] {
        &self.commands
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn level(&self, pin: PinId) -> Level {
        self.levels[pin.index()]
    }

    pub fn cs_level(&self) -> Level {
        self.level(CS)
    }

    /// Completed touch chip-select cycles
    pub fn cs_cycles(&self) -> u32 {
        self.cs_cycles
    }

    fn conversion(&mut self, cmd: u8) -> u16 {
        match cmd {
            command::READ_X => self.x_script.pop_front().unwrap_or(self.x),
            command::READ_Y => self.y_script.pop_front().unwrap_or(self.y),
            command::READ_Z1 => self.z1,
            command::READ_Z2 => self.z2,
            _ => 0,
        }
    }
}

impl Transport for MockPanel {
    type Error = MockError;

    fn transfer(&mut self, data: &mut [u8]) -> Result<(), MockError> {
        let index = self.transfers;
        self.transfers += 1;
        if matches!(self.fail, Some((start, end)) if (start..end).contains(&index)) {
            return Err(MockError);
        }

        if let [cmd] = data {
            self.pending = Some(*cmd);
            self.commands.push(*cmd);
            *cmd = 0;
        } else {
            let value = match self.pending.take() {
                Some(cmd) => self.conversion(cmd),
                None => 0,
            };
            let word = (value & 0x0FFF) << 3;
            let bytes = word.to_be_bytes();
            for (out, b) in data.iter_mut().zip(bytes) {
                *out = b;
            }
        }
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), MockError> {
        self.writes.push(Write {
            cs: self.level(DISPLAY_CS),
            dc: self.level(DISPLAY_DC),
            data: data.to_vec(),
        });
        Ok(())
    }

    fn set_pin(&mut self, pin: PinId, level: Level) -> Result<(), MockError> {
        let slot = self.levels.get_mut(pin.index()).ok_or(MockError)?;
        if pin == CS && *slot == Level::Low && level == Level::High {
            self.cs_cycles += 1;
        }
        *slot = level;
        Ok(())
    }

    fn read_pin(&mut self, pin: PinId) -> Result<Level, MockError> {
        self.levels.get(pin.index()).copied().ok_or(MockError)
    }
}

pub fn panel_arbiter(panel: MockPanel) -> BusArbiter<NoopRawMutex, MockPanel> {
    BusArbiter::new(panel)
}

/// Simulated millisecond clock
pub struct TestClock {
    now: Cell<u64>,
}

impl TestClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Cell::new(start_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }
}

impl Clock for TestClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

/// Delay that advances a [`TestClock`] by one millisecond per yield
pub struct TestDelay<'a> {
    clock: &'a TestClock,
}

impl<'a> TestDelay<'a> {
    pub fn new(clock: &'a TestClock) -> Self {
        Self { clock }
    }
}

impl DelayNs for TestDelay<'_> {
    async fn delay_ns(&mut self, ns: u32) {
        self.delay_ms(ns.div_ceil(1_000_000)).await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        if ms == 0 {
            yield_now().await;
            return;
        }
        for _ in 0..ms {
            self.clock.advance(1);
            yield_now().await;
        }
    }
}

/// Edge trigger that records whether it is armed
pub struct MockEdge<'a> {
    available: bool,
    listening: &'a Cell<bool>,
}

impl<'a> MockEdge<'a> {
    pub fn new(listening: &'a Cell<bool>) -> Self {
        Self {
            available: true,
            listening,
        }
    }

    pub fn unavailable(listening: &'a Cell<bool>) -> Self {
        Self {
            available: false,
            listening,
        }
    }
}

impl EdgeTrigger for MockEdge<'_> {
    type Error = EdgeUnavailable;

    fn listen_falling(&mut self) -> Result<(), EdgeUnavailable> {
        if !self.available {
            return Err(EdgeUnavailable);
        }
        self.listening.set(true);
        Ok(())
    }

    fn unlisten(&mut self) {
        self.listening.set(false);
    }
}

/// Run `scenario` to completion with `background` polled alongside it
pub fn drive<B: Future, R>(background: B, scenario: impl Future<Output = R>) -> R {
    match block_on(select(background, scenario)) {
        Either::First(_) => panic!("background task finished"),
        Either::Second(out) => out,
    }
}

/// Yield until `cond` holds
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..100_000 {
        if cond() {
            return;
        }
        yield_now().await;
    }
    panic!("condition not reached");
}

/// Give background tasks a chance to run
pub async fn settle() {
    for _ in 0..50 {
        yield_now().await;
    }
}
