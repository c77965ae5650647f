//! Touch event dispatcher
//!
//! Turns pen triggers into delivered touch points:
//!
//! ```text
//! Idle ──start──► Armed ──trigger──► Sampling ──► Debouncing ──release/timeout──► Armed
//!                   ▲  └─debounced─┘                                              │
//!                   └──────────────────────────────────────────────────────────────┘
//! any ──stop──► Stopped ──start──► Armed
//! ```
//!
//! The processing loop is [`TouchDispatcher::run`], which the application
//! spawns once (or joins with its other futures). Control methods take
//! `&self` and may be called from any task; [`TouchDispatcher::on_pen_edge`]
//! is safe to call from the PENIRQ interrupt handler when `M` is an
//! interrupt-safe mutex.
//!
//! In interrupt mode triggers are edge timestamps queued by
//! `on_pen_edge`; in polling mode the pen state is checked every
//! `poll_interval_ms`. Each accepted trigger yields at most one point,
//! delivered to the registered handler and to a bounded queue read with
//! [`TouchDispatcher::next_point`].

use core::cell::{Cell, RefCell};

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::channel::{Channel, TrySendError};
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embedded_hal_async::delay::DelayNs;
use touchbus_core::config::DispatchConfig;
use touchbus_core::dispatch::{
    Debouncer, DispatchEvent, DispatchMode, DispatchState, StartOutcome,
};
use touchbus_core::sample::TouchPoint;
use touchbus_hal::{Clock, EdgeTrigger, Transport};

use crate::fmt::Dbg;
use crate::xpt2046::TouchSampler;

/// Pen edges buffered between the interrupt and the loop
pub const EDGE_QUEUE_DEPTH: usize = 4;

/// Touch points buffered for [`TouchDispatcher::next_point`]
pub const POINT_QUEUE_DEPTH: usize = 8;

/// Longest wait for the loop to acknowledge a stop
pub const JOIN_TIMEOUT_MS: u32 = 100;

/// Error reported by a touch handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HandlerError;

/// Receiver of touch points
pub trait TouchHandler {
    fn on_touch(&mut self, point: TouchPoint) -> Result<(), HandlerError>;
}

impl<F: FnMut(TouchPoint)> TouchHandler for F {
    fn on_touch(&mut self, point: TouchPoint) -> Result<(), HandlerError> {
        self(point);
        Ok(())
    }
}

enum HandlerFault {
    Failed(HandlerError),
    #[cfg(any(test, feature = "std"))]
    Panicked,
}

#[cfg(any(test, feature = "std"))]
fn invoke<H: TouchHandler>(handler: &mut H, point: TouchPoint) -> Result<(), HandlerFault> {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    match catch_unwind(AssertUnwindSafe(|| handler.on_touch(point))) {
        Ok(result) => result.map_err(HandlerFault::Failed),
        Err(_) => Err(HandlerFault::Panicked),
    }
}

#[cfg(not(any(test, feature = "std")))]
fn invoke<H: TouchHandler>(handler: &mut H, point: TouchPoint) -> Result<(), HandlerFault> {
    handler.on_touch(point).map_err(HandlerFault::Failed)
}

/// Dispatcher bookkeeping, updated as a whole
#[derive(Clone, Copy)]
struct Control {
    running: bool,
    /// The loop is inside a listening session
    active: bool,
    mode: DispatchMode,
    state: DispatchState,
    debouncer: Debouncer,
}

/// Touch event dispatcher
pub struct TouchDispatcher<'a, M, T, C, E, H>
where
    M: RawMutex,
    T: Transport,
    C: Clock,
    E: EdgeTrigger,
    H: TouchHandler,
{
    sampler: TouchSampler<'a, M, T>,
    clock: C,
    config: DispatchConfig,
    control: BlockingMutex<M, Cell<Control>>,
    edge: BlockingMutex<M, RefCell<E>>,
    handler: Mutex<M, Option<H>>,
    edges: Channel<M, u64, EDGE_QUEUE_DEPTH>,
    points: Channel<M, TouchPoint, POINT_QUEUE_DEPTH>,
    start: Signal<M, ()>,
    stop: Signal<M, ()>,
    exited: Signal<M, ()>,
}

impl<'a, M, T, C, E, H> TouchDispatcher<'a, M, T, C, E, H>
where
    M: RawMutex,
    T: Transport,
    C: Clock,
    E: EdgeTrigger,
    H: TouchHandler,
{
    pub fn new(sampler: TouchSampler<'a, M, T>, clock: C, edge: E, config: DispatchConfig) -> Self {
        Self {
            sampler,
            clock,
            config,
            control: BlockingMutex::new(Cell::new(Control {
                running: false,
                active: false,
                mode: config.mode,
                state: DispatchState::Idle,
                debouncer: Debouncer::new(config.debounce_ms),
            })),
            edge: BlockingMutex::new(RefCell::new(edge)),
            handler: Mutex::new(None),
            edges: Channel::new(),
            points: Channel::new(),
            start: Signal::new(),
            stop: Signal::new(),
            exited: Signal::new(),
        }
    }

    pub fn sampler(&self) -> &TouchSampler<'a, M, T> {
        &self.sampler
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn state(&self) -> DispatchState {
        self.control().state
    }

    pub fn is_running(&self) -> bool {
        self.control().running
    }

    /// Detection mode of the current (or last) session
    pub fn mode(&self) -> DispatchMode {
        self.control().mode
    }

    /// Time of the last accepted trigger
    pub fn last_event_ms(&self) -> Option<u64> {
        self.control().debouncer.last_event_ms()
    }

    fn control(&self) -> Control {
        self.control.lock(|c| c.get())
    }

    fn update<R>(&self, f: impl FnOnce(&mut Control) -> R) -> R {
        self.control.lock(|c| {
            let mut control = c.get();
            let out = f(&mut control);
            c.set(control);
            out
        })
    }

    fn apply(&self, event: DispatchEvent) {
        self.update(|c| c.state = c.state.transition(event));
    }

    /// Install or replace the touch handler
    pub async fn set_callback(&self, handler: H) {
        *self.handler.lock().await = Some(handler);
    }

    /// Remove the touch handler, returning it
    pub async fn clear_callback(&self) -> Option<H> {
        self.handler.lock().await.take()
    }

    /// Begin listening for touches
    ///
    /// In interrupt mode the falling-edge trigger is registered; if that
    /// fails the session runs in polling mode instead. Calling this while
    /// already running changes nothing.
    pub fn start_listening(&self, mode: DispatchMode) -> StartOutcome {
        let already = self.update(|c| core::mem::replace(&mut c.running, true));
        if already {
            debug!("touch listener already running");
            return StartOutcome::AlreadyRunning;
        }

        let mode = match mode {
            DispatchMode::Interrupt => match self.edge.lock(|e| e.borrow_mut().listen_falling()) {
                Ok(()) => DispatchMode::Interrupt,
                Err(e) => {
                    warn!("edge trigger unavailable ({:?}), polling instead", Dbg(&e));
                    DispatchMode::Polling
                }
            },
            DispatchMode::Polling => DispatchMode::Polling,
        };

        self.drain_edges();
        while self.points.try_receive().is_ok() {}
        self.update(|c| {
            c.mode = mode;
            c.debouncer.reset();
            c.state = c.state.transition(DispatchEvent::StartListening);
        });
        self.start.signal(());

        info!("touch listener started ({:?})", mode);
        StartOutcome::Started(mode)
    }

    /// Stop listening
    ///
    /// Unregisters the edge trigger and waits up to [`JOIN_TIMEOUT_MS`]
    /// for the loop to acknowledge. Safe to call in any state, any number
    /// of times.
    pub async fn stop_listening<D: DelayNs>(&self, delay: &mut D) {
        let (was_running, active) = self.update(|c| {
            let was_running = core::mem::replace(&mut c.running, false);
            c.state = c.state.transition(DispatchEvent::StopListening);
            (was_running, c.active)
        });
        self.edge.lock(|e| e.borrow_mut().unlisten());
        self.start.reset();

        if !was_running {
            debug!("touch listener already stopped");
            return;
        }

        if active {
            self.stop.signal(());
            match select(self.exited.wait(), delay.delay_ms(JOIN_TIMEOUT_MS)).await {
                Either::First(()) => {}
                Either::Second(()) => {
                    warn!("touch listener did not stop within {} ms", JOIN_TIMEOUT_MS);
                    return;
                }
            }
        }
        info!("touch listener stopped");
    }

    /// Record a PENIRQ falling edge
    ///
    /// Interrupt-safe and non-blocking. Edges outside an interrupt-mode
    /// session are ignored; edges beyond the queue depth are dropped.
    pub fn on_pen_edge(&self) {
        let control = self.control();
        if !control.running || control.mode != DispatchMode::Interrupt {
            return;
        }

        let at_ms = self.clock.now_ms();
        if self.edges.try_send(at_ms).is_err() {
            trace!("edge queue full, dropping edge at {} ms", at_ms);
        }
    }

    /// Wait for the next touch point
    pub async fn next_point(&self) -> TouchPoint {
        self.points.receive().await
    }

    /// Take a buffered touch point, if any
    pub fn try_next_point(&self) -> Option<TouchPoint> {
        self.points.try_receive().ok()
    }

    /// Processing loop
    ///
    /// Never returns. Idles until [`start_listening`](Self::start_listening)
    /// and handles triggers until [`stop_listening`](Self::stop_listening).
    pub async fn run<D: DelayNs>(&self, delay: &mut D) -> ! {
        loop {
            self.start.wait().await;
            // Clear before turning active; a stop from a session that
            // outlived its join timeout must not end this one
            self.stop.reset();
            self.exited.reset();
            let entered = self.update(|c| {
                c.active = c.running;
                c.running
            });
            if !entered {
                continue;
            }

            self.listen(delay).await;

            self.update(|c| c.active = false);
            self.exited.signal(());
        }
    }

    async fn listen<D: DelayNs>(&self, delay: &mut D) {
        while let Some(at_ms) = self.next_trigger(delay).await {
            if !self.debounce(at_ms) {
                continue;
            }

            if let Some(point) = self.sampler.sample().await {
                self.deliver(point).await;
            }
            self.apply(DispatchEvent::SampleComplete);

            match select(self.stop.wait(), self.wait_for_release(delay)).await {
                Either::First(()) => return,
                Either::Second(true) => self.apply(DispatchEvent::ReleaseDetected),
                Either::Second(false) => {
                    debug!("pen still down after {} ms", self.config.release_timeout_ms);
                    self.apply(DispatchEvent::ReleaseTimedOut);
                }
            }
            // Edges raised while sampling belong to the touch just handled
            self.drain_edges();
        }
    }

    async fn next_trigger<D: DelayNs>(&self, delay: &mut D) -> Option<u64> {
        if !self.is_running() {
            return None;
        }

        let trigger = async {
            match self.mode() {
                DispatchMode::Interrupt => self.edges.receive().await,
                DispatchMode::Polling => self.poll_for_pen(delay).await,
            }
        };
        match select(self.stop.wait(), trigger).await {
            Either::First(()) => None,
            Either::Second(at_ms) => Some(at_ms),
        }
    }

    fn debounce(&self, at_ms: u64) -> bool {
        let accepted = self.update(|c| {
            let accepted = c.debouncer.accept(at_ms);
            let event = if accepted {
                DispatchEvent::TriggerAccepted
            } else {
                DispatchEvent::TriggerRejected
            };
            c.state = c.state.transition(event);
            accepted
        });
        if !accepted {
            trace!("trigger at {} ms inside debounce window", at_ms);
        }
        accepted
    }

    async fn poll_for_pen<D: DelayNs>(&self, delay: &mut D) -> u64 {
        loop {
            match self.sampler.pen_active().await {
                Ok(true) => return self.clock.now_ms(),
                Ok(false) => {}
                Err(e) => warn!("pen check failed: {:?}", Dbg(&e)),
            }
            delay.delay_ms(self.config.poll_interval_ms).await;
        }
    }

    /// Wait for the pen to lift; `false` on timeout
    async fn wait_for_release<D: DelayNs>(&self, delay: &mut D) -> bool {
        let started = self.clock.now_ms();
        let timeout = u64::from(self.config.release_timeout_ms);
        loop {
            match self.sampler.pen_active().await {
                Ok(false) => return true,
                Ok(true) => {}
                Err(e) => warn!("pen check failed: {:?}", Dbg(&e)),
            }
            if self.clock.now_ms().saturating_sub(started) >= timeout {
                return false;
            }
            delay.delay_ms(self.config.release_poll_ms).await;
        }
    }

    async fn deliver(&self, point: TouchPoint) {
        if let Err(TrySendError::Full(point)) = self.points.try_send(point) {
            // Keep the freshest points
            let _ = self.points.try_receive();
            let _ = self.points.try_send(point);
            trace!("point queue full, dropped oldest");
        }

        let mut handler = self.handler.lock().await;
        let Some(handler) = handler.as_mut() else {
            return;
        };
        match invoke(handler, point) {
            Ok(()) => {}
            Err(HandlerFault::Failed(e)) => warn!("touch handler failed: {:?}", e),
            #[cfg(any(test, feature = "std"))]
            Err(HandlerFault::Panicked) => error!("touch handler panicked on {:?}", point),
        }
    }

    fn drain_edges(&self) {
        while self.edges.try_receive().is_ok() {}
    }
}
