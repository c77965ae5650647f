//! Priority-biased bus arbiter
//!
//! One SPI transport is shared by two roles: the display refresh task and
//! the touch reader. The arbiter owns the transport and hands it out to one
//! role at a time through a [`BusGuard`].
//!
//! The display issues long, latency-sensitive bursts while the touch side
//! polls often with short transactions. A waiting display acquisition sets
//! `display_pending`, and no touch acquisition is granted while that flag is
//! up, even if the bus is momentarily free. The flag never preempts the
//! current holder.
//!
//! To bound touch starvation under a display task that re-acquires in a
//! tight loop, the display may be granted ahead of a waiting touch request
//! at most `streak_limit` times in a row (see [`DEFAULT_DISPLAY_STREAK_LIMIT`]).
//! Passing `None` restores strict display priority.

use core::cell::RefCell;
use core::future::Future;
use core::ops::{Deref, DerefMut};
use core::pin::Pin;
use core::task::{Context, Poll};

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embassy_sync::waitqueue::MultiWakerRegistration;
use embedded_hal_async::delay::DelayNs;

/// Consecutive display grants allowed ahead of a waiting touch request
pub const DEFAULT_DISPLAY_STREAK_LIMIT: u8 = 8;

/// Waker slots; one per role plus headroom for timeout wrappers
const MAX_WAITERS: usize = 4;

/// Bus user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    /// Display refresh task
    Display,
    /// Touch reader task
    Touch,
}

/// Arbiter errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArbiterError {
    /// The bus was not granted within the timeout
    LockUnavailable,
}

/// Shared arbitration state
struct State {
    holder: Option<Role>,
    display_pending: bool,
    touch_pending: bool,
    /// Display grants made while a touch request was waiting
    display_streak: u8,
    waiters: MultiWakerRegistration<MAX_WAITERS>,
}

/// Result of one grant attempt
enum Attempt {
    Granted,
    Waiting,
    Reentrant,
}

impl State {
    const fn new() -> Self {
        Self {
            holder: None,
            display_pending: false,
            touch_pending: false,
            display_streak: 0,
            waiters: MultiWakerRegistration::new(),
        }
    }

    fn streak_exhausted(&self, limit: Option<u8>) -> bool {
        matches!(limit, Some(limit) if self.display_streak >= limit)
    }

    fn grantable(&self, role: Role, limit: Option<u8>) -> bool {
        if self.holder.is_some() {
            return false;
        }

        match role {
            Role::Display => !(self.touch_pending && self.streak_exhausted(limit)),
            Role::Touch => !self.display_pending || self.streak_exhausted(limit),
        }
    }

    fn grant(&mut self, role: Role) {
        self.holder = Some(role);
        match role {
            Role::Display => {
                self.display_pending = false;
                self.display_streak = if self.touch_pending {
                    self.display_streak.saturating_add(1)
                } else {
                    0
                };
            }
            Role::Touch => {
                self.touch_pending = false;
                self.display_streak = 0;
            }
        }
    }

    fn set_pending(&mut self, role: Role, pending: bool) {
        match role {
            Role::Display => self.display_pending = pending,
            Role::Touch => self.touch_pending = pending,
        }
    }

    fn attempt(&mut self, role: Role, limit: Option<u8>) -> Attempt {
        if self.holder == Some(role) {
            Attempt::Reentrant
        } else if self.grantable(role, limit) {
            self.grant(role);
            Attempt::Granted
        } else {
            Attempt::Waiting
        }
    }
}

/// Priority-biased lock around a shared transport
///
/// Each role must be driven by exactly one task. Acquiring a role that is
/// already held is a programming error and panics.
pub struct BusArbiter<M: RawMutex, T> {
    state: BlockingMutex<M, RefCell<State>>,
    bus: Mutex<M, T>,
    streak_limit: Option<u8>,
}

impl<M: RawMutex, T> BusArbiter<M, T> {
    /// Create an arbiter with the default display streak limit
    pub const fn new(bus: T) -> Self {
        Self::with_streak_limit(bus, Some(DEFAULT_DISPLAY_STREAK_LIMIT))
    }

    /// Create an arbiter with a custom display streak limit
    ///
    /// `None` gives the display strict priority over waiting touch requests.
    pub const fn with_streak_limit(bus: T, streak_limit: Option<u8>) -> Self {
        Self {
            state: BlockingMutex::new(RefCell::new(State::new())),
            bus: Mutex::new(bus),
            streak_limit,
        }
    }

    /// Wait for the bus in the display role
    pub async fn acquire_display(&self) -> BusGuard<'_, M, T> {
        self.acquire(Role::Display).await
    }

    /// Wait for the bus in the touch role
    pub async fn acquire_touch(&self) -> BusGuard<'_, M, T> {
        self.acquire(Role::Touch).await
    }

    /// Wait for the bus in the given role
    pub async fn acquire(&self, role: Role) -> BusGuard<'_, M, T> {
        let grant = Acquire {
            arbiter: self,
            role,
            queued: false,
            granted: false,
        }
        .await;
        // The grant makes this role the only one allowed to lock the bus
        let bus = self.bus.lock().await;
        BusGuard { bus, grant }
    }

    /// Wait for the display role, giving up after `timeout_ms`
    pub async fn acquire_display_within<D: DelayNs>(
        &self,
        delay: &mut D,
        timeout_ms: u32,
    ) -> Result<BusGuard<'_, M, T>, ArbiterError> {
        self.acquire_within(Role::Display, delay, timeout_ms).await
    }

    /// Wait for the touch role, giving up after `timeout_ms`
    pub async fn acquire_touch_within<D: DelayNs>(
        &self,
        delay: &mut D,
        timeout_ms: u32,
    ) -> Result<BusGuard<'_, M, T>, ArbiterError> {
        self.acquire_within(Role::Touch, delay, timeout_ms).await
    }

    /// Wait for a role, giving up after `timeout_ms`
    ///
    /// A timed-out request withdraws its pending flag.
    pub async fn acquire_within<D: DelayNs>(
        &self,
        role: Role,
        delay: &mut D,
        timeout_ms: u32,
    ) -> Result<BusGuard<'_, M, T>, ArbiterError> {
        match select(self.acquire(role), delay.delay_ms(timeout_ms)).await {
            Either::First(guard) => Ok(guard),
            Either::Second(()) => Err(ArbiterError::LockUnavailable),
        }
    }

    /// Take the display role only if it can be granted right now
    pub fn try_acquire_display(&self) -> Option<BusGuard<'_, M, T>> {
        self.try_acquire(Role::Display)
    }

    /// Take the touch role only if it can be granted right now
    pub fn try_acquire_touch(&self) -> Option<BusGuard<'_, M, T>> {
        self.try_acquire(Role::Touch)
    }

    /// Take a role only if it can be granted right now
    pub fn try_acquire(&self, role: Role) -> Option<BusGuard<'_, M, T>> {
        let attempt = self.with_state(|s| s.attempt(role, self.streak_limit));
        match attempt {
            Attempt::Granted => {}
            Attempt::Waiting => return None,
            Attempt::Reentrant => reentrant(role),
        }

        let grant = Grant { arbiter: self, role };
        let bus = self.bus.try_lock().ok()?;
        Some(BusGuard { bus, grant })
    }

    /// Role currently holding the bus
    pub fn holder(&self) -> Option<Role> {
        self.with_state(|s| s.holder)
    }

    /// Check if a display request is waiting
    pub fn is_display_pending(&self) -> bool {
        self.with_state(|s| s.display_pending)
    }

    /// Check if a touch request is waiting
    pub fn is_touch_pending(&self) -> bool {
        self.with_state(|s| s.touch_pending)
    }

    /// Direct access to the transport when no role can be active
    pub fn get_mut(&mut self) -> &mut T {
        self.bus.get_mut()
    }

    /// Consume the arbiter and return the transport
    pub fn into_inner(self) -> T {
        self.bus.into_inner()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        self.state.lock(|s| f(&mut s.borrow_mut()))
    }

    fn release(&self, role: Role) {
        self.with_state(|s| {
            if s.holder == Some(role) {
                s.holder = None;
            }
            s.waiters.wake();
        });
    }

    fn withdraw(&self, role: Role) {
        self.with_state(|s| {
            s.set_pending(role, false);
            // The streak only counts grants made ahead of a waiting touch
            if role == Role::Touch {
                s.display_streak = 0;
            }
            s.waiters.wake();
        });
    }
}

#[cold]
fn reentrant(role: Role) -> ! {
    panic!("bus arbiter: {:?} role already holds the bus", role)
}

/// Future resolving once a role is granted
#[must_use = "futures do nothing unless polled"]
struct Acquire<'a, M: RawMutex, T> {
    arbiter: &'a BusArbiter<M, T>,
    role: Role,
    queued: bool,
    granted: bool,
}

impl<'a, M: RawMutex, T> Future for Acquire<'a, M, T> {
    type Output = Grant<'a, M, T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let role = self.role;
        let limit = self.arbiter.streak_limit;
        let attempt = self.arbiter.with_state(|s| {
            let attempt = s.attempt(role, limit);
            if let Attempt::Waiting = attempt {
                s.set_pending(role, true);
                s.waiters.register(cx.waker());
            }
            attempt
        });

        match attempt {
            Attempt::Granted => {
                self.granted = true;
                Poll::Ready(Grant {
                    arbiter: self.arbiter,
                    role,
                })
            }
            Attempt::Waiting => {
                self.queued = true;
                Poll::Pending
            }
            Attempt::Reentrant => reentrant(role),
        }
    }
}

impl<M: RawMutex, T> Drop for Acquire<'_, M, T> {
    fn drop(&mut self) {
        if self.queued && !self.granted {
            self.arbiter.withdraw(self.role);
        }
    }
}

/// Ownership of a role; releases it when dropped
struct Grant<'a, M: RawMutex, T> {
    arbiter: &'a BusArbiter<M, T>,
    role: Role,
}

impl<M: RawMutex, T> Drop for Grant<'_, M, T> {
    fn drop(&mut self) {
        self.arbiter.release(self.role);
    }
}

/// Exclusive access to the shared transport
///
/// Dereferences to the transport. Dropping the guard releases the bus and
/// wakes every waiter, on every exit path.
pub struct BusGuard<'a, M: RawMutex, T> {
    // Field order matters: the transport lock drops before the role
    bus: MutexGuard<'a, M, T>,
    grant: Grant<'a, M, T>,
}

impl<M: RawMutex, T> BusGuard<'_, M, T> {
    /// Role this guard was granted for
    pub fn role(&self) -> Role {
        self.grant.role
    }

    /// Release the bus
    pub fn release(self) {
        drop(self);
    }
}

impl<M: RawMutex, T> Deref for BusGuard<'_, M, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.bus
    }
}

impl<M: RawMutex, T> DerefMut for BusGuard<'_, M, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.bus
    }
}
