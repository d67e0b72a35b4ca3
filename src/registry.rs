/*
MIT License

Copyright (c) 2021 Philipp Schuster

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/

//! Process wide bookkeeping of live timers, so that timers can be cleared by
//! their numeric ID as in Javascript (`clearInterval(id)`), even after their
//! handle was dropped.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::debug;

static TIMER_REGISTRY: TimerRegistry = TimerRegistry::new();

/// Unique numeric ID of a timer. Similar to the number returned by
/// `setInterval` in Javascript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl TimerId {
    /// The raw numeric value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<TimerId> for u64 {
    fn from(id: TimerId) -> Self {
        id.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenState {
    /// Waiting or repeating.
    Armed,
    /// A delayed timer has started its single invocation.
    Committed,
    Cancelled,
}

/// Shared between a timer, its handle and the registry. Blocking timers sleep on
/// the condvar, async timers on the [`Notify`]; [`CancelToken::cancel`] wakes both.
pub(crate) struct CancelToken {
    state: Mutex<TokenState>,
    wakeup: Condvar,
    notify: Notify,
}

impl CancelToken {
    fn new() -> Self {
        Self {
            state: Mutex::new(TokenState::Armed),
            wakeup: Condvar::new(),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TokenState> {
        // the state is a plain enum, it can't be left half-written
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancels the timer. Returns `false` if it was already cancelled or if a
    /// delayed timer already committed to its invocation.
    pub(crate) fn cancel(&self) -> bool {
        {
            let mut state = self.lock();
            if *state != TokenState::Armed {
                return false;
            }
            *state = TokenState::Cancelled;
        }
        self.wakeup.notify_all();
        self.notify.notify_waiters();
        true
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        *self.lock() == TokenState::Cancelled
    }

    /// Called by a delayed timer right before it invokes its callback. After a
    /// successful commit, [`CancelToken::cancel`] has no effect anymore.
    pub(crate) fn commit(&self) -> bool {
        let mut state = self.lock();
        match *state {
            TokenState::Armed => {
                *state = TokenState::Committed;
                true
            }
            TokenState::Committed => true,
            TokenState::Cancelled => false,
        }
    }

    /// Blocks the current thread for `dur` or until the timer gets cancelled.
    /// Returns `true` if the timer was cancelled. A `dur` too large to be
    /// represented as a deadline sleeps until cancelled.
    pub(crate) fn sleep(&self, dur: Duration) -> bool {
        let deadline = Instant::now().checked_add(dur);
        let mut state = self.lock();
        loop {
            if *state == TokenState::Cancelled {
                return true;
            }
            // spurious wakeups just go around the loop again
            state = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    self.wakeup
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .wakeup
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    /// Completes once the timer gets cancelled.
    pub(crate) async fn cancelled(&self) {
        loop {
            // `notify_waiters` reaches a `Notified` future from the moment it
            // is created, so creating it before checking the flag can't miss a
            // cancellation.
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// **INTERNAL** Assigns unique IDs to timers and remembers the cancel tokens of
/// all timers that are still running.
struct TimerRegistry {
    /// Monotonic incrementing counter used for timer IDs.
    counter: AtomicU64,
    /// Contains only the timers that are running and not finished yet.
    running: Mutex<BTreeMap<u64, Arc<CancelToken>>>,
}

impl TimerRegistry {
    const fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
            running: Mutex::new(BTreeMap::new()),
        }
    }

    fn running(&self) -> MutexGuard<'_, BTreeMap<u64, Arc<CancelToken>>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registration of one timer. Unregisters the timer when dropped, which the
/// timer thread or task does when it ends, even if it unwinds.
pub(crate) struct Registration {
    id: TimerId,
    token: Arc<CancelToken>,
}

impl Registration {
    pub(crate) fn id(&self) -> TimerId {
        self.id
    }

    pub(crate) fn token(&self) -> &Arc<CancelToken> {
        &self.token
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        TIMER_REGISTRY.running().remove(&self.id.0);
    }
}

/// Acquires a new ID and registers a fresh cancel token under it.
pub(crate) fn register() -> Registration {
    let id = TIMER_REGISTRY.counter.fetch_add(1, Ordering::SeqCst);
    let token = Arc::new(CancelToken::new());
    // dedicated scope -> early drop lock
    {
        let mut map = TIMER_REGISTRY.running();
        map.insert(id, token.clone());
    }
    Registration {
        id: TimerId(id),
        token,
    }
}

fn cancel_by_id(id: TimerId) -> bool {
    // clone the token out so the registry lock isn't held while waking timers
    let token = TIMER_REGISTRY.running().get(&id.0).cloned();
    match token {
        Some(token) => {
            let cancelled = token.cancel();
            if cancelled {
                debug!(timer = %id, "timer cleared by id");
            }
            cancelled
        }
        None => false,
    }
}

/// Clears an interval that was created via [`crate::set_interval!`] (or any
/// other repeating timer) by its ID. As in Javascript, an unknown or already
/// finished ID is silently ignored; the return value tells whether a running
/// timer was cancelled.
pub fn clear_interval(id: TimerId) -> bool {
    cancel_by_id(id)
}

/// Clears a timeout that was created via [`crate::set_timeout!`] (or any other
/// delayed timer) by its ID. Returns `false` if the ID is unknown or if the
/// timeout already fired.
pub fn clear_timeout(id: TimerId) -> bool {
    cancel_by_id(id)
}

/// Number of timers that are currently registered, i.e. started and not yet
/// finished.
pub fn active_timers() -> usize {
    TIMER_REGISTRY.running().len()
}
