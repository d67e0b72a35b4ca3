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

//! Timers that run on a dedicated OS thread each.
//!
//! Every timer gets its own thread that sleeps between invocations. Unlike a
//! plain detached thread, every timer hands out a handle that can cancel the
//! timer, wait for it and retrieve a panic of the callback. Dropping the handle
//! detaches the timer, it then keeps running until it is cleared via
//! [`crate::clear_interval`] / [`crate::clear_timeout`] or the process exits.

use crate::error::TimerError;
use crate::options::TimerOptions;
use crate::registry::{self, CancelToken, Registration, TimerId};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error};

/// Handle of a timer that invokes a callback over and over again, with a fixed
/// pause in between. Created by [`RepeatingTimer::start`] or [`crate::set_interval!`].
///
/// The callback runs right after the timer was started (unless configured
/// otherwise via [`TimerOptions::immediate`]), then after every `period`. The
/// pause starts when the callback returns, so slow callbacks stretch the
/// effective period.
#[must_use = "dropping the handle detaches the timer, it keeps running"]
pub struct RepeatingTimer {
    id: TimerId,
    token: Arc<CancelToken>,
    invocations: Arc<AtomicU64>,
    thread: JoinHandle<Result<u64, TimerError>>,
}

impl RepeatingTimer {
    /// Starts a repeating timer with default [`TimerOptions`].
    ///
    /// Fails if `period` is shorter than the minimum period or if no thread
    /// could be spawned.
    pub fn start<F>(f: F, period: Duration) -> Result<Self, TimerError>
    where
        F: FnMut() + Send + 'static,
    {
        Self::start_with(&TimerOptions::default(), f, period)
    }

    /// Starts a repeating timer with the given options.
    pub fn start_with<F>(opts: &TimerOptions, f: F, period: Duration) -> Result<Self, TimerError>
    where
        F: FnMut() + Send + 'static,
    {
        opts.check_period(period)?;

        let reg = registry::register();
        let id = reg.id();
        let token = reg.token().clone();
        let invocations = Arc::new(AtomicU64::new(0));
        let immediate = opts.is_immediate();

        // on spawn failure the closure, and with it the registration, is dropped
        let thread = opts.thread_builder(id).spawn({
            let invocations = invocations.clone();
            move || run_repeating(reg, f, period, immediate, &invocations)
        })?;
        debug!(timer = %id, ?period, immediate, "started repeating timer");

        Ok(Self {
            id,
            token,
            invocations,
            thread,
        })
    }

    /// ID that can be passed to [`crate::clear_interval`].
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Stops the timer. A callback that is currently running finishes, but no
    /// further invocation starts. Returns `false` if the timer was already
    /// cancelled.
    pub fn cancel(&self) -> bool {
        self.token.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the timer thread has ended, either after a cancellation or
    /// because the callback panicked.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Number of completed invocations so far.
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Waits for the timer thread to end and returns the total number of
    /// completed invocations, or the panic of the callback.
    ///
    /// A repeating timer only ends when it is cancelled or its callback panics,
    /// so call [`RepeatingTimer::cancel`] first, otherwise this blocks forever.
    pub fn join(self) -> Result<u64, TimerError> {
        self.thread
            .join()
            .unwrap_or_else(|payload| Err(TimerError::from_panic(payload)))
    }

    /// Drops the handle but keeps the timer running. The returned ID can still
    /// be used with [`crate::clear_interval`].
    pub fn detach(self) -> TimerId {
        self.id
    }
}

impl fmt::Debug for RepeatingTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepeatingTimer")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .field("finished", &self.is_finished())
            .field("invocations", &self.invocations())
            .finish()
    }
}

fn run_repeating<F>(
    reg: Registration,
    mut f: F,
    period: Duration,
    immediate: bool,
    invocations: &AtomicU64,
) -> Result<u64, TimerError>
where
    F: FnMut(),
{
    let token = reg.token();
    let mut cancelled = !immediate && token.sleep(period);

    while !cancelled && !token.is_cancelled() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| f())) {
            let err = TimerError::from_panic(payload);
            error!(timer = %reg.id(), %err, "repeating timer stopped");
            return Err(err);
        }
        invocations.fetch_add(1, Ordering::SeqCst);
        cancelled = token.sleep(period);
    }

    let total = invocations.load(Ordering::SeqCst);
    debug!(timer = %reg.id(), invocations = total, "repeating timer cancelled");
    Ok(total)
}

/// Handle of a timer that invokes a callback once after a delay. Created by
/// [`DelayedTimer::start`] or [`crate::set_timeout!`].
///
/// The callback owns everything it captured and may return a value, which
/// [`DelayedTimer::join`] hands back to the owner of the handle.
#[must_use = "dropping the handle detaches the timer, it still fires"]
pub struct DelayedTimer<T> {
    id: TimerId,
    token: Arc<CancelToken>,
    thread: JoinHandle<Result<T, TimerError>>,
}

impl<T: Send + 'static> DelayedTimer<T> {
    /// Starts a delayed timer with default [`TimerOptions`]. A zero delay is
    /// valid and fires as soon as the thread runs.
    pub fn start<F>(f: F, delay: Duration) -> Result<Self, TimerError>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::start_with(&TimerOptions::default(), f, delay)
    }

    /// Starts a delayed timer with the given options.
    pub fn start_with<F>(opts: &TimerOptions, f: F, delay: Duration) -> Result<Self, TimerError>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let reg = registry::register();
        let id = reg.id();
        let token = reg.token().clone();

        let thread = opts
            .thread_builder(id)
            .spawn(move || run_delayed(reg, f, delay))?;
        debug!(timer = %id, ?delay, "started delayed timer");

        Ok(Self { id, token, thread })
    }
}

impl<T> DelayedTimer<T> {
    /// ID that can be passed to [`crate::clear_timeout`].
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Prevents the callback from running. Returns `true` if the callback was
    /// prevented, `false` if it already started or the timer was already
    /// cancelled.
    pub fn cancel(&self) -> bool {
        self.token.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Waits until the timer has fired and returns the value of the callback.
    /// Returns [`TimerError::Cancelled`] if it never ran and
    /// [`TimerError::Panicked`] if it panicked.
    pub fn join(self) -> Result<T, TimerError> {
        self.thread
            .join()
            .unwrap_or_else(|payload| Err(TimerError::from_panic(payload)))
    }

    /// Drops the handle but keeps the timer armed. The returned ID can still be
    /// used with [`crate::clear_timeout`].
    pub fn detach(self) -> TimerId {
        self.id
    }
}

impl<T> fmt::Debug for DelayedTimer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelayedTimer")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .field("finished", &self.is_finished())
            .finish()
    }
}

fn run_delayed<F, T>(reg: Registration, f: F, delay: Duration) -> Result<T, TimerError>
where
    F: FnOnce() -> T,
{
    let token = reg.token();
    if token.sleep(delay) || !token.commit() {
        debug!(timer = %reg.id(), "delayed timer cancelled before firing");
        return Err(TimerError::Cancelled);
    }

    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => {
            debug!(timer = %reg.id(), "delayed timer fired");
            Ok(value)
        }
        Err(payload) => {
            let err = TimerError::from_panic(payload);
            error!(timer = %reg.id(), %err, "delayed timer failed");
            Err(err)
        }
    }
}
