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

//! Timers that run as tasks on a `tokio` runtime instead of a dedicated thread.
//!
//! The contract is the same as for the thread backed timers in [`crate::thread`],
//! but callbacks are futures. Tasks only make progress while the runtime they
//! were spawned on lives.

use crate::error::TimerError;
use crate::options::TimerOptions;
use crate::registry::{self, CancelToken, Registration, TimerId};
use futures_util::FutureExt;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error};

/// Periods and delays are capped to this, so deadlines can't overflow `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

fn current_runtime() -> Result<Handle, TimerError> {
    Handle::try_current().map_err(|_| TimerError::NoRuntime)
}

/// Maps the failure of a timer task. Panics of callbacks are caught inside the
/// task, so this is usually the runtime shutting down before the task completed.
fn join_error(err: JoinError) -> TimerError {
    match err.try_into_panic() {
        Ok(payload) => TimerError::from_panic(payload),
        Err(_) => TimerError::Cancelled,
    }
}

/// Async version of [`crate::RepeatingTimer`]. Instead of a closure, it is driven
/// by a non-async closure that produces futures, one per tick.
#[must_use = "dropping the handle detaches the timer, it keeps running"]
pub struct RepeatingTask {
    id: TimerId,
    token: Arc<CancelToken>,
    invocations: Arc<AtomicU64>,
    task: JoinHandle<Result<u64, TimerError>>,
}

impl RepeatingTask {
    /// Spawns the interval on the current `tokio` runtime.
    pub fn spawn<Func, Fut>(producer: Func, period: Duration) -> Result<Self, TimerError>
    where
        Func: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::spawn_with(&TimerOptions::default(), producer, period)
    }

    /// Like [`RepeatingTask::spawn`], honouring the period related options.
    /// Thread options like the name don't apply to tasks.
    pub fn spawn_with<Func, Fut>(
        opts: &TimerOptions,
        producer: Func,
        period: Duration,
    ) -> Result<Self, TimerError>
    where
        Func: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        opts.check_period(period)?;
        let runtime = current_runtime()?;

        let reg = registry::register();
        let id = reg.id();
        let token = reg.token().clone();
        let invocations = Arc::new(AtomicU64::new(0));
        let task = runtime.spawn(run_repeating(
            reg,
            producer,
            period,
            opts.is_immediate(),
            invocations.clone(),
        ));
        debug!(timer = %id, ?period, "spawned repeating task");

        Ok(Self {
            id,
            token,
            invocations,
            task,
        })
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Stops the interval. A future that is currently awaited completes, but no
    /// further tick is processed.
    pub fn cancel(&self) -> bool {
        self.token.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Waits for the task to end and returns the number of completed
    /// invocations, or the panic of the callback. Cancel the task first, an
    /// interval doesn't end on its own.
    pub async fn join(self) -> Result<u64, TimerError> {
        self.task.await.map_err(join_error)?
    }

    pub fn detach(self) -> TimerId {
        self.id
    }
}

impl fmt::Debug for RepeatingTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepeatingTask")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .field("finished", &self.is_finished())
            .field("invocations", &self.invocations())
            .finish()
    }
}

async fn run_repeating<Func, Fut>(
    reg: Registration,
    mut producer: Func,
    period: Duration,
    immediate: bool,
    invocations: Arc<AtomicU64>,
) -> Result<u64, TimerError>
where
    Func: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let token = reg.token();
    let period = period.min(FAR_FUTURE);

    // the first tick of a tokio interval completes immediately
    let start = if immediate {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut int = tokio::time::interval_at(start, period);
    int.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = int.tick() => {}
        }

        // creating the future may panic as well as polling it
        let tick = AssertUnwindSafe(async { producer().await });
        if let Err(payload) = tick.catch_unwind().await {
            let err = TimerError::from_panic(payload);
            error!(timer = %reg.id(), %err, "repeating task stopped");
            return Err(err);
        }
        invocations.fetch_add(1, Ordering::SeqCst);
    }

    let total = invocations.load(Ordering::SeqCst);
    debug!(timer = %reg.id(), invocations = total, "repeating task cancelled");
    Ok(total)
}

/// Async version of [`crate::DelayedTimer`]. Awaits a future once after a delay.
#[must_use = "dropping the handle detaches the timer, it still fires"]
pub struct DelayedTask<T> {
    id: TimerId,
    token: Arc<CancelToken>,
    task: JoinHandle<Result<T, TimerError>>,
}

impl<T: Send + 'static> DelayedTask<T> {
    /// Spawns the timeout on the current `tokio` runtime. The future is not
    /// polled before the delay elapsed.
    pub fn spawn<Fut>(future: Fut, delay: Duration) -> Result<Self, TimerError>
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        let runtime = current_runtime()?;

        let reg = registry::register();
        let id = reg.id();
        let token = reg.token().clone();
        let task = runtime.spawn(run_delayed(reg, future, delay));
        debug!(timer = %id, ?delay, "spawned delayed task");

        Ok(Self { id, token, task })
    }
}

impl<T> DelayedTask<T> {
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Prevents the future from being awaited. Returns `false` if it already
    /// started.
    pub fn cancel(&self) -> bool {
        self.token.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the output of the future.
    pub async fn join(self) -> Result<T, TimerError> {
        self.task.await.map_err(join_error)?
    }

    pub fn detach(self) -> TimerId {
        self.id
    }
}

impl<T> fmt::Debug for DelayedTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelayedTask")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .field("finished", &self.is_finished())
            .finish()
    }
}

async fn run_delayed<Fut, T>(reg: Registration, future: Fut, delay: Duration) -> Result<T, TimerError>
where
    Fut: Future<Output = T>,
{
    let token = reg.token();
    tokio::select! {
        biased;
        () = token.cancelled() => {}
        () = tokio::time::sleep(delay.min(FAR_FUTURE)) => {}
    }
    if !token.commit() {
        debug!(timer = %reg.id(), "delayed task cancelled before firing");
        return Err(TimerError::Cancelled);
    }

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(value) => {
            debug!(timer = %reg.id(), "delayed task fired");
            Ok(value)
        }
        Err(payload) => {
            let err = TimerError::from_panic(payload);
            error!(timer = %reg.id(), %err, "delayed task failed");
            Err(err)
        }
    }
}
