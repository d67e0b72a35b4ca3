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

//! Configuration of thread backed timers.

use crate::error::TimerError;
use crate::thread::{DelayedTimer, RepeatingTimer};
use std::time::Duration;

/// Default prefix of timer thread names.
pub const DEFAULT_THREAD_NAME: &str = "js-timer";

/// Default lower bound for the period of repeating timers.
pub const DEFAULT_MIN_PERIOD: Duration = Duration::from_millis(1);

/// Builder style options for starting timers, similar to [`std::thread::Builder`].
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use thread_js_set_interval::TimerOptions;
///
/// let timer = TimerOptions::new()
///     .name("heartbeat")
///     .immediate(false)
///     .interval(|| println!("beat"), Duration::from_millis(20))
///     .unwrap();
/// std::thread::sleep(Duration::from_millis(50));
/// timer.cancel();
/// assert!(timer.join().unwrap() >= 1);
/// ```
#[derive(Debug, Clone)]
pub struct TimerOptions {
    name: String,
    stack_size: Option<usize>,
    min_period: Duration,
    immediate: bool,
}

impl Default for TimerOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_THREAD_NAME.to_string(),
            stack_size: None,
            min_period: DEFAULT_MIN_PERIOD,
            immediate: true,
        }
    }
}

impl TimerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix of the timer thread name. Threads are named `"{prefix}-{id}"`.
    pub fn name(mut self, prefix: impl Into<String>) -> Self {
        self.name = prefix.into();
        self
    }

    /// Stack size of the timer thread in bytes. Uses the platform default if unset.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Smallest period a repeating timer accepts. A zero period is rejected
    /// regardless of this value.
    pub fn min_period(mut self, min_period: Duration) -> Self {
        self.min_period = min_period;
        self
    }

    /// Whether a repeating timer invokes its callback right after it was started
    /// (`true`, the default) or only after the first period elapsed, like
    /// `setInterval` in Javascript (`false`).
    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    pub fn is_immediate(&self) -> bool {
        self.immediate
    }

    /// Starts a [`RepeatingTimer`] with these options.
    pub fn interval<F>(&self, f: F, period: Duration) -> Result<RepeatingTimer, TimerError>
    where
        F: FnMut() + Send + 'static,
    {
        RepeatingTimer::start_with(self, f, period)
    }

    /// Starts a [`DelayedTimer`] with these options.
    pub fn timeout<F, T>(&self, f: F, delay: Duration) -> Result<DelayedTimer<T>, TimerError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        DelayedTimer::start_with(self, f, delay)
    }

    /// Rejects periods that would make a repeating timer spin.
    pub(crate) fn check_period(&self, period: Duration) -> Result<(), TimerError> {
        if period.is_zero() || period < self.min_period {
            return Err(TimerError::PeriodTooShort {
                period,
                minimum: self.min_period.max(Duration::from_nanos(1)),
            });
        }
        Ok(())
    }

    pub(crate) fn thread_builder(&self, id: impl std::fmt::Display) -> std::thread::Builder {
        let builder = std::thread::Builder::new().name(format!("{}-{}", self.name, id));
        match self.stack_size {
            Some(size) => builder.stack_size(size),
            None => builder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = TimerOptions::default();
        assert_eq!(opts.name, DEFAULT_THREAD_NAME);
        assert_eq!(opts.stack_size, None);
        assert_eq!(opts.min_period, DEFAULT_MIN_PERIOD);
        assert!(opts.is_immediate());
    }

    #[test]
    fn test_check_period() {
        let opts = TimerOptions::new().min_period(Duration::from_millis(10));
        assert!(opts.check_period(Duration::from_millis(10)).is_ok());
        assert!(matches!(
            opts.check_period(Duration::from_millis(9)),
            Err(TimerError::PeriodTooShort { minimum, .. }) if minimum == Duration::from_millis(10)
        ));
    }

    #[test]
    fn test_zero_period_rejected_even_without_minimum() {
        let opts = TimerOptions::new().min_period(Duration::ZERO);
        assert!(opts.check_period(Duration::ZERO).is_err());
        assert!(opts.check_period(Duration::from_nanos(1)).is_ok());
    }

    #[test]
    fn test_thread_is_named_after_prefix_and_id() {
        let opts = TimerOptions::new().name("poller");
        let name = opts
            .thread_builder(3)
            .spawn(|| std::thread::current().name().map(str::to_string))
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(name.as_deref(), Some("poller-3"));
    }
}
