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

//! The crate `thread-js-set-interval` allows you to use `setInterval(callback, ms)` and
//! `setTimeout(callback, ms)` as in Javascript, backed by a background thread per timer.
//! The library provides the macros:
//! - `set_interval!(callback, ms)`,
//! - `set_timeout!(callback, ms)`,
//! - and, for code running inside a `tokio` runtime (<https://tokio.rs/>),
//!   `set_interval_async!(future_producer, ms)` and `set_timeout_async!(future, ms)`.
//!
//! ## Differences to Javascript
//! They behave similar to their Javascript counterparts, with a few exceptions:
//!
//!  * every timer runs on its own thread (or `tokio` task), callbacks of different
//!    timers run in parallel and must synchronize shared state themselves
//!  * callbacks must be `'static`, i.e. they own everything they touch. State that is
//!    shared with the rest of the program goes behind an `Arc`.
//!  * an interval invokes its callback right away and then after every period. Use
//!    [`TimerOptions::immediate`] to wait one period first, as Javascript does.
//!  * the macros return a `Result` with a handle instead of a bare number. The handle
//!    can cancel the timer, wait for it and tells you if the callback panicked.
//!    If you drop the handle, the timer keeps running and can still be cleared by its
//!    ID with [`clear_interval`] / [`clear_timeout`].
//!  * intervals with a period of 0 ms are rejected instead of spinning.
//!
//! ## Logging
//! Timers emit `tracing` events (start, cancellation, panics of callbacks). Install a
//! subscriber, e.g. from `tracing-subscriber`, to see them.

use std::future::Future;
use std::time::Duration;

mod error;
mod options;
mod registry;
pub mod task;
pub mod thread;

pub use error::TimerError;
pub use options::{TimerOptions, DEFAULT_MIN_PERIOD, DEFAULT_THREAD_NAME};
pub use registry::{active_timers, clear_interval, clear_timeout, TimerId};
pub use task::{DelayedTask, RepeatingTask};
pub use thread::{DelayedTimer, RepeatingTimer};

/// **INTERNAL** Use macro [`set_timeout`] instead!
///
/// Starts a [`DelayedTimer`] with a delay in milliseconds.
#[doc(hidden)]
pub fn _set_timeout_spawn<T, F>(f: F, ms: u64) -> Result<DelayedTimer<T>, TimerError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    DelayedTimer::start(f, Duration::from_millis(ms))
}

/// **INTERNAL** Use macro [`set_timeout_async`] instead!
///
/// Async version of [`_set_timeout_spawn`]. Instead of a closure, it consumes a future.
#[doc(hidden)]
pub fn _set_timeout_spawn_async<T, Fut>(f: Fut, ms: u64) -> Result<DelayedTask<T>, TimerError>
where
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    DelayedTask::spawn(f, Duration::from_millis(ms))
}

/// **INTERNAL** Use macro [`set_interval`] instead!
///
/// Starts a [`RepeatingTimer`] with a period in milliseconds.
#[doc(hidden)]
pub fn _set_interval_spawn<F>(f: F, ms: u64) -> Result<RepeatingTimer, TimerError>
where
    F: FnMut() + Send + 'static,
{
    RepeatingTimer::start(f, Duration::from_millis(ms))
}

/// **INTERNAL** Use macro [`set_interval_async`] instead!
///
/// Async version of [`_set_interval_spawn`].
#[doc(hidden)]
pub fn _set_interval_spawn_async<Func, Fut>(f: Func, ms: u64) -> Result<RepeatingTask, TimerError>
where
    Func: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    RepeatingTask::spawn(f, Duration::from_millis(ms))
}

/// Creates a timeout that behaves similar to `setTimeout(callback, ms)` in Javascript.
/// The callback runs once, on its own thread, after the specified time passed.
///
/// Returns a [`DelayedTimer`] (wrapped in a `Result`, spawning a thread can fail).
/// If the callback is a closure, the value it returns can be retrieved with
/// [`DelayedTimer::join`].
///
/// # Parameters
/// * `#1` expression, closure-expression, block or identifier (which points to a closure).
///        The code that represents the callback function. Closures always take
///        ownership of what they capture.
/// * `#2` time delay in milliseconds
///
/// # Example
/// ```rust
/// use thread_js_set_interval::set_timeout;
///
/// let timeout = set_timeout!(println!("hello1"), 0).unwrap();
/// println!("hello2");
/// // order of output should be
/// //  "hello2"
/// //  "hello1"
/// timeout.join().unwrap();
///
/// let answer = set_timeout!(|| 6 * 7, 10).unwrap();
/// assert_eq!(answer.join().unwrap(), 42);
/// ```
#[macro_export]
macro_rules! set_timeout {
    // match for identifier, i.e. a closure, that is behind a variable
    ($cb:ident, $ms:expr) => {
        $crate::_set_timeout_spawn($cb, $ms)
    };
    // match for direct closure expression
    (|| $cb:expr, $ms:expr) => {
        $crate::_set_timeout_spawn(move || $cb, $ms)
    };
    // match for direct move closure expression
    (move || $cb:expr, $ms:expr) => {
        $crate::_set_timeout_spawn(move || $cb, $ms)
    };
    // match for expr or block, like `set_timeout!(println!())`
    ($cb:expr, $ms:expr) => {
        $crate::_set_timeout_spawn(move || { $cb; }, $ms)
    };
}

/// Async version of [set_timeout]. Instead of a closure, this macro accepts a future.
/// It must be used inside a `tokio` runtime.
///
/// You can pass:
/// - an identifier that points a future
/// - an expression that returns a future
///
/// # Example
/// ```rust
/// use thread_js_set_interval::set_timeout_async;
///
/// async fn async_foo() -> u32 {
///     println!("hello1");
///     7
/// }
///
/// #[tokio::main]
/// async fn main() {
///     let future = async_foo();
///     let timeout = set_timeout_async!(future, 0).unwrap();
///     println!("hello2");
///     // order of output should be
///     //  "hello2"
///     //  "hello1"
///     assert_eq!(timeout.join().await.unwrap(), 7);
/// }
/// ```
#[macro_export]
macro_rules! set_timeout_async {
    ($future:expr, $ms:expr) => {
        $crate::_set_timeout_spawn_async($future, $ms)
    };
}

/// Creates an interval that behaves similar to `setInterval(callback, ms)` in Javascript.
/// The callback runs on its own thread, right away and then every `ms` milliseconds,
/// until the interval gets cancelled.
///
/// Returns a [`RepeatingTimer`] (wrapped in a `Result`: a period of 0 is rejected and
/// spawning a thread can fail). Similar to Javascript, you can use its ID to clear/stop
/// the interval with [`clear_interval`], or call [`RepeatingTimer::cancel`].
///
/// # Parameters
/// * `#1` expression, closure-expression, block or identifier (which points to a closure).
///        The code that represents the callback function. Closures always take
///        ownership of what they capture.
/// * `#2` period in milliseconds
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use thread_js_set_interval::{clear_interval, set_interval};
///
/// let interval = set_interval!(println!("hello1"), 50).unwrap();
/// println!("hello2");
/// // "hello1" should get printed 3 times (0, 50 and 100 ms)
/// std::thread::sleep(Duration::from_millis(120));
///
/// // equivalent to `interval.cancel()`
/// clear_interval(interval.id());
/// let count = interval.join().unwrap();
/// assert!(count >= 2);
/// ```
#[macro_export]
macro_rules! set_interval {
    // match for identifier, i.e. a closure, that is behind a variable
    ($cb:ident, $ms:expr) => {
        $crate::_set_interval_spawn($cb, $ms)
    };
    // match for direct closure expression
    (|| $cb:expr, $ms:expr) => {
        $crate::_set_interval_spawn(move || $cb, $ms)
    };
    // match for direct move closure expression
    (move || $cb:expr, $ms:expr) => {
        $crate::_set_interval_spawn(move || $cb, $ms)
    };
    // match for expr or block, like `set_interval!(println!())`
    ($cb:expr, $ms:expr) => {
        $crate::_set_interval_spawn(move || { $cb; }, $ms)
    };
}

/// Async version of [set_interval]. Instead of a closure, this macro accepts a non-async closure
/// that produces futures. It must be used inside a `tokio` runtime.
///
/// You can pass:
/// - an identifier that points to a function that returns a future
/// - a block that returns a future
/// - a closure that returns a future
///
/// # Example
/// ```rust
/// use tokio::time::Duration;
/// use thread_js_set_interval::set_interval_async;
///
/// async fn future_producer() {
///     println!("hello1")
/// }
///
/// #[tokio::main]
/// async fn main() {
///     let interval = set_interval_async!(future_producer, 50).unwrap();
///     println!("hello2");
///     // "hello1" should get printed 3 times (0, 50 and 100 ms)
///     tokio::time::sleep(Duration::from_millis(120)).await;
///     interval.cancel();
///     assert!(interval.join().await.unwrap() >= 2);
/// }
/// ```
#[macro_export]
macro_rules! set_interval_async {
    // match for identifier, i.e. a function that produces futures
    ($future_producer:ident, $ms:expr) => {
        $crate::_set_interval_spawn_async($future_producer, $ms)
    };
    // match for closure that produces futures
    (|| $cb:expr, $ms:expr) => {
        $crate::_set_interval_spawn_async(move || $cb, $ms)
    };
    // match for move closure that produces futures
    (move || $cb:expr, $ms:expr) => {
        $crate::_set_interval_spawn_async(move || $cb, $ms)
    };
    // match for block expression that produces futures
    ($cb:block, $ms:expr) => {
        $crate::_set_interval_spawn_async(move || $cb, $ms)
    };
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Arc;

    use super::*;

    // Compile-time tests: Macros accept the corresponding kind of parameters
    mod compile_time_tests {
        use super::*;

        #[test]
        fn test_set_timeout_macro_all_argument_variants_builds() {
            // macro takes expression
            let _ = set_timeout!(println!("hello1"), 4);
            // macro takes block
            let _ = set_timeout!({ println!("hello2") }, 3);
            // macro takes direct closure expressions
            let _ = set_timeout!(|| println!("hello3"), 2);
            // macro takes direct move closure expressions
            let _ = set_timeout!(move || println!("hello4"), 2);
            // macro takes identifiers (which must point to closures)
            let closure = || println!("hello5");
            let _ = set_timeout!(closure, 1);

            // now with the delay as identifier

            let delay = 42;

            let _ = set_timeout!(println!("hello1"), delay);
            let _ = set_timeout!({ println!("hello2") }, delay);
            let _ = set_timeout!(|| println!("hello3"), delay);
            let _ = set_timeout!(move || println!("hello4"), delay);
            let closure = || println!("hello5");
            let _ = set_timeout!(closure, delay);

            // and as expression
            let _ = set_timeout!(println!("hello6"), delay / 2);
        }

        #[tokio::test]
        async fn test_set_timeout_async_macro_all_argument_variants_builds() {
            async fn async_foo() {
                println!("hello1");
            }

            let future = async_foo();
            // macro takes future by identifier
            let _ = set_timeout_async!(future, 1);
            // macro takes an expression that returns a future
            let _ = set_timeout_async!(async_foo(), 1);
            // macro takes block
            let _ = set_timeout_async!(async { println!("hello2") }, 1);

            // now with the delay as identifier

            let delay = 42;

            let future = async_foo();
            let _ = set_timeout_async!(future, delay);
            let _ = set_timeout_async!(async_foo(), delay);
            let _ = set_timeout_async!(async { println!("hello2") }, delay);
        }

        #[test]
        fn test_set_interval_macro_all_argument_variants_builds() {
            let mut intervals = Vec::new();
            // macro takes expression
            intervals.push(set_interval!(println!("hello1"), 42).unwrap());
            // macro takes block
            intervals.push(set_interval!({ println!("hello2") }, 42).unwrap());
            // macro takes direct closure expressions
            intervals.push(set_interval!(|| println!("hello3"), 42).unwrap());
            // macro takes direct move closure expressions
            intervals.push(set_interval!(move || println!("hello4"), 42).unwrap());
            // macro takes identifiers (which must point to closures)
            let closure = || println!("hello5");
            intervals.push(set_interval!(closure, 42).unwrap());

            // now with the period as identifier

            let period = 42;

            intervals.push(set_interval!(println!("hello1"), period).unwrap());
            intervals.push(set_interval!({ println!("hello2") }, period).unwrap());
            intervals.push(set_interval!(|| println!("hello3"), period).unwrap());
            intervals.push(set_interval!(move || println!("hello4"), period).unwrap());
            let closure = || println!("hello5");
            intervals.push(set_interval!(closure, period).unwrap());

            // don't leave intervals behind that print forever
            for interval in intervals {
                interval.cancel();
                interval.join().unwrap();
            }
        }

        #[tokio::test]
        async fn test_set_interval_async_macro_all_argument_variants_builds() {
            async fn async_foo() {
                println!("hello1");
            }

            let mut intervals = Vec::new();
            // macro takes identifier (that must point to a future-producing function)
            intervals.push(set_interval_async!(async_foo, 42).unwrap());
            // macro takes block with async inner block
            intervals.push(
                set_interval_async!(
                    {
                        async {
                            println!("hello2");
                        }
                    },
                    42
                )
                .unwrap(),
            );
            // macro takes a closure that produces a future
            intervals.push(
                set_interval_async!(
                    || {
                        async {
                            println!("hello3");
                        }
                    },
                    42
                )
                .unwrap(),
            );
            // macro takes a move closure that produces a future
            intervals.push(
                set_interval_async!(
                    move || {
                        async move {
                            println!("hello4");
                        }
                    },
                    42
                )
                .unwrap(),
            );

            // now with the period as identifier

            let period = 42;
            intervals.push(set_interval_async!(async_foo, period).unwrap());

            for interval in intervals {
                interval.cancel();
                interval.join().await.unwrap();
            }
        }
    }

    /// Test can't been automated because the test is correct
    /// if stdout is correct. Its just a visual test which can
    /// be executed manually.
    /// Output should be
    /// ```text
    /// hello1
    /// hello3
    /// hello5
    /// hello2
    /// hello4
    /// ```
    #[test]
    fn test_set_timeout_visual() {
        println!("hello1");
        let first = set_timeout!(println!("hello2"), 10).unwrap();
        println!("hello3");
        let second = set_timeout!(println!("hello4"), 20).unwrap();
        println!("hello5");

        first.join().unwrap();
        second.join().unwrap();
    }

    #[test]
    fn test_set_timeout() {
        let counter = Arc::new(AtomicU64::new(0));
        let mut timeouts = Vec::new();
        for _ in 0..2 {
            let counter = counter.clone();
            timeouts.push(
                set_timeout!(
                    move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    },
                    50
                )
                .unwrap(),
            );
        }

        std::thread::sleep(Duration::from_millis(110));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        for timeout in timeouts {
            assert!(timeout.is_finished());
        }
    }

    #[test]
    fn test_set_timeout_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let timeout = {
            let flag = flag.clone();
            set_timeout!(flag.store(true, Ordering::SeqCst), 100).unwrap()
        };

        std::thread::sleep(Duration::from_millis(50));
        assert!(!flag.load(Ordering::SeqCst));
        std::thread::sleep(Duration::from_millis(100));
        assert!(flag.load(Ordering::SeqCst));
        timeout.join().unwrap();
    }

    #[tokio::test]
    async fn test_set_timeout_async() {
        let counter = Arc::new(AtomicU64::new(0));
        let counter_closure = counter.clone();
        let future_producer = move || {
            let counter_inner = counter_closure.clone();
            async move {
                counter_inner.fetch_add(1, Ordering::SeqCst);
            }
        };

        let first = set_timeout_async!(future_producer(), 50).unwrap();
        let second = set_timeout_async!(future_producer(), 50).unwrap();

        tokio::time::sleep(Duration::from_millis(110)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        first.join().await.unwrap();
        second.join().await.unwrap();
    }

    #[test]
    fn test_set_interval() {
        let counter = Arc::new(AtomicU64::new(0));
        let interval = {
            let counter = counter.clone();
            set_interval!(
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                },
                50
            )
            .unwrap()
        };

        // immediate first invocation, then every 50ms
        std::thread::sleep(Duration::from_millis(260));
        let count = counter.load(Ordering::SeqCst);
        assert!((4..=6).contains(&count), "count was {count}");
        interval.cancel();
        interval.join().unwrap();
    }

    #[tokio::test]
    async fn test_set_interval_async() {
        let counter = Arc::new(AtomicU64::new(0));
        let interval = {
            let counter_closure = counter.clone();
            let future_producer = move || {
                let counter_inner = counter_closure.clone();
                async move {
                    counter_inner.fetch_add(1, Ordering::SeqCst);
                }
            };
            set_interval_async!(future_producer, 50).unwrap()
        };

        tokio::time::sleep(Duration::from_millis(260)).await;
        let count = counter.load(Ordering::SeqCst);
        assert!((4..=6).contains(&count), "count was {count}");
        interval.cancel();
        interval.join().await.unwrap();
    }

    #[test]
    fn test_clear_interval() {
        let counter = Arc::new(AtomicU64::new(0));
        let interval_id = {
            let counter = counter.clone();
            set_interval!(
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                },
                50
            )
            .unwrap()
            .detach()
        };

        std::thread::sleep(Duration::from_millis(130));
        assert!(clear_interval(interval_id));
        // a callback that runs right now may still complete
        let count = counter.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(200));
        assert!(counter.load(Ordering::SeqCst) <= count + 1);
        assert!(count >= 2, "count was {count}");
    }

    #[test]
    fn test_set_interval_zero_period() {
        assert!(matches!(
            set_interval!(println!("spin"), 0),
            Err(TimerError::PeriodTooShort { .. })
        ));
    }
}
