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

//! Errors reported by timers and their handles.

use std::any::Any;
use std::time::Duration;
use thiserror::Error;

/// Everything that can go wrong when starting or waiting for a timer.
#[derive(Debug, Error)]
pub enum TimerError {
    /// The requested period is zero or shorter than the configured minimum.
    /// A repeating timer with such a period would spin without throttling.
    #[error("period of {period:?} is shorter than the minimum of {minimum:?}")]
    PeriodTooShort { period: Duration, minimum: Duration },

    /// The operating system refused to create the timer thread.
    #[error("failed to spawn timer thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// An async timer was started outside of a `tokio` runtime.
    #[error("no tokio runtime is running on this thread")]
    NoRuntime,

    /// The delayed timer was cancelled before it fired.
    #[error("timer was cancelled before it fired")]
    Cancelled,

    /// The callback panicked. Holds the panic message, if it had one.
    #[error("timer callback panicked: {0}")]
    Panicked(String),
}

impl TimerError {
    /// Builds a [`TimerError::Panicked`] from the payload of a caught panic.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "<non-string panic payload>".to_string()
        };
        Self::Panicked(msg)
    }
}
