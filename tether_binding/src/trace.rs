// Copyright 2025 the Tether Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Diagnostics sink.
//!
//! Runtime value-path failures (a failed expression, a rejected property
//! write) are recovered locally and reported here instead of propagating.
//! The sink is injected; [`NoopTrace`] is the default and discards
//! everything, and swapping sinks must never change engine behavior.
//! [`BufferTrace`] records events for inspection, which is mostly useful in
//! tests and tooling.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// How serious a reported event is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Informational.
    Info,
    /// A failure that was recovered from.
    Error,
}

/// A sink for engine diagnostics.
pub trait TraceSink {
    /// Records one event. `category` groups related events (the binding
    /// engine reports under `"binding"`).
    fn record(&mut self, severity: Severity, category: &str, message: &str);
}

/// A sink that discards everything.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopTrace;

impl TraceSink for NoopTrace {
    fn record(&mut self, _severity: Severity, _category: &str, _message: &str) {}
}

/// One event recorded by a [`BufferTrace`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceEvent {
    /// The event's severity.
    pub severity: Severity,
    /// The event's category.
    pub category: String,
    /// The reported message.
    pub message: String,
}

/// A sink that keeps every event in memory.
#[derive(Clone, Debug, Default)]
pub struct BufferTrace {
    events: Vec<TraceEvent>,
}

impl BufferTrace {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Drops all recorded events.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl TraceSink for BufferTrace {
    fn record(&mut self, severity: Severity, category: &str, message: &str) {
        self.events.push(TraceEvent {
            severity,
            category: String::from(category),
            message: String::from(message),
        });
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Info => "info",
            Severity::Error => "error",
        };
        write!(f, "[{severity}] {}: {}", self.category, self.message)
    }
}
