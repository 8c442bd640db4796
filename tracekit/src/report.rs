//  Copyright 2017 Palantir Technologies, Inc.
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

//! Span reporters.
use log::info;
use std::fmt;
use tracekit_types::Span;

/// A reporter consumes finished spans and ships them somewhere.
///
/// For example, the reporter may log the span information to a file, or send
/// it over the network to a collection service. The tracer tolerates
/// reporter failures: a panic from `report` is caught and never surfaces to
/// the code finishing the span.
pub trait Report: fmt::Display {
    /// Reports a span.
    fn report(&self, span: Span);

    /// Determines if this reporter discards everything.
    ///
    /// The tracer skips the wire-model conversion entirely for such
    /// reporters.
    fn is_noop(&self) -> bool {
        false
    }
}

/// A `Report`er which does nothing.
pub struct NopReporter;

impl Report for NopReporter {
    fn report(&self, _: Span) {}

    fn is_noop(&self) -> bool {
        true
    }
}

impl fmt::Display for NopReporter {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str("NopReporter")
    }
}

/// A `Report`er which logs the `Span` at the `info` level.
///
/// The `Span` is simply logged in its `Debug` representation which is not
/// stable, so this reporter is only useful for testing. It is the default
/// when no reporter is configured.
pub struct LoggingReporter;

impl Report for LoggingReporter {
    fn report(&self, span: Span) {
        info!("{:?}", span);
    }
}

impl fmt::Display for LoggingReporter {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str("LoggingReporter{name=tracekit::tracer::Tracer}")
    }
}
