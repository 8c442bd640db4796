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

//! Finished span handlers.
use crate::{MutableSpan, TraceContext};

/// A hook invoked once for every span that finishes in a tracer.
///
/// Handlers run synchronously on the finishing thread, in the order they
/// were registered, before the span is handed to the reporter. They are the
/// place to redact tags, aggregate metrics, or drop spans entirely.
pub trait SpanHandler {
    /// Handles a finished span.
    ///
    /// The span may be mutated in place. Returning `false` vetoes the span:
    /// later handlers do not run and nothing is reported.
    fn handle(&self, context: &TraceContext, span: &mut MutableSpan) -> bool;

    /// When `true`, spans in this tracer are recorded and passed through the
    /// handler chain even when they are not sampled for the remote
    /// collector.
    ///
    /// Defaults to `false`.
    fn always_sample_local(&self) -> bool {
        false
    }
}
