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

//! Extracted contexts.
//!
//! Wire-format codecs live outside this crate. They deliver whatever trace
//! identity they could pull off an incoming request as an
//! [`ExtractedContext`], which the tracer resolves into a full
//! [`TraceContext`] via [`Tracer::next_span_from`](crate::Tracer::next_span_from).
use crate::trace_context::Extra;
use crate::{SamplingFlags, TraceContext, TraceId};

/// A trace ID with sampling flags, but no span ID.
///
/// Some propagation formats only carry the trace ID of the caller.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TraceIdContext {
    trace_id: TraceId,
    flags: SamplingFlags,
}

impl TraceIdContext {
    /// Creates a new `TraceIdContext`.
    pub fn new(trace_id: TraceId, flags: SamplingFlags) -> TraceIdContext {
        TraceIdContext { trace_id, flags }
    }

    /// Returns the ID of the trace associated with this context.
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// Returns the sampling flags associated with this context.
    pub fn sampling_flags(&self) -> SamplingFlags {
        self.flags
    }
}

/// The trace identity pulled off an incoming request.
///
/// Exactly one variant is populated, depending on how much identity the
/// upstream peer supplied.
#[derive(Clone)]
pub enum Extracted {
    /// Only sampling flags were present, possibly none at all.
    Flags(SamplingFlags),
    /// A trace ID was present, but no span ID.
    TraceId(TraceIdContext),
    /// A complete trace context was present.
    Context(TraceContext),
}

/// The result of extracting trace identity from an incoming request,
/// along with any state bundles the codec attached.
#[derive(Clone)]
pub struct ExtractedContext {
    value: Extracted,
    extra: Vec<Extra>,
}

impl ExtractedContext {
    /// Creates an extraction carrying sampling flags only.
    pub fn flags(flags: SamplingFlags) -> ExtractedContext {
        ExtractedContext {
            value: Extracted::Flags(flags),
            extra: vec![],
        }
    }

    /// Creates an extraction carrying no identity at all.
    pub fn empty() -> ExtractedContext {
        ExtractedContext::flags(SamplingFlags::default())
    }

    /// Creates an extraction carrying a trace ID without a span ID.
    pub fn trace_id(context: TraceIdContext) -> ExtractedContext {
        ExtractedContext {
            value: Extracted::TraceId(context),
            extra: vec![],
        }
    }

    /// Creates an extraction carrying a complete trace context.
    pub fn context(context: TraceContext) -> ExtractedContext {
        ExtractedContext {
            value: Extracted::Context(context),
            extra: vec![],
        }
    }

    /// Appends a state bundle recovered by the codec.
    pub fn with_extra(mut self, extra: Extra) -> ExtractedContext {
        self.extra.push(extra);
        self
    }

    /// Returns the extracted identity.
    pub fn value(&self) -> &Extracted {
        &self.value
    }

    /// Returns the sampling flags of whichever variant was extracted.
    pub fn sampling_flags(&self) -> SamplingFlags {
        match &self.value {
            Extracted::Flags(flags) => *flags,
            Extracted::TraceId(context) => context.sampling_flags(),
            Extracted::Context(context) => context.sampling_flags(),
        }
    }

    /// Returns the state bundles attached to this extraction.
    pub fn extra(&self) -> &[Extra] {
        &self.extra
    }

    pub(crate) fn into_parts(self) -> (Extracted, Vec<Extra>) {
        (self.value, self.extra)
    }
}
