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

//! Tracekit is a library for collecting timing information about
//! computations in distributed systems. Each unit of work is recorded as a
//! span; spans reference their parents, forming a trace of the full
//! computation as it hops between services.
//!
//! The [`Tracer`] is the hub: it manufactures spans, reconciles trace
//! identity received from upstream peers with local sampling decisions,
//! tracks which span the executing code is working in, and routes finished
//! spans through a handler chain to a [`Report`]er.
//!
//! Wire-format codecs and span transports live outside this crate. Codecs
//! produce [`ExtractedContext`]s and plug in through the [`Propagate`]
//! trait; transports implement [`Report`].
//!
//! # Examples
//!
//! ```
//! use tracekit::{Tracer, Kind};
//!
//! let tracer = Tracer::builder()
//!     .local_service_name("frontend")
//!     .build();
//!
//! let mut span = tracer.new_trace().with_name("get /users").with_kind(Kind::Server);
//! span.start();
//! {
//!     let _guard = tracer.with_span_in_scope(Some(&span));
//!     // work parented to the span happens here
//!     let child = tracer.next_span().with_name("lookup");
//!     child.finish();
//! }
//! span.finish();
//! ```
#![doc(html_root_url = "https://docs.rs/tracekit/0.1")]
#![warn(missing_docs)]

#[doc(inline)]
pub use tracekit_types::{Annotation, Endpoint, Kind, SpanId, TraceId};

/// The wire model for finished spans.
pub use tracekit_types as types;

#[doc(inline)]
pub use crate::clock::{Clock, SystemClock};
#[doc(inline)]
pub use crate::current::{Bind, CurrentContext, Scope, ThreadLocalCurrent};
#[doc(inline)]
pub use crate::extract::{Extracted, ExtractedContext, TraceIdContext};
#[doc(inline)]
pub use crate::handler::SpanHandler;
#[doc(inline)]
pub use crate::propagation::{ExtraFieldPropagation, ExtraFields, NopPropagation, Propagate};
#[doc(inline)]
pub use crate::recorder::MutableSpan;
#[doc(inline)]
pub use crate::report::{LoggingReporter, NopReporter, Report};
#[doc(inline)]
pub use crate::sample::{AlwaysSampler, NeverSampler, ProbabilitySampler, Sample};
#[doc(inline)]
pub use crate::sampling_flags::SamplingFlags;
#[doc(inline)]
pub use crate::scoped_span::ScopedSpan;
#[doc(inline)]
pub use crate::span::{Span, SpanCustomizer, SpanInScope};
#[doc(inline)]
pub use crate::trace_context::{Extra, InvalidContext, TraceContext};
#[doc(inline)]
pub use crate::tracer::{close_tracer, set_tracer, tracer, SetTracerError, Tracer};

pub mod clock;
pub mod current;
pub mod extract;
pub mod handler;
pub mod propagation;
pub mod recorder;
pub mod report;
pub mod sample;
pub mod sampling_flags;
pub mod scoped_span;
pub mod span;
pub mod trace_context;
pub mod tracer;

#[cfg(test)]
mod test;
