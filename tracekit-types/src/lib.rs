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

//! Type definitions for tracekit distributed trace information.
//!
//! A [`Span`] is the finalized record of one unit of work, the value handed
//! to a reporter once the work completes. Records are plain data: timestamps
//! and durations are microsecond integers, identifiers are the [`TraceId`]
//! and [`SpanId`] value types, and the network context of either side of an
//! operation is an [`Endpoint`].
//!
//! # Serialization
//!
//! With the `serde` Cargo feature enabled, every type here serializes in the
//! standard Zipkin v2 wire shape: camelCase keys, identifiers as lower-case
//! hex strings, and absent or default-valued fields omitted entirely.
#![doc(html_root_url = "https://docs.rs/tracekit-types/0.1")]
#![warn(missing_docs)]

#[doc(inline)]
pub use crate::annotation::Annotation;
#[doc(inline)]
pub use crate::endpoint::Endpoint;
#[doc(inline)]
pub use crate::span::{Kind, Span};
#[doc(inline)]
pub use crate::span_id::SpanId;
#[doc(inline)]
pub use crate::trace_id::TraceId;

pub mod annotation;
pub mod endpoint;
pub mod span;
pub mod span_id;
pub mod trace_id;
