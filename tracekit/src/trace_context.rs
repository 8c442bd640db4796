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

//! Trace contexts.
use crate::sampling_flags;
use crate::{SamplingFlags, SpanId, TraceId};
use std::any::Any;
use std::error::Error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// An opaque state bundle attached to a context by a propagation plugin.
///
/// Entries are shared by reference between a context and its descendants, so
/// state written through one context is visible through all of them.
pub type Extra = Arc<dyn Any + Send + Sync>;

/// A `TraceContext` represents a distributed trace request.
///
/// It consists of a trace ID, the ID of the parent span, the ID of the
/// context's span, flags dealing with the sampling of the span, and state
/// attached by propagation plugins.
///
/// The trace context is sent to remote services on requests. For example,
/// it is included in a standard set of headers in HTTP requests.
///
/// Contexts compare equal on their identifiers (trace ID, span ID, and the
/// `shared` flag) only.
#[derive(Clone)]
pub struct TraceContext {
    trace_id: TraceId,
    parent_id: Option<SpanId>,
    span_id: SpanId,
    flags: SamplingFlags,
    sampled_local: bool,
    shared: bool,
    local_root_id: Option<SpanId>,
    extra: Vec<Extra>,
}

impl fmt::Debug for TraceContext {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("TraceContext")
            .field("trace_id", &self.trace_id)
            .field("parent_id", &self.parent_id)
            .field("span_id", &self.span_id)
            .field("flags", &self.flags)
            .field("sampled_local", &self.sampled_local)
            .field("shared", &self.shared)
            .field("local_root_id", &self.local_root_id)
            .field("extra", &self.extra.len())
            .finish()
    }
}

impl fmt::Display for TraceContext {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}/{}", self.trace_id, self.span_id)
    }
}

impl PartialEq for TraceContext {
    fn eq(&self, other: &TraceContext) -> bool {
        self.trace_id == other.trace_id
            && self.span_id == other.span_id
            && self.shared == other.shared
    }
}

impl Eq for TraceContext {}

impl Hash for TraceContext {
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        self.trace_id.hash(state);
        self.span_id.hash(state);
        self.shared.hash(state);
    }
}

impl TraceContext {
    /// Returns a builder used to construct a `TraceContext`.
    pub fn builder() -> Builder {
        Builder {
            trace_id: None,
            parent_id: None,
            span_id: None,
            flags: SamplingFlags::builder(),
            sampled_local: false,
            shared: false,
            local_root_id: None,
            extra: vec![],
        }
    }

    /// Returns the ID of the trace associated with this context.
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// Returns the ID of the parent of the span associated with this context.
    pub fn parent_id(&self) -> Option<SpanId> {
        self.parent_id
    }

    /// Returns the ID of the span associated with this context.
    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    /// Returns the sampling flags associated with this context.
    pub fn sampling_flags(&self) -> SamplingFlags {
        self.flags
    }

    /// Determines if sampling has been requested for this context.
    ///
    /// A value of `None` indicates that the service working in the context is
    /// responsible for determining if it should be sampled.
    pub fn sampled(&self) -> Option<bool> {
        self.flags.sampled()
    }

    /// Determines if this context is in debug mode.
    ///
    /// Debug contexts are always sampled, regardless of the value of
    /// `sampled()`.
    pub fn debug(&self) -> bool {
        self.flags.debug()
    }

    /// Determines if spans in this context are recorded locally even when
    /// they are not sampled for the remote collector.
    pub fn sampled_local(&self) -> bool {
        self.sampled_local
    }

    /// Determines if the span ID of this context was supplied by an upstream
    /// peer rather than generated locally.
    ///
    /// A shared span produces a server-side record pairing with the upstream
    /// client-side record under the same ID.
    pub fn shared(&self) -> bool {
        self.shared
    }

    /// Returns the ID of the topmost span created in this process within the
    /// causal chain of this context.
    ///
    /// `None` means the context has not yet traversed a tracer in this
    /// process.
    pub fn local_root_id(&self) -> Option<SpanId> {
        self.local_root_id
    }

    /// Returns the state bundles attached to this context by propagation
    /// plugins.
    pub fn extra(&self) -> &[Extra] {
        &self.extra
    }

    /// Searches the attached state bundles for one of the requested type.
    pub fn find_extra<T>(&self) -> Option<&T>
    where
        T: Any + Send + Sync,
    {
        self.extra.iter().find_map(|e| e.downcast_ref::<T>())
    }

    /// Returns a copy of this context with an additional state bundle
    /// appended.
    pub fn with_extra(mut self, extra: Extra) -> TraceContext {
        self.extra.push(extra);
        self
    }
}

/// Merges two lists of state bundles.
///
/// The left list's order is preserved, and entries appearing only in the
/// right list are appended. Entries are deduplicated by reference identity.
pub(crate) fn merge_extra(left: &[Extra], right: &[Extra]) -> Vec<Extra> {
    let mut merged = left.to_vec();
    for entry in right {
        if !merged.iter().any(|e| Arc::ptr_eq(e, entry)) {
            merged.push(entry.clone());
        }
    }
    merged
}

/// A builder type for `TraceContext`s.
pub struct Builder {
    trace_id: Option<TraceId>,
    parent_id: Option<SpanId>,
    span_id: Option<SpanId>,
    flags: sampling_flags::Builder,
    sampled_local: bool,
    shared: bool,
    local_root_id: Option<SpanId>,
    extra: Vec<Extra>,
}

impl From<TraceContext> for Builder {
    fn from(c: TraceContext) -> Builder {
        Builder {
            trace_id: Some(c.trace_id),
            parent_id: c.parent_id,
            span_id: Some(c.span_id),
            flags: c.flags.into(),
            sampled_local: c.sampled_local,
            shared: c.shared,
            local_root_id: c.local_root_id,
            extra: c.extra,
        }
    }
}

impl Builder {
    /// Sets the trace ID of this context.
    pub fn trace_id(&mut self, trace_id: TraceId) -> &mut Builder {
        self.trace_id = Some(trace_id);
        self
    }

    /// Sets the ID of the parent span of this context.
    ///
    /// Defaults to `None`.
    pub fn parent_id(&mut self, parent_id: SpanId) -> &mut Builder {
        self.parent_id = Some(parent_id);
        self
    }

    /// Sets the ID of the span of this context.
    pub fn span_id(&mut self, span_id: SpanId) -> &mut Builder {
        self.span_id = Some(span_id);
        self
    }

    /// Sets the sampling flags for this context.
    pub fn sampling_flags(&mut self, flags: SamplingFlags) -> &mut Builder {
        self.flags = flags.into();
        self
    }

    /// Sets the sampling request for this context.
    ///
    /// Defaults to `None`.
    pub fn sampled(&mut self, sampled: bool) -> &mut Builder {
        self.flags.sampled(sampled);
        self
    }

    /// Sets the debug flag for this request.
    ///
    /// Defaults to `false`.
    pub fn debug(&mut self, debug: bool) -> &mut Builder {
        self.flags.debug(debug);
        self
    }

    /// Sets whether spans in this context are recorded locally even when not
    /// sampled for the remote collector.
    ///
    /// Defaults to `false`.
    pub fn sampled_local(&mut self, sampled_local: bool) -> &mut Builder {
        self.sampled_local = sampled_local;
        self
    }

    /// Sets the shared flag of this context.
    ///
    /// Defaults to `false`.
    pub fn shared(&mut self, shared: bool) -> &mut Builder {
        self.shared = shared;
        self
    }

    pub(crate) fn local_root_id(&mut self, local_root_id: SpanId) -> &mut Builder {
        self.local_root_id = Some(local_root_id);
        self
    }

    /// Appends a propagated state bundle to this context.
    pub fn extra(&mut self, extra: Extra) -> &mut Builder {
        self.extra.push(extra);
        self
    }

    pub(crate) fn extras(&mut self, extra: Vec<Extra>) -> &mut Builder {
        self.extra = extra;
        self
    }

    /// Constructs a `TraceContext`.
    ///
    /// Returns an error if the trace or span ID is zero, or if the parent and
    /// span IDs are equal.
    ///
    /// # Panics
    ///
    /// Panics if `trace_id` or `span_id` was not set.
    pub fn build(&self) -> Result<TraceContext, InvalidContext> {
        let context = self.build_unchecked();
        if context.trace_id.low() == 0 {
            return Err(InvalidContext("trace ID is zero"));
        }
        if context.span_id.value() == 0 {
            return Err(InvalidContext("span ID is zero"));
        }
        if context.parent_id == Some(context.span_id) {
            return Err(InvalidContext("parent and span IDs are equal"));
        }
        Ok(context)
    }

    // The tracer only manufactures contexts from ids it drew itself or
    // already validated, so it skips revalidation.
    pub(crate) fn build_unchecked(&self) -> TraceContext {
        TraceContext {
            trace_id: self.trace_id.expect("trace ID not set"),
            parent_id: self.parent_id,
            span_id: self.span_id.expect("span ID not set"),
            flags: self.flags.build(),
            sampled_local: self.sampled_local,
            shared: self.shared,
            local_root_id: self.local_root_id,
            extra: self.extra.clone(),
        }
    }
}

/// The error returned when constructing a `TraceContext` from invalid
/// identifiers.
#[derive(Debug)]
pub struct InvalidContext(&'static str);

impl fmt::Display for InvalidContext {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "invalid trace context: {}", self.0)
    }
}

impl Error for InvalidContext {}

#[cfg(test)]
mod test {
    use super::*;

    fn context(trace_id: u64, span_id: u64) -> TraceContext {
        TraceContext::builder()
            .trace_id(TraceId::from(trace_id))
            .span_id(SpanId::from(span_id))
            .build()
            .unwrap()
    }

    #[test]
    fn rejects_zero_ids() {
        assert!(TraceContext::builder()
            .trace_id(TraceId::from(0))
            .span_id(SpanId::from(1))
            .build()
            .is_err());
        assert!(TraceContext::builder()
            .trace_id(TraceId::from(1))
            .span_id(SpanId::from(0))
            .build()
            .is_err());
    }

    #[test]
    fn rejects_self_parent() {
        assert!(TraceContext::builder()
            .trace_id(TraceId::from(1))
            .parent_id(SpanId::from(2))
            .span_id(SpanId::from(2))
            .build()
            .is_err());
    }

    #[test]
    fn equality_ignores_flags_and_parent() {
        let a = context(1, 2);
        let mut builder = Builder::from(a.clone());
        builder.parent_id(SpanId::from(9)).sampled(true);
        let b = builder.build().unwrap();
        assert_eq!(a, b);

        let mut builder = Builder::from(a.clone());
        builder.shared(true);
        let shared = builder.build().unwrap();
        assert_ne!(a, shared);
    }

    #[test]
    fn merge_preserves_order_and_dedups() {
        let a: Extra = Arc::new("a".to_string());
        let b: Extra = Arc::new("b".to_string());
        let c: Extra = Arc::new("c".to_string());

        let merged = merge_extra(&[a.clone(), b.clone()], &[b.clone(), c.clone()]);
        assert_eq!(merged.len(), 3);
        assert!(Arc::ptr_eq(&merged[0], &a));
        assert!(Arc::ptr_eq(&merged[1], &b));
        assert!(Arc::ptr_eq(&merged[2], &c));
    }

    #[test]
    fn find_extra_downcasts() {
        let context = context(1, 2).with_extra(Arc::new(42u32));
        assert_eq!(context.find_extra::<u32>(), Some(&42));
        assert_eq!(context.find_extra::<String>(), None);
    }
}
