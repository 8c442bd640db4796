//! Span handles.
use crate::current::Scope;
use crate::tracer::{FinishMode, Tracer};
use crate::TraceContext;
use std::mem;
use tracekit_types::{Endpoint, Kind};

pub(crate) enum SpanState {
    Real {
        tracer: Tracer,
        // lookup handles don't own reporting, so they don't finish on drop
        owned: bool,
    },
    Nop,
}

/// An open span.
///
/// A span either records or it doesn't. Recording spans accumulate state in
/// the tracer until they are finished; no-op spans carry a valid context for
/// propagation but discard every mutation. Both flavors answer `context()`,
/// so instrumentation never needs to branch on the sampling decision.
///
/// Spans returned by the tracer's factory methods own their record: if such
/// a span is dropped without an explicit `finish`, it is finished with the
/// tracer's clock. Handles returned by `to_span` and `current_span` do not
/// finish on drop, since the factory-created handle elsewhere still owns the
/// record.
pub struct Span {
    context: TraceContext,
    state: SpanState,
}

impl Span {
    pub(crate) fn real(context: TraceContext, tracer: Tracer, owned: bool) -> Span {
        Span {
            context,
            state: SpanState::Real { tracer, owned },
        }
    }

    pub(crate) fn nop(context: TraceContext) -> Span {
        Span {
            context,
            state: SpanState::Nop,
        }
    }

    /// Returns the context associated with this span.
    #[inline]
    pub fn context(&self) -> &TraceContext {
        &self.context
    }

    /// Determines if this span discards its recordings.
    #[inline]
    pub fn is_noop(&self) -> bool {
        match self.state {
            SpanState::Real { .. } => false,
            SpanState::Nop => true,
        }
    }

    /// Records the start of the span at the current time.
    #[inline]
    pub fn start(&mut self) {
        if let SpanState::Real { tracer, .. } = &self.state {
            let now = tracer.clock_now();
            tracer.with_span(&self.context, |span| span.set_start_timestamp(now));
        }
    }

    /// Records the start of the span at the specified time, in microseconds
    /// since the UNIX epoch.
    #[inline]
    pub fn start_with_timestamp(&mut self, timestamp: u64) {
        if let SpanState::Real { tracer, .. } = &self.state {
            tracer.with_span(&self.context, |span| span.set_start_timestamp(timestamp));
        }
    }

    /// Sets the name of this span.
    #[inline]
    pub fn name(&mut self, name: &str) {
        if let SpanState::Real { tracer, .. } = &self.state {
            tracer.with_span(&self.context, |span| span.set_name(name));
        }
    }

    /// A builder-style version of `name`.
    #[inline]
    pub fn with_name(mut self, name: &str) -> Span {
        self.name(name);
        self
    }

    /// Sets the kind of this span.
    #[inline]
    pub fn kind(&mut self, kind: Kind) {
        if let SpanState::Real { tracer, .. } = &self.state {
            tracer.with_span(&self.context, |span| span.set_kind(kind));
        }
    }

    /// A builder-style version of `kind`.
    #[inline]
    pub fn with_kind(mut self, kind: Kind) -> Span {
        self.kind(kind);
        self
    }

    /// Sets the remote endpoint of this span.
    #[inline]
    pub fn remote_endpoint(&mut self, endpoint: Endpoint) {
        if let SpanState::Real { tracer, .. } = &self.state {
            tracer.with_span(&self.context, |span| span.set_remote_endpoint(endpoint));
        }
    }

    /// Attaches an annotation to this span at the current time.
    #[inline]
    pub fn annotate(&mut self, value: &str) {
        if let SpanState::Real { tracer, .. } = &self.state {
            let now = tracer.clock_now();
            tracer.with_span(&self.context, |span| span.annotate(now, value));
        }
    }

    /// Attaches an annotation to this span at the specified time, in
    /// microseconds since the UNIX epoch.
    #[inline]
    pub fn annotate_at(&mut self, timestamp: u64, value: &str) {
        if let SpanState::Real { tracer, .. } = &self.state {
            tracer.with_span(&self.context, |span| span.annotate(timestamp, value));
        }
    }

    /// Attaches a tag to this span.
    #[inline]
    pub fn tag(&mut self, key: &str, value: &str) {
        if let SpanState::Real { tracer, .. } = &self.state {
            tracer.with_span(&self.context, |span| span.set_tag(key, value));
        }
    }

    /// Attaches an error to this span.
    #[inline]
    pub fn error(&mut self, error: &str) {
        if let SpanState::Real { tracer, .. } = &self.state {
            tracer.with_span(&self.context, |span| span.set_error(error));
        }
    }

    /// Finishes the span at the current time.
    ///
    /// Finishing an already-finished span has no effect.
    #[inline]
    pub fn finish(mut self) {
        self.complete(FinishMode::Finish(None));
    }

    /// Finishes the span at the specified time, in microseconds since the
    /// UNIX epoch.
    #[inline]
    pub fn finish_with_timestamp(mut self, timestamp: u64) {
        self.complete(FinishMode::Finish(Some(timestamp)));
    }

    /// Reports the span as it stands, without a finish timestamp or
    /// duration.
    ///
    /// This is intended for one-shot operations like message sends, where a
    /// duration is meaningless.
    #[inline]
    pub fn flush(mut self) {
        self.complete(FinishMode::Flush);
    }

    /// Throws away the span without reporting it.
    #[inline]
    pub fn abandon(mut self) {
        self.complete(FinishMode::Abandon);
    }

    fn complete(&mut self, mode: FinishMode) {
        if let SpanState::Real { tracer, .. } = mem::replace(&mut self.state, SpanState::Nop) {
            tracer.finish_span(&self.context, mode);
        }
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        let owned = matches!(self.state, SpanState::Real { owned: true, .. });
        if owned {
            self.complete(FinishMode::Finish(None));
        }
    }
}

/// A restricted handle for mutating a span.
///
/// Unlike `Span`, a customizer carries no lifecycle operations, so it can be
/// handed to code that should decorate the work in flight but never finish
/// it. The no-op customizer is returned whenever there is nothing useful to
/// mutate.
pub struct SpanCustomizer {
    inner: Option<(Tracer, TraceContext)>,
}

impl SpanCustomizer {
    pub(crate) fn recording(tracer: Tracer, context: TraceContext) -> SpanCustomizer {
        SpanCustomizer {
            inner: Some((tracer, context)),
        }
    }

    pub(crate) fn noop() -> SpanCustomizer {
        SpanCustomizer { inner: None }
    }

    /// Determines if this customizer discards all mutations.
    #[inline]
    pub fn is_noop(&self) -> bool {
        self.inner.is_none()
    }

    /// Sets the name of the span.
    #[inline]
    pub fn name(&self, name: &str) {
        if let Some((tracer, context)) = &self.inner {
            tracer.with_span(context, |span| span.set_name(name));
        }
    }

    /// Attaches a tag to the span.
    #[inline]
    pub fn tag(&self, key: &str, value: &str) {
        if let Some((tracer, context)) = &self.inner {
            tracer.with_span(context, |span| span.set_tag(key, value));
        }
    }

    /// Attaches an annotation to the span at the current time.
    #[inline]
    pub fn annotate(&self, value: &str) {
        if let Some((tracer, context)) = &self.inner {
            let now = tracer.clock_now();
            tracer.with_span(context, |span| span.annotate(now, value));
        }
    }
}

/// A guard object marking a span's context as current until it drops.
///
/// Closing the scope does not finish the span; it only restores the
/// previously current context.
pub struct SpanInScope {
    _scope: Scope,
}

impl SpanInScope {
    pub(crate) fn new(scope: Scope) -> SpanInScope {
        SpanInScope { _scope: scope }
    }

    /// Closes the scope, restoring the previously current context.
    ///
    /// This is equivalent to dropping the guard.
    pub fn close(self) {}
}
