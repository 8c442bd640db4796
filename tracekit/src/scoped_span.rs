//! Scoped spans.
use crate::current::Scope;
use crate::tracer::{FinishMode, Tracer};
use crate::TraceContext;
use tracekit_types::{Endpoint, Kind};

/// A span which is also the current span for its lifetime.
///
/// This is the shorthand for the common case of a synchronous unit of work:
/// the span is started and made current in one call, and finishing it also
/// restores the previously current context. The scope is closed on every
/// exit path, including unwinds, because both halves run from `drop`.
pub struct ScopedSpan {
    context: TraceContext,
    // None when the span is a no-op
    tracer: Option<Tracer>,
    finish_timestamp: Option<u64>,
    // fields drop after the drop body, so the scope closes after the span
    // finishes
    _scope: Scope,
}

impl ScopedSpan {
    pub(crate) fn new(context: TraceContext, tracer: Option<Tracer>, scope: Scope) -> ScopedSpan {
        ScopedSpan {
            context,
            tracer,
            finish_timestamp: None,
            _scope: scope,
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
        self.tracer.is_none()
    }

    /// Sets the kind of this span.
    #[inline]
    pub fn kind(&mut self, kind: Kind) {
        if let Some(tracer) = &self.tracer {
            tracer.with_span(&self.context, |span| span.set_kind(kind));
        }
    }

    /// Sets the remote endpoint of this span.
    #[inline]
    pub fn remote_endpoint(&mut self, endpoint: Endpoint) {
        if let Some(tracer) = &self.tracer {
            tracer.with_span(&self.context, |span| span.set_remote_endpoint(endpoint));
        }
    }

    /// Attaches an annotation to this span at the current time.
    #[inline]
    pub fn annotate(&mut self, value: &str) {
        if let Some(tracer) = &self.tracer {
            let now = tracer.clock_now();
            tracer.with_span(&self.context, |span| span.annotate(now, value));
        }
    }

    /// Attaches a tag to this span.
    #[inline]
    pub fn tag(&mut self, key: &str, value: &str) {
        if let Some(tracer) = &self.tracer {
            tracer.with_span(&self.context, |span| span.set_tag(key, value));
        }
    }

    /// Attaches an error to this span.
    #[inline]
    pub fn error(&mut self, error: &str) {
        if let Some(tracer) = &self.tracer {
            tracer.with_span(&self.context, |span| span.set_error(error));
        }
    }

    /// Finishes the span at the current time and closes its scope.
    ///
    /// This is equivalent to dropping the span.
    #[inline]
    pub fn finish(self) {}

    /// Finishes the span at the specified time, in microseconds since the
    /// UNIX epoch, and closes its scope.
    #[inline]
    pub fn finish_with_timestamp(mut self, timestamp: u64) {
        self.finish_timestamp = Some(timestamp);
    }
}

impl Drop for ScopedSpan {
    fn drop(&mut self) {
        if let Some(tracer) = self.tracer.take() {
            tracer.finish_span(&self.context, FinishMode::Finish(self.finish_timestamp));
        }
    }
}
