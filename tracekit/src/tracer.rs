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

//! Tracers.
use crate::clock::{Clock, SystemClock};
use crate::current::{Bind, CurrentContext, ThreadLocalCurrent};
use crate::extract::{Extracted, ExtractedContext};
use crate::propagation::{NopPropagation, Propagate};
use crate::recorder::{self, MutableSpan, Recorder};
use crate::report::{LoggingReporter, Report};
use crate::sample::{AlwaysSampler, Sample};
use crate::span::{Span, SpanCustomizer, SpanInScope};
use crate::trace_context::{self, merge_extra, Extra};
use crate::{SamplingFlags, ScopedSpan, SpanHandler, TraceContext};
use log::{debug, warn};
use rand::Rng;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracekit_types::{Endpoint, SpanId, TraceId};

pub(crate) enum FinishMode {
    Finish(Option<u64>),
    Flush,
    Abandon,
}

struct Shared {
    local_endpoint: Endpoint,
    propagation: Box<dyn Propagate + Sync + Send>,
    current: Arc<dyn CurrentContext + Sync + Send>,
    clock: Box<dyn Clock + Sync + Send>,
    reporter: Box<dyn Report + Sync + Send>,
    handlers: Vec<Box<dyn SpanHandler + Sync + Send>>,
    recorder: Recorder,
    trace_id_128bit: bool,
    supports_join: bool,
    always_report_spans: bool,
    always_sample_local: bool,
    noop: AtomicBool,
}

/// The hub of the library.
///
/// A tracer manufactures spans, reconciles incoming trace identity with
/// local sampling decisions, tracks the current span, and routes finished
/// spans through the handler chain to the reporter.
///
/// Tracers are cheap to clone; clones share all state, including the
/// recorder and the `noop` switch.
#[derive(Clone)]
pub struct Tracer {
    shared: Arc<Shared>,
    sampler: Arc<dyn Sample + Sync + Send>,
}

impl Tracer {
    /// Returns a builder used to construct a `Tracer`.
    pub fn builder() -> Builder {
        Builder {
            local_service_name: None,
            local_endpoint: None,
            sampler: None,
            propagation: None,
            current: None,
            clock: None,
            reporter: None,
            handlers: vec![],
            trace_id_128bit: false,
            supports_join: true,
            always_report_spans: false,
        }
    }

    /// Starts a new trace rooted in this process.
    pub fn new_trace(&self) -> Span {
        self.new_trace_from(SamplingFlags::default())
    }

    /// Starts a new trace with specific sampling flags.
    pub fn new_trace_from(&self, flags: SamplingFlags) -> Span {
        let context = self.new_root_context(flags, &[]);
        self.make_span(context, true)
    }

    /// Joins an existing span, producing the server side of its record.
    ///
    /// The returned span reuses the incoming span ID, so the two halves of
    /// the RPC pair up under one ID, distinguished by kind and the `shared`
    /// flag. If the propagation format cannot represent shared spans, this
    /// behaves as `new_child`.
    pub fn join_span(&self, context: TraceContext) -> Span {
        if !self.shared.supports_join {
            return self.new_child(context);
        }

        let flags = self.decide(context.trace_id(), context.sampling_flags());
        let local_root_id = context.local_root_id().unwrap_or_else(|| context.span_id());

        let mut builder = trace_context::Builder::from(context);
        builder
            .sampling_flags(flags)
            .shared(true)
            .local_root_id(local_root_id);
        if self.shared.always_sample_local {
            builder.sampled_local(true);
        }
        let context = self.shared.propagation.decorate(builder.build_unchecked());

        self.make_span(context, true)
    }

    /// Starts a new span with the specified parent.
    pub fn new_child(&self, parent: TraceContext) -> Span {
        let context = self.child_context(&parent, &[]);
        self.make_span(context, true)
    }

    /// Starts a new span parented to the current context if one exists, or a
    /// new trace otherwise.
    pub fn next_span(&self) -> Span {
        match self.shared.current.get() {
            Some(context) => self.new_child(context),
            None => self.new_trace(),
        }
    }

    /// Starts a new span continuing whatever trace identity was extracted
    /// from an incoming request.
    ///
    /// A full extracted context becomes the parent of the new span. An
    /// extracted trace ID is continued under a fresh span ID with no parent.
    /// Extracted flags fall back to the current context as parent if one
    /// exists, or start a new trace with those flags. Extracted state
    /// bundles are merged onto the new context, after any inherited from the
    /// parent.
    pub fn next_span_from(&self, extracted: ExtractedContext) -> Span {
        let (value, extra) = extracted.into_parts();

        let context = match value {
            Extracted::Context(parent) => self.child_context(&parent, &extra),
            Extracted::TraceId(id_context) => {
                let span_id = SpanId::from(self.next_id());
                let flags = self.decide(id_context.trace_id(), id_context.sampling_flags());

                let mut builder = TraceContext::builder();
                builder
                    .trace_id(id_context.trace_id())
                    .span_id(span_id)
                    .sampling_flags(flags)
                    .local_root_id(span_id)
                    .extras(extra);
                if self.shared.always_sample_local {
                    builder.sampled_local(true);
                }
                self.shared.propagation.decorate(builder.build_unchecked())
            }
            Extracted::Flags(flags) => match self.shared.current.get() {
                Some(parent) => self.child_context(&parent, &extra),
                None => self.new_root_context(flags, &extra),
            },
        };

        self.make_span(context, true)
    }

    /// Wraps an existing context in a span handle.
    ///
    /// The span records if the context's effective sampling decision says
    /// so; otherwise a no-op span is returned whose `context()` still round
    /// trips. The handle does not finish on drop; use an explicit `finish`.
    pub fn to_span(&self, context: TraceContext) -> Span {
        self.make_span(context, false)
    }

    /// Makes a span's context current until the returned guard drops.
    ///
    /// Passing `None` opens a clear scope: inside it there is no current
    /// span, which is useful to stop an unrelated operation from attaching
    /// to the trace.
    pub fn with_span_in_scope(&self, span: Option<&Span>) -> SpanInScope {
        let scope = self
            .shared
            .current
            .new_scope(span.map(|s| s.context().clone()));
        SpanInScope::new(scope)
    }

    /// Starts a span parented to the current context and makes it current,
    /// in one step.
    ///
    /// Finishing the returned span also restores the previously current
    /// context.
    pub fn start_scoped_span(&self, name: &str) -> ScopedSpan {
        self.start_scoped_span_with_parent(name, None)
    }

    /// Starts a span with an explicit parent and makes it current.
    ///
    /// When no parent is given this behaves as `start_scoped_span`.
    pub fn start_scoped_span_with_parent(
        &self,
        name: &str,
        parent: Option<&TraceContext>,
    ) -> ScopedSpan {
        let context = match parent.cloned().or_else(|| self.shared.current.get()) {
            Some(parent) => self.child_context(&parent, &[]),
            None => self.new_root_context(SamplingFlags::default(), &[]),
        };

        let recording = self.recording(&context);
        if recording {
            let now = self.clock_now();
            self.shared.recorder.with_span(
                &context,
                &self.shared.local_endpoint,
                |span| {
                    span.set_name(name);
                    span.set_start_timestamp(now);
                },
            );
        }

        let scope = self.shared.current.new_scope(Some(context.clone()));
        let tracer = if recording { Some(self.clone()) } else { None };
        ScopedSpan::new(context, tracer, scope)
    }

    /// Returns a handle on the current span, if one is in scope.
    ///
    /// The handle does not finish on drop; the code that created the span
    /// still owns its lifecycle.
    pub fn current_span(&self) -> Option<Span> {
        self.shared.current.get().map(|context| self.to_span(context))
    }

    /// Returns a customizer for the current span.
    ///
    /// The no-op customizer is returned when there is no current span, when
    /// the current context is not recording, or when the tracer is a no-op.
    pub fn current_span_customizer(&self) -> SpanCustomizer {
        match self.shared.current.get() {
            Some(context) if self.recording(&context) => {
                SpanCustomizer::recording(self.clone(), context)
            }
            _ => SpanCustomizer::noop(),
        }
    }

    /// Returns a view of this tracer using the specified sampler.
    ///
    /// The view shares all other state with this tracer.
    pub fn with_sampler<S>(&self, sampler: S) -> Tracer
    where
        S: Sample + 'static + Sync + Send,
    {
        Tracer {
            shared: self.shared.clone(),
            sampler: Arc::new(sampler),
        }
    }

    /// Turns all span factory methods into no-ops.
    ///
    /// Contexts are still created and propagated so that downstream services
    /// see consistent identity, but nothing is recorded or reported until
    /// the flag is cleared.
    pub fn set_noop(&self, noop: bool) {
        self.shared.noop.store(noop, Ordering::Relaxed);
    }

    /// Binds a context to a future, making it current whenever the future is
    /// polled.
    pub fn bind<F>(&self, context: TraceContext, future: F) -> Bind<F>
    where
        F: Future,
    {
        Bind::new(self.shared.current.clone(), context, future)
    }

    fn noop(&self) -> bool {
        self.shared.noop.load(Ordering::Relaxed)
    }

    fn next_id(&self) -> u64 {
        let mut rng = rand::thread_rng();
        loop {
            let id = rng.gen::<u64>();
            if id != 0 {
                return id;
            }
        }
    }

    /// Applies the sampler when the incoming flags leave the decision open.
    fn decide(&self, trace_id: TraceId, flags: SamplingFlags) -> SamplingFlags {
        if flags.sampled().is_some() {
            return flags;
        }

        let mut builder = crate::sampling_flags::Builder::from(flags);
        builder.sampled(self.sampler.sample(trace_id));
        builder.build()
    }

    fn new_root_context(&self, flags: SamplingFlags, extra: &[Extra]) -> TraceContext {
        let id = self.next_id();
        let hi = if self.shared.trace_id_128bit {
            self.next_id()
        } else {
            0
        };
        let trace_id = TraceId::new(hi, id);
        let span_id = SpanId::from(id);
        let flags = self.decide(trace_id, flags);

        let mut builder = TraceContext::builder();
        builder
            .trace_id(trace_id)
            .span_id(span_id)
            .sampling_flags(flags)
            .local_root_id(span_id)
            .extras(extra.to_vec());
        if self.shared.always_sample_local {
            builder.sampled_local(true);
        }

        self.shared.propagation.decorate(builder.build_unchecked())
    }

    fn child_context(&self, parent: &TraceContext, extracted_extra: &[Extra]) -> TraceContext {
        let span_id = SpanId::from(self.next_id());
        let flags = self.decide(parent.trace_id(), parent.sampling_flags());
        // a parent which never traversed a tracer was created by a remote
        // process, so the child is the local root
        let local_root_id = parent.local_root_id().unwrap_or(span_id);

        let mut builder = TraceContext::builder();
        builder
            .trace_id(parent.trace_id())
            .parent_id(parent.span_id())
            .span_id(span_id)
            .sampling_flags(flags)
            .sampled_local(parent.sampled_local() || self.shared.always_sample_local)
            .local_root_id(local_root_id)
            .extras(merge_extra(parent.extra(), extracted_extra));

        self.shared.propagation.decorate(builder.build_unchecked())
    }

    /// Determines if spans for the context produce records.
    fn recording(&self, context: &TraceContext) -> bool {
        if self.noop() {
            return false;
        }

        context.sampled() == Some(true)
            || context.sampled_local()
            || context.debug()
            || self.shared.always_sample_local
    }

    fn make_span(&self, context: TraceContext, owned: bool) -> Span {
        if !self.recording(&context) {
            return Span::nop(context);
        }

        self.shared
            .recorder
            .ensure(&context, &self.shared.local_endpoint);
        Span::real(context, self.clone(), owned)
    }

    pub(crate) fn clock_now(&self) -> u64 {
        self.shared.clock.now_micros()
    }

    pub(crate) fn with_span<F>(&self, context: &TraceContext, f: F)
    where
        F: FnOnce(&mut MutableSpan),
    {
        self.shared
            .recorder
            .with_span(context, &self.shared.local_endpoint, f);
    }

    pub(crate) fn finish_span(&self, context: &TraceContext, mode: FinishMode) {
        let mut span = match self.shared.recorder.take(context) {
            Some(span) => span,
            // already finished or abandoned
            None => return,
        };

        match mode {
            FinishMode::Abandon => return,
            FinishMode::Finish(timestamp) => {
                let timestamp = timestamp.unwrap_or_else(|| self.clock_now());
                span.set_finish_timestamp(timestamp);
            }
            FinishMode::Flush => {}
        }

        let mut vetoed = false;
        for handler in &self.shared.handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(context, &mut span))) {
                Ok(true) => {}
                Ok(false) => {
                    vetoed = true;
                    if !self.shared.always_report_spans {
                        break;
                    }
                }
                Err(_) => {
                    warn!("span handler panicked; dropping span {}", context);
                    vetoed = true;
                    if !self.shared.always_report_spans {
                        break;
                    }
                }
            }
        }
        if vetoed {
            return;
        }

        if context.sampled() != Some(true) && !self.shared.always_report_spans {
            return;
        }
        if self.shared.reporter.is_noop() {
            return;
        }

        let span = recorder::to_wire(context, &span);
        let reporter = &self.shared.reporter;
        if panic::catch_unwind(AssertUnwindSafe(|| reporter.report(span))).is_err() {
            debug!("span reporter panicked; span {} lost", context);
        }
    }
}

impl fmt::Display for Tracer {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str("Tracer{")?;
        // the three formats are mutually exclusive; noop wins over an open
        // scope
        if self.noop() {
            fmt.write_str("noop=true, ")?;
        } else if let Some(context) = self.shared.current.get() {
            write!(
                fmt,
                "currentSpan={:016x}/{:016x}, ",
                context.trace_id().low(),
                context.span_id().value()
            )?;
        }
        write!(fmt, "finishedSpanHandler={}}}", self.shared.reporter)
    }
}

/// A builder type for `Tracer`s.
///
/// This is the one place configuration errors surface; once built, a tracer
/// never raises from recording operations.
pub struct Builder {
    local_service_name: Option<String>,
    local_endpoint: Option<Endpoint>,
    sampler: Option<Arc<dyn Sample + Sync + Send>>,
    propagation: Option<Box<dyn Propagate + Sync + Send>>,
    current: Option<Arc<dyn CurrentContext + Sync + Send>>,
    clock: Option<Box<dyn Clock + Sync + Send>>,
    reporter: Option<Box<dyn Report + Sync + Send>>,
    handlers: Vec<Box<dyn SpanHandler + Sync + Send>>,
    trace_id_128bit: bool,
    supports_join: bool,
    always_report_spans: bool,
}

impl Builder {
    /// Sets the name of the service recording spans.
    ///
    /// Ignored if a full local endpoint is set. Defaults to `"unknown"`.
    pub fn local_service_name(mut self, name: &str) -> Builder {
        self.local_service_name = Some(name.to_string());
        self
    }

    /// Sets the endpoint of the service recording spans.
    pub fn local_endpoint(mut self, endpoint: Endpoint) -> Builder {
        self.local_endpoint = Some(endpoint);
        self
    }

    /// Sets the sampler deciding the fate of traces with no incoming
    /// decision.
    ///
    /// Defaults to sampling every trace.
    pub fn sampler<S>(mut self, sampler: S) -> Builder
    where
        S: Sample + 'static + Sync + Send,
    {
        self.sampler = Some(Arc::new(sampler));
        self
    }

    /// Sets the propagation plugin.
    ///
    /// The plugin's capabilities are folded into the configuration: a plugin
    /// which cannot represent joins forces `supports_join(false)`, and one
    /// which requires 128 bit trace IDs forces `trace_id_128bit(true)`.
    pub fn propagation<P>(mut self, propagation: P) -> Builder
    where
        P: Propagate + 'static + Sync + Send,
    {
        self.propagation = Some(Box::new(propagation));
        self
    }

    /// Sets the current-context realization.
    ///
    /// Defaults to a thread-local stack.
    pub fn current<C>(mut self, current: C) -> Builder
    where
        C: CurrentContext + 'static + Sync + Send,
    {
        self.current = Some(Arc::new(current));
        self
    }

    /// Sets the clock used to timestamp spans.
    ///
    /// Defaults to the system clock.
    pub fn clock<C>(mut self, clock: C) -> Builder
    where
        C: Clock + 'static + Sync + Send,
    {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Sets the reporter finished spans are shipped to.
    ///
    /// Defaults to logging spans at the `info` level.
    pub fn reporter<R>(mut self, reporter: R) -> Builder
    where
        R: Report + 'static + Sync + Send,
    {
        self.reporter = Some(Box::new(reporter));
        self
    }

    /// Appends a handler to the finished-span chain.
    ///
    /// Handlers run in registration order.
    pub fn span_handler<H>(mut self, handler: H) -> Builder
    where
        H: SpanHandler + 'static + Sync + Send,
    {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Sets whether new traces are assigned 128 bit trace IDs.
    ///
    /// Defaults to `false`.
    pub fn trace_id_128bit(mut self, trace_id_128bit: bool) -> Builder {
        self.trace_id_128bit = trace_id_128bit;
        self
    }

    /// Sets whether `join_span` reuses incoming span IDs.
    ///
    /// When `false`, joins are downgraded to children. Defaults to `true`.
    pub fn supports_join(mut self, supports_join: bool) -> Builder {
        self.supports_join = supports_join;
        self
    }

    /// Sets whether vetoed and unsampled spans still run the whole handler
    /// chain and reach the reporter.
    ///
    /// Defaults to `false`.
    pub fn always_report_spans(mut self, always_report_spans: bool) -> Builder {
        self.always_report_spans = always_report_spans;
        self
    }

    /// Constructs a `Tracer`.
    pub fn build(self) -> Tracer {
        let propagation = self
            .propagation
            .unwrap_or_else(|| Box::new(NopPropagation));
        let trace_id_128bit = self.trace_id_128bit || propagation.requires_128bit_trace_id();
        let supports_join = self.supports_join && propagation.supports_join();

        let local_service_name = self.local_service_name;
        let local_endpoint = self.local_endpoint.clone().unwrap_or_else(|| {
            let name = local_service_name.as_deref().unwrap_or("unknown");
            Endpoint::named(name)
        });

        let always_sample_local = self.handlers.iter().any(|h| h.always_sample_local());

        Tracer {
            shared: Arc::new(Shared {
                local_endpoint,
                propagation,
                current: self
                    .current
                    .unwrap_or_else(|| Arc::new(ThreadLocalCurrent)),
                clock: self.clock.unwrap_or_else(|| Box::new(SystemClock)),
                reporter: self.reporter.unwrap_or_else(|| Box::new(LoggingReporter)),
                handlers: self.handlers,
                recorder: Recorder::new(),
                trace_id_128bit,
                supports_join,
                always_report_spans: self.always_report_spans,
                always_sample_local,
                noop: AtomicBool::new(false),
            }),
            sampler: self
                .sampler
                .unwrap_or_else(|| Arc::new(AlwaysSampler)),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

static REGISTRY: Mutex<Option<Tracer>> = Mutex::new(None);

/// Installs the process-wide tracer.
///
/// Returns an error if a tracer is already installed.
pub fn set_tracer(tracer: Tracer) -> Result<(), SetTracerError> {
    let mut registry = lock(&REGISTRY);
    if registry.is_some() {
        return Err(SetTracerError(()));
    }
    *registry = Some(tracer);
    Ok(())
}

/// Returns the process-wide tracer, if one is installed.
pub fn tracer() -> Option<Tracer> {
    lock(&REGISTRY).clone()
}

/// Removes the process-wide tracer.
///
/// The removed instance is flipped to no-op so that outstanding handles go
/// quiet, and a new tracer may then be installed.
pub fn close_tracer() {
    if let Some(tracer) = lock(&REGISTRY).take() {
        tracer.set_noop(true);
    }
}

/// The error returned when attempting to set a tracer when one is already
/// installed.
#[derive(Debug)]
pub struct SetTracerError(());

impl fmt::Display for SetTracerError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str("tracer already installed")
    }
}

impl Error for SetTracerError {}
