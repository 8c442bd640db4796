use crate::extract::TraceIdContext;
use crate::trace_context::Extra;
use crate::{
    ExtraFieldPropagation, ExtraFields, ExtractedContext, Kind, MutableSpan, NeverSampler,
    Propagate, Report, SamplingFlags, SpanHandler, SpanId, TraceContext, TraceId, Tracer,
};
use antidote::Mutex;
use std::fmt;
use std::sync::Arc;

type Reported = Arc<Mutex<Vec<crate::types::Span>>>;

struct TestReporter(Reported);

impl Report for TestReporter {
    fn report(&self, span: crate::types::Span) {
        self.0.lock().push(span);
    }
}

impl fmt::Display for TestReporter {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str("TestReporter")
    }
}

fn test_tracer() -> (Tracer, Reported) {
    let spans = Arc::new(Mutex::new(vec![]));
    let tracer = Tracer::builder()
        .local_service_name("test")
        .reporter(TestReporter(spans.clone()))
        .build();
    (tracer, spans)
}

fn external_context(trace_id: u64, span_id: u64) -> TraceContext {
    TraceContext::builder()
        .trace_id(TraceId::from(trace_id))
        .span_id(SpanId::from(span_id))
        .sampled(true)
        .build()
        .unwrap()
}

#[test]
fn new_trace_roots_itself() {
    let (tracer, _) = test_tracer();

    let span = tracer.new_trace();
    let context = span.context();

    assert_eq!(context.parent_id(), None);
    assert_eq!(context.local_root_id(), Some(context.span_id()));
    assert_eq!(context.sampled(), Some(true));
    assert!(!context.shared());
}

#[test]
fn new_child_inherits_identity() {
    let (tracer, _) = test_tracer();

    let parent = tracer.new_trace();
    let child = tracer.new_child(parent.context().clone());
    let context = child.context();

    assert_eq!(context.trace_id(), parent.context().trace_id());
    assert_eq!(context.parent_id(), Some(parent.context().span_id()));
    assert_ne!(context.span_id(), parent.context().span_id());
    assert!(!context.shared());
    assert_eq!(context.local_root_id(), parent.context().local_root_id());
}

#[test]
fn join_reuses_the_incoming_span_id() {
    let (tracer, _) = test_tracer();

    let incoming = external_context(1, 2);
    let joined = tracer.join_span(incoming.clone());
    let context = joined.context();

    assert_eq!(context.trace_id(), incoming.trace_id());
    assert_eq!(context.span_id(), incoming.span_id());
    assert!(context.shared());
    assert_eq!(context.sampled(), Some(true));
    assert_eq!(context.local_root_id(), Some(incoming.span_id()));
}

#[test]
fn join_resolves_open_sampling_decisions() {
    let (tracer, _) = test_tracer();

    let incoming = TraceContext::builder()
        .trace_id(TraceId::from(1))
        .span_id(SpanId::from(2))
        .build()
        .unwrap();
    assert_eq!(incoming.sampled(), None);

    let joined = tracer.join_span(incoming);
    assert_eq!(joined.context().sampled(), Some(true));
}

#[test]
fn join_falls_back_to_child_when_unsupported() {
    let spans = Arc::new(Mutex::new(vec![]));
    let tracer = Tracer::builder()
        .reporter(TestReporter(spans))
        .supports_join(false)
        .build();

    let incoming = external_context(1, 2);
    let child = tracer.join_span(incoming.clone());
    let context = child.context();

    assert!(!context.shared());
    assert_eq!(context.parent_id(), Some(incoming.span_id()));
    assert_ne!(context.span_id(), incoming.span_id());
}

struct NoJoinPropagation;

impl Propagate for NoJoinPropagation {
    fn supports_join(&self) -> bool {
        false
    }
}

struct Wide128Propagation;

impl Propagate for Wide128Propagation {
    fn requires_128bit_trace_id(&self) -> bool {
        true
    }
}

#[test]
fn propagation_overrides_join_support() {
    let spans = Arc::new(Mutex::new(vec![]));
    let tracer = Tracer::builder()
        .reporter(TestReporter(spans))
        .propagation(NoJoinPropagation)
        .build();

    let child = tracer.join_span(external_context(1, 2));
    assert!(!child.context().shared());
    assert_eq!(child.context().parent_id(), Some(SpanId::from(2)));
}

#[test]
fn propagation_forces_128bit_trace_ids() {
    let spans = Arc::new(Mutex::new(vec![]));
    let tracer = Tracer::builder()
        .reporter(TestReporter(spans))
        .propagation(Wide128Propagation)
        .build();

    assert!(tracer.new_trace().context().trace_id().is_128bit());
}

#[test]
fn factory_methods_settle_sampling() {
    let (tracer, _) = test_tracer();

    let undecided = TraceContext::builder()
        .trace_id(TraceId::from(1))
        .span_id(SpanId::from(2))
        .build()
        .unwrap();

    assert!(tracer.new_child(undecided.clone()).context().sampled().is_some());
    assert!(tracer.join_span(undecided).context().sampled().is_some());

    let id_only = TraceIdContext::new(TraceId::from(1), SamplingFlags::default());
    let span = tracer.next_span_from(ExtractedContext::trace_id(id_only));
    assert!(span.context().sampled().is_some());
}

#[test]
fn scopes_restore_in_lifo_order() {
    let (tracer, _) = test_tracer();

    assert!(tracer.current_span().is_none());

    let a = tracer.new_trace();
    let b = tracer.new_trace();

    let outer = tracer.with_span_in_scope(Some(&a));
    assert_eq!(
        tracer.current_span().map(|s| s.context().clone()),
        Some(a.context().clone())
    );

    let inner = tracer.with_span_in_scope(Some(&b));
    assert_eq!(
        tracer.current_span().map(|s| s.context().clone()),
        Some(b.context().clone())
    );

    inner.close();
    assert_eq!(
        tracer.current_span().map(|s| s.context().clone()),
        Some(a.context().clone())
    );

    outer.close();
    assert!(tracer.current_span().is_none());
}

#[test]
fn clear_scope_hides_the_current_span() {
    let (tracer, _) = test_tracer();

    let span = tracer.new_trace();
    let _outer = tracer.with_span_in_scope(Some(&span));
    assert!(tracer.current_span().is_some());
    assert!(!tracer.current_span_customizer().is_noop());

    let _clear = tracer.with_span_in_scope(None);
    assert!(tracer.current_span().is_none());
    assert!(tracer.current_span_customizer().is_noop());
}

#[test]
fn never_sampled_spans_are_noops_with_identity() {
    let (tracer, spans) = test_tracer();
    let tracer = tracer.with_sampler(NeverSampler);

    let span = tracer.new_trace();
    assert!(span.is_noop());
    assert_eq!(span.context().sampled(), Some(false));

    let context = span.context().clone();
    let round_trip = tracer.to_span(context.clone());
    assert_eq!(round_trip.context(), &context);

    {
        let _guard = tracer.with_span_in_scope(Some(&span));
        assert!(tracer.current_span_customizer().is_noop());
    }

    span.finish();
    assert!(spans.lock().is_empty());
}

struct PanickingReporter;

impl Report for PanickingReporter {
    fn report(&self, _: crate::types::Span) {
        panic!("collector unreachable");
    }
}

impl fmt::Display for PanickingReporter {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str("PanickingReporter")
    }
}

#[test]
fn reporter_failures_never_surface() {
    let tracer = Tracer::builder().reporter(PanickingReporter).build();

    tracer.new_trace().finish();

    // the tracer stays usable afterwards
    tracer.new_trace().finish();
}

struct VetoHandler;

impl SpanHandler for VetoHandler {
    fn handle(&self, _: &TraceContext, _: &mut MutableSpan) -> bool {
        false
    }
}

struct TagHandler;

impl SpanHandler for TagHandler {
    fn handle(&self, _: &TraceContext, span: &mut MutableSpan) -> bool {
        span.set_tag("handled", "yes");
        true
    }
}

struct PanickingHandler;

impl SpanHandler for PanickingHandler {
    fn handle(&self, _: &TraceContext, _: &mut MutableSpan) -> bool {
        panic!("handler bug");
    }
}

struct LocalHandler(Arc<Mutex<Vec<String>>>);

impl SpanHandler for LocalHandler {
    fn handle(&self, _: &TraceContext, span: &mut MutableSpan) -> bool {
        self.0.lock().push(span.name().unwrap_or("").to_string());
        true
    }

    fn always_sample_local(&self) -> bool {
        true
    }
}

#[test]
fn vetoed_spans_are_not_reported() {
    let spans = Arc::new(Mutex::new(vec![]));
    let tracer = Tracer::builder()
        .reporter(TestReporter(spans.clone()))
        .span_handler(VetoHandler)
        .build();

    tracer.new_trace().finish();
    assert!(spans.lock().is_empty());
}

#[test]
fn handlers_mutate_spans_before_reporting() {
    let spans = Arc::new(Mutex::new(vec![]));
    let tracer = Tracer::builder()
        .reporter(TestReporter(spans.clone()))
        .span_handler(TagHandler)
        .build();

    tracer.new_trace().finish();

    let spans = spans.lock();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].tags["handled"], "yes");
}

#[test]
fn panicking_handler_vetoes_only_its_span() {
    let spans = Arc::new(Mutex::new(vec![]));
    let tracer = Tracer::builder()
        .reporter(TestReporter(spans.clone()))
        .span_handler(PanickingHandler)
        .build();

    tracer.new_trace().finish();
    assert!(spans.lock().is_empty());
}

#[test]
fn local_sampling_records_without_reporting() {
    let seen = Arc::new(Mutex::new(vec![]));
    let spans = Arc::new(Mutex::new(vec![]));
    let tracer = Tracer::builder()
        .reporter(TestReporter(spans.clone()))
        .span_handler(LocalHandler(seen.clone()))
        .build()
        .with_sampler(NeverSampler);

    let span = tracer.new_trace().with_name("local work");
    assert!(!span.is_noop());
    assert!(span.context().sampled_local());
    span.finish();

    assert_eq!(*seen.lock(), vec!["local work".to_string()]);
    assert!(spans.lock().is_empty());
}

#[test]
fn always_report_spans_overrides_the_sampling_gate() {
    let seen = Arc::new(Mutex::new(vec![]));
    let spans = Arc::new(Mutex::new(vec![]));
    let tracer = Tracer::builder()
        .reporter(TestReporter(spans.clone()))
        .span_handler(LocalHandler(seen))
        .always_report_spans(true)
        .build()
        .with_sampler(NeverSampler);

    tracer.new_trace().finish();
    assert_eq!(spans.lock().len(), 1);
}

#[test]
fn extracted_extra_merges_after_parent_extra() {
    let (tracer, _) = test_tracer();

    let a: Extra = Arc::new("a".to_string());
    let b: Extra = Arc::new("b".to_string());

    let parent = external_context(1, 2).with_extra(a.clone());
    let parent_span = tracer.to_span(parent);
    let _guard = tracer.with_span_in_scope(Some(&parent_span));

    let extracted = ExtractedContext::empty()
        .with_extra(b.clone())
        .with_extra(a.clone());
    let child = tracer.next_span_from(extracted);

    let extra = child.context().extra();
    assert_eq!(extra.len(), 2);
    assert!(Arc::ptr_eq(&extra[0], &a));
    assert!(Arc::ptr_eq(&extra[1], &b));
}

#[test]
fn extracted_trace_id_starts_a_new_local_root() {
    let (tracer, _) = test_tracer();

    let id_only = TraceIdContext::new(TraceId::from(7), SamplingFlags::default());
    let span = tracer.next_span_from(ExtractedContext::trace_id(id_only));
    let context = span.context();

    assert_eq!(context.trace_id(), TraceId::from(7));
    assert_eq!(context.parent_id(), None);
    assert_eq!(context.local_root_id(), Some(context.span_id()));
}

struct RootCapture(Arc<Mutex<Vec<(u64, String)>>>);

impl SpanHandler for RootCapture {
    fn handle(&self, context: &TraceContext, span: &mut MutableSpan) -> bool {
        let root = context.local_root_id().map(|id| id.value()).unwrap_or(0);
        self.0
            .lock()
            .push((root, span.name().unwrap_or("").to_string()));
        true
    }
}

#[test]
fn local_roots_partition_in_process_work() {
    let captured = Arc::new(Mutex::new(vec![]));
    let spans = Arc::new(Mutex::new(vec![]));
    let tracer = Tracer::builder()
        .reporter(TestReporter(spans))
        .span_handler(RootCapture(captured.clone()))
        .build();

    let serve = |server_span_id: u64, server: &str, clients: &[&str]| {
        let incoming = external_context(1, server_span_id);
        let server_span = tracer.join_span(incoming).with_name(server);
        let _guard = tracer.with_span_in_scope(Some(&server_span));

        let processor = tracer
            .start_scoped_span(&format!("processor{}", &server[6..]));
        for client in clients {
            tracer.next_span().with_name(client).finish();
        }
        processor.finish();
        server_span.finish();
    };

    serve(2, "server1", &["client1"]);
    serve(3, "server2", &["client2", "client3"]);

    let captured = captured.lock();
    let mut group1: Vec<_> = captured
        .iter()
        .filter(|(root, _)| *root == 2)
        .map(|(_, name)| name.clone())
        .collect();
    let mut group2: Vec<_> = captured
        .iter()
        .filter(|(root, _)| *root == 3)
        .map(|(_, name)| name.clone())
        .collect();
    group1.sort();
    group2.sort();

    assert_eq!(group1, vec!["client1", "processor1", "server1"]);
    assert_eq!(group2, vec!["client2", "client3", "processor2", "server2"]);
    assert_eq!(captured.len(), group1.len() + group2.len());
}

#[test]
fn loopback_rpc_pairs_records_under_one_id() {
    let (tracer, spans) = test_tracer();

    let mut client = tracer.new_trace().with_kind(Kind::Client);
    client.start_with_timestamp(1);

    let mut server = tracer.join_span(client.context().clone()).with_kind(Kind::Server);
    server.start_with_timestamp(2);

    server.finish_with_timestamp(3);
    client.finish_with_timestamp(4);

    let spans = spans.lock();
    assert_eq!(spans.len(), 2);

    assert_eq!(spans[0].id, spans[1].id);
    assert_eq!(spans[0].trace_id, spans[1].trace_id);

    assert_eq!(spans[0].kind, Some(Kind::Server));
    assert!(spans[0].shared);
    assert_eq!(spans[0].timestamp, Some(2));
    assert_eq!(spans[0].duration, Some(1));

    assert_eq!(spans[1].kind, Some(Kind::Client));
    assert!(!spans[1].shared);
    assert_eq!(spans[1].timestamp, Some(1));
    assert_eq!(spans[1].duration, Some(3));
}

#[test]
fn extra_fields_ride_every_factory_method() {
    let spans = Arc::new(Mutex::new(vec![]));
    let tracer = Tracer::builder()
        .reporter(TestReporter(spans))
        .propagation(ExtraFieldPropagation::new(vec!["service"]))
        .build();

    let root = tracer.new_trace();
    ExtraFields::set(root.context(), "service", "napkin");

    let joined = tracer.join_span(root.context().clone());
    assert_eq!(
        ExtraFields::get(joined.context(), "service"),
        Some("napkin".to_string())
    );

    let child = tracer.new_child(root.context().clone());
    assert_eq!(
        ExtraFields::get(child.context(), "service"),
        Some("napkin".to_string())
    );

    {
        let _guard = tracer.with_span_in_scope(Some(&root));
        let next = tracer.next_span();
        assert_eq!(
            ExtraFields::get(next.context(), "service"),
            Some("napkin".to_string())
        );
    }

    let scoped = tracer.start_scoped_span_with_parent("work", Some(root.context()));
    assert_eq!(
        ExtraFields::get(scoped.context(), "service"),
        Some("napkin".to_string())
    );
}

#[test]
fn display_shows_the_current_span() {
    let (tracer, _) = test_tracer();

    let context = TraceContext::builder()
        .trace_id(TraceId::from(1))
        .span_id(SpanId::from(10))
        .sampled(true)
        .build()
        .unwrap();
    let span = tracer.to_span(context);
    let _guard = tracer.with_span_in_scope(Some(&span));

    assert_eq!(
        tracer.to_string(),
        "Tracer{currentSpan=0000000000000001/000000000000000a, finishedSpanHandler=TestReporter}"
    );
}

#[test]
fn display_flags_a_noop_tracer() {
    let (tracer, _) = test_tracer();
    tracer.set_noop(true);

    assert_eq!(
        tracer.to_string(),
        "Tracer{noop=true, finishedSpanHandler=TestReporter}"
    );

    assert!(tracer.new_trace().is_noop());
}

#[test]
fn noop_display_wins_over_an_open_scope() {
    let (tracer, _) = test_tracer();

    let span = tracer.new_trace();
    let _guard = tracer.with_span_in_scope(Some(&span));
    tracer.set_noop(true);

    assert_eq!(
        tracer.to_string(),
        "Tracer{noop=true, finishedSpanHandler=TestReporter}"
    );
}

#[test]
fn lookup_handles_do_not_own_the_record() {
    let (tracer, spans) = test_tracer();

    let span = tracer.new_trace();
    let lookup = tracer.to_span(span.context().clone());
    drop(lookup);
    assert!(spans.lock().is_empty());

    drop(span);
    assert_eq!(spans.lock().len(), 1);
}

#[test]
fn second_finish_is_ignored() {
    let (tracer, spans) = test_tracer();

    let span = tracer.new_trace();
    let first = tracer.to_span(span.context().clone());
    let second = tracer.to_span(span.context().clone());

    first.finish_with_timestamp(10);
    second.finish_with_timestamp(20);
    drop(span);

    assert_eq!(spans.lock().len(), 1);
}

#[test]
fn abandoned_spans_are_never_reported() {
    let (tracer, spans) = test_tracer();

    tracer.new_trace().abandon();
    assert!(spans.lock().is_empty());
}

#[test]
fn flushed_spans_have_no_duration() {
    let (tracer, spans) = test_tracer();

    let mut span = tracer.new_trace();
    span.start_with_timestamp(5);
    span.flush();

    let spans = spans.lock();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].timestamp, Some(5));
    assert_eq!(spans[0].duration, None);
}

#[test]
fn scoped_spans_finish_and_restore_on_drop() {
    let (tracer, spans) = test_tracer();

    {
        let mut scoped = tracer.start_scoped_span("work");
        scoped.tag("step", "one");
        assert_eq!(
            tracer.current_span().map(|s| s.context().clone()),
            Some(scoped.context().clone())
        );
    }

    assert!(tracer.current_span().is_none());

    let spans = spans.lock();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].name.as_deref(), Some("work"));
    assert_eq!(spans[0].tags["step"], "one");
    assert!(spans[0].duration.is_some());
}

#[test]
fn bound_futures_poll_under_their_context() {
    let (tracer, _) = test_tracer();

    let span = tracer.new_trace();
    let context = span.context().clone();

    let observed = futures::executor::block_on(tracer.bind(context.clone(), {
        let tracer = tracer.clone();
        async move { tracer.current_span().map(|s| s.context().clone()) }
    }));

    assert_eq!(observed, Some(context));
    assert!(tracer.current_span().is_none());
}

#[test]
fn global_registry_installs_once() {
    let (tracer, _) = test_tracer();

    crate::set_tracer(tracer.clone()).unwrap();
    assert!(crate::set_tracer(tracer).is_err());
    assert!(crate::tracer().is_some());

    crate::close_tracer();
    assert!(crate::tracer().is_none());

    let (replacement, _) = test_tracer();
    crate::set_tracer(replacement).unwrap();
    crate::close_tracer();
}
