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

//! Span recording.
//!
//! While a span is open its state accumulates in a [`MutableSpan`] owned by
//! the tracer's recorder, keyed on the span's context. Users only reach the
//! accumulator through `Span` and `SpanCustomizer` handles, or by borrowing
//! it in a [`SpanHandler`](crate::SpanHandler) once the span is finished.
use crate::TraceContext;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracekit_types::{Annotation, Endpoint, Kind, Span};

/// The accumulator for the state of one open span.
#[derive(Debug, Clone)]
pub struct MutableSpan {
    name: Option<String>,
    kind: Option<Kind>,
    start_timestamp: Option<u64>,
    finish_timestamp: Option<u64>,
    annotations: Vec<(u64, String)>,
    tags: HashMap<String, String>,
    local_endpoint: Option<Endpoint>,
    remote_endpoint: Option<Endpoint>,
    error: Option<String>,
}

impl MutableSpan {
    pub(crate) fn new(local_endpoint: Option<Endpoint>) -> MutableSpan {
        MutableSpan {
            name: None,
            kind: None,
            start_timestamp: None,
            finish_timestamp: None,
            annotations: vec![],
            tags: HashMap::new(),
            local_endpoint,
            remote_endpoint: None,
            error: None,
        }
    }

    /// Returns the name of the span.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Sets the name of the span.
    pub fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
    }

    /// Returns the kind of the span.
    pub fn kind(&self) -> Option<Kind> {
        self.kind
    }

    /// Sets the kind of the span.
    pub fn set_kind(&mut self, kind: Kind) {
        self.kind = Some(kind);
    }

    /// Returns the start timestamp of the span, in microseconds since the
    /// UNIX epoch.
    pub fn start_timestamp(&self) -> Option<u64> {
        self.start_timestamp
    }

    /// Sets the start timestamp of the span.
    pub fn set_start_timestamp(&mut self, timestamp: u64) {
        self.start_timestamp = Some(timestamp);
    }

    /// Returns the finish timestamp of the span, in microseconds since the
    /// UNIX epoch.
    pub fn finish_timestamp(&self) -> Option<u64> {
        self.finish_timestamp
    }

    /// Sets the finish timestamp of the span.
    pub fn set_finish_timestamp(&mut self, timestamp: u64) {
        self.finish_timestamp = Some(timestamp);
    }

    /// Returns the duration of the span, if both timestamps are known.
    ///
    /// Durations are rounded up to a minimum of 1µs.
    pub fn duration_micros(&self) -> Option<u64> {
        match (self.start_timestamp, self.finish_timestamp) {
            (Some(start), Some(finish)) => Some(finish.saturating_sub(start).max(1)),
            _ => None,
        }
    }

    /// Returns the annotations attached to the span as `(timestamp, value)`
    /// pairs.
    pub fn annotations(&self) -> &[(u64, String)] {
        &self.annotations
    }

    /// Attaches an annotation to the span.
    pub fn annotate(&mut self, timestamp: u64, value: &str) {
        self.annotations.push((timestamp, value.to_string()));
    }

    /// Returns the value of a tag on the span.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(|v| &**v)
    }

    /// Returns the tags attached to the span.
    pub fn tags(&self) -> &HashMap<String, String> {
        &self.tags
    }

    /// Attaches a tag to the span.
    pub fn set_tag(&mut self, key: &str, value: &str) {
        self.tags.insert(key.to_string(), value.to_string());
    }

    /// Returns the host recording the span.
    pub fn local_endpoint(&self) -> Option<&Endpoint> {
        self.local_endpoint.as_ref()
    }

    /// Sets the host recording the span.
    pub fn set_local_endpoint(&mut self, endpoint: Endpoint) {
        self.local_endpoint = Some(endpoint);
    }

    /// Returns the other side of the connection for RPC or messaging spans.
    pub fn remote_endpoint(&self) -> Option<&Endpoint> {
        self.remote_endpoint.as_ref()
    }

    /// Sets the other side of the connection for RPC or messaging spans.
    pub fn set_remote_endpoint(&mut self, endpoint: Endpoint) {
        self.remote_endpoint = Some(endpoint);
    }

    /// Returns the error attached to the span.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Attaches an error to the span.
    pub fn set_error(&mut self, error: &str) {
        self.error = Some(error.to_string());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct Recorder {
    pending: Mutex<HashMap<TraceContext, MutableSpan>>,
}

impl Recorder {
    pub fn new() -> Recorder {
        Recorder {
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn ensure(&self, context: &TraceContext, local_endpoint: &Endpoint) {
        lock(&self.pending)
            .entry(context.clone())
            .or_insert_with(|| MutableSpan::new(Some(local_endpoint.clone())));
    }

    pub fn with_span<F>(&self, context: &TraceContext, local_endpoint: &Endpoint, f: F)
    where
        F: FnOnce(&mut MutableSpan),
    {
        let mut pending = lock(&self.pending);
        let span = pending
            .entry(context.clone())
            .or_insert_with(|| MutableSpan::new(Some(local_endpoint.clone())));
        f(span);
    }

    pub fn take(&self, context: &TraceContext) -> Option<MutableSpan> {
        lock(&self.pending).remove(context)
    }
}

/// Converts a finished accumulator into its wire form.
pub(crate) fn to_wire(context: &TraceContext, span: &MutableSpan) -> Span {
    let mut tags = span.tags().clone();
    if let Some(error) = span.error() {
        tags.entry("error".to_string())
            .or_insert_with(|| error.to_string());
    }

    Span {
        trace_id: context.trace_id(),
        parent_id: context.parent_id(),
        id: context.span_id(),
        kind: span.kind(),
        name: span.name().map(|name| name.to_lowercase()),
        timestamp: span.start_timestamp(),
        duration: span.duration_micros(),
        debug: context.debug(),
        shared: context.shared(),
        local_endpoint: span.local_endpoint().cloned(),
        remote_endpoint: span.remote_endpoint().cloned(),
        annotations: span
            .annotations()
            .iter()
            .map(|(timestamp, value)| Annotation::new(*timestamp, value.as_str()))
            .collect(),
        tags,
    }
}
