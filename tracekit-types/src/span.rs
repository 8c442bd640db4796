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

//! Spans.
use crate::{Annotation, Endpoint, SpanId, TraceId};
use std::collections::HashMap;

/// The "kind" of a span.
///
/// The kind determines how a span's timestamp, duration, and remote endpoint
/// are interpreted: on the client side of an RPC the timestamp is the moment
/// the request was sent and the remote endpoint is the server, on the server
/// side the reverse, and for messaging spans the remote endpoint is the
/// broker.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
#[non_exhaustive]
pub enum Kind {
    /// The client side of an RPC.
    Client,
    /// The server side of an RPC.
    Server,
    /// A message sent to a message broker.
    Producer,
    /// A message received from a message broker.
    Consumer,
}

/// The finished record of a single operation over some range of time.
///
/// Multiple spans make up a single "trace" of a distributed computation, and
/// spans can be nested. A new trace is created with a "root" span, and
/// subsections of that computation are recorded in individual spans.
///
/// A span tracing a remote call typically produces two records, one from
/// each side; they share an `id` and are told apart by their `kind` and the
/// `shared` flag on the server record.
///
/// This is plain data: the code that finalizes a span fills the fields in
/// directly, and with the `serde` feature enabled the record serializes in
/// the standard Zipkin v2 shape.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Span {
    /// The randomly generated, unique identifier of the trace, set on all
    /// spans within it.
    pub trace_id: TraceId,

    /// The parent span ID, or `None` if this is the root span of the trace.
    #[cfg_attr(
        feature = "serde",
        serde(skip_serializing_if = "Option::is_none", default)
    )]
    pub parent_id: Option<SpanId>,

    /// The unique 64 bit identifier of this operation within the trace.
    pub id: SpanId,

    /// The kind of operation this span represents, absent for local or
    /// incomplete spans.
    #[cfg_attr(
        feature = "serde",
        serde(skip_serializing_if = "Option::is_none", default)
    )]
    pub kind: Option<Kind>,

    /// The logical, lowercase name of the operation (e.g. an RPC method).
    ///
    /// Names are lookup labels, so they should be low cardinality: do not
    /// embed variables here.
    #[cfg_attr(
        feature = "serde",
        serde(skip_serializing_if = "Option::is_none", default)
    )]
    pub name: Option<String>,

    /// When the operation started, in microseconds since the UNIX epoch.
    #[cfg_attr(
        feature = "serde",
        serde(skip_serializing_if = "Option::is_none", default)
    )]
    pub timestamp: Option<u64>,

    /// How long the critical path took, in microseconds.
    ///
    /// Producers round this up to a minimum of 1. Children can outlast their
    /// parents due to asynchronous work.
    #[cfg_attr(
        feature = "serde",
        serde(skip_serializing_if = "Option::is_none", default)
    )]
    pub duration: Option<u64>,

    /// Whether this span is part of a forcibly sampled trace, to be kept
    /// regardless of the sampling configuration.
    #[cfg_attr(
        feature = "serde",
        serde(skip_serializing_if = "std::ops::Not::not", default)
    )]
    pub debug: bool,

    /// Whether this span was started by another tracer (e.g. on a different
    /// host).
    #[cfg_attr(
        feature = "serde",
        serde(skip_serializing_if = "std::ops::Not::not", default)
    )]
    pub shared: bool,

    /// The host that recorded this span, primarily for query by service
    /// name.
    #[cfg_attr(
        feature = "serde",
        serde(skip_serializing_if = "Option::is_none", default)
    )]
    pub local_endpoint: Option<Endpoint>,

    /// The other side of the connection for RPC or messaging spans.
    #[cfg_attr(
        feature = "serde",
        serde(skip_serializing_if = "Option::is_none", default)
    )]
    pub remote_endpoint: Option<Endpoint>,

    /// Timestamped events that explain latency.
    #[cfg_attr(
        feature = "serde",
        serde(skip_serializing_if = "Vec::is_empty", default)
    )]
    pub annotations: Vec<Annotation>,

    /// String labels giving the span context for search, viewing, and
    /// analysis.
    #[cfg_attr(
        feature = "serde",
        serde(skip_serializing_if = "HashMap::is_empty", default)
    )]
    pub tags: HashMap<String, String>,
}

impl Span {
    /// Creates an otherwise-empty record for the identified operation.
    pub fn new(trace_id: TraceId, id: SpanId) -> Span {
        Span {
            trace_id,
            parent_id: None,
            id,
            kind: None,
            name: None,
            timestamp: None,
            duration: None,
            debug: false,
            shared: false,
            local_endpoint: None,
            remote_endpoint: None,
            annotations: vec![],
            tags: HashMap::new(),
        }
    }
}

#[cfg(all(test, feature = "serde"))]
mod test {
    use super::*;

    #[test]
    fn minimal_record_has_ids_only() {
        let span = Span::new(TraceId::from(1), SpanId::from(10));
        assert_eq!(
            serde_json::to_string(&span).unwrap(),
            r#"{"traceId":"0000000000000001","id":"000000000000000a"}"#
        );
    }

    #[test]
    fn server_record_shape() {
        let mut span = Span::new(TraceId::from(1), SpanId::from(10));
        span.name = Some("get /".to_string());
        span.kind = Some(Kind::Server);
        span.shared = true;
        span.timestamp = Some(2);
        span.duration = Some(1);
        span.tags.insert("error".to_string(), "boom".to_string());

        let json = serde_json::to_value(&span).unwrap();
        assert_eq!(json["traceId"], "0000000000000001");
        assert_eq!(json["id"], "000000000000000a");
        assert_eq!(json["name"], "get /");
        assert_eq!(json["kind"], "SERVER");
        assert_eq!(json["shared"], true);
        assert_eq!(json["timestamp"], 2);
        assert_eq!(json["duration"], 1);
        assert_eq!(json["tags"]["error"], "boom");
        assert!(json.get("parentId").is_none());
        assert!(json.get("debug").is_none());
    }
}
