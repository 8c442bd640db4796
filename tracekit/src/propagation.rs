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

//! Context propagation plugins.
//!
//! Wire-format codecs (B3 headers, W3C traceparent, and so on) are out of
//! scope for this crate; they are written against the [`Propagate`] trait,
//! which lets them veto joins, demand 128 bit trace IDs, and attach state to
//! every context the tracer creates.
use crate::TraceContext;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A propagation plugin.
///
/// The tracer consults the plugin when normalizing its configuration and
/// passes every context it manufactures through `decorate`.
pub trait Propagate {
    /// Determines if the propagation format can represent a joined (shared)
    /// span.
    ///
    /// When `false`, the tracer downgrades `join_span` to `new_child`.
    fn supports_join(&self) -> bool {
        true
    }

    /// Determines if the propagation format requires 128 bit trace IDs.
    ///
    /// When `true`, the tracer always generates 128 bit trace IDs.
    fn requires_128bit_trace_id(&self) -> bool {
        false
    }

    /// Inspects and possibly rewrites a newly created context.
    ///
    /// This is the plugin's opportunity to attach state bundles that ride
    /// along with the context for the rest of the trace.
    fn decorate(&self, context: TraceContext) -> TraceContext {
        context
    }
}

/// A `Propagate` plugin with default behavior: joins supported, 64 bit trace
/// IDs, contexts untouched.
pub struct NopPropagation;

impl Propagate for NopPropagation {}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A set of named fields carried along a trace.
///
/// The bundle is shared by reference between a context and all of its
/// in-process descendants, so a field set through any of those contexts is
/// visible through the others.
#[derive(Debug)]
pub struct ExtraFields {
    names: Vec<String>,
    values: Mutex<HashMap<String, String>>,
}

impl ExtraFields {
    fn new(names: Vec<String>) -> ExtraFields {
        ExtraFields {
            names,
            values: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the value of a field in the bundle attached to a context.
    pub fn get(context: &TraceContext, name: &str) -> Option<String> {
        let fields = context.find_extra::<ExtraFields>()?;
        lock(&fields.values).get(name).cloned()
    }

    /// Sets the value of a field in the bundle attached to a context.
    ///
    /// Fields not declared by the propagation plugin are silently ignored,
    /// as is a context carrying no bundle at all.
    pub fn set(context: &TraceContext, name: &str, value: &str) {
        if let Some(fields) = context.find_extra::<ExtraFields>() {
            if fields.names.iter().any(|n| n == name) {
                lock(&fields.values).insert(name.to_string(), value.to_string());
            }
        }
    }
}

/// A propagation plugin carrying a declared set of fields along the trace.
pub struct ExtraFieldPropagation {
    names: Vec<String>,
}

impl ExtraFieldPropagation {
    /// Creates a plugin propagating the named fields.
    pub fn new<I, S>(names: I) -> ExtraFieldPropagation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ExtraFieldPropagation {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl Propagate for ExtraFieldPropagation {
    fn decorate(&self, context: TraceContext) -> TraceContext {
        if context.find_extra::<ExtraFields>().is_some() {
            return context;
        }

        context.with_extra(Arc::new(ExtraFields::new(self.names.clone())))
    }
}
