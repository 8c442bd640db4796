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

//! Annotations.

/// A timestamped event that explains latency.
///
/// Unlike log statements, annotation values are often codes, e.g. "ws" for
/// WireSend.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Annotation {
    /// When the event occurred, in microseconds since the UNIX epoch.
    pub timestamp: u64,
    /// What happened at the timestamp.
    pub value: String,
}

impl Annotation {
    /// Creates an annotation.
    pub fn new<V>(timestamp: u64, value: V) -> Annotation
    where
        V: Into<String>,
    {
        Annotation {
            timestamp,
            value: value.into(),
        }
    }
}
