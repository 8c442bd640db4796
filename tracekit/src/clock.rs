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

//! Span clocks.
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of span timestamps, in microseconds since the UNIX epoch.
///
/// Timestamps are injectable so that recorded durations can be made
/// deterministic in tests, or derived from a source synchronized with other
/// processes.
pub trait Clock {
    /// Returns the current time in microseconds since the UNIX epoch.
    fn now_micros(&self) -> u64;
}

/// A `Clock` backed by the system clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_micros(&self) -> u64 {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0));
        elapsed.as_secs() * 1_000_000 + u64::from(elapsed.subsec_nanos()) / 1_000
    }
}
