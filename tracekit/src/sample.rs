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

//! Span samplers.
use crate::TraceId;

/// A sampler decides whether or not a span should be reported to the remote
/// collector based on its trace ID.
///
/// A trace context received from a remote service may already indicate if the
/// span should be sampled, but if it does not, a `Sample`r is responsible for
/// making that decision.
pub trait Sample {
    /// Returns `true` if the trace associated with the trace ID should be
    /// sampled.
    fn sample(&self, trace_id: TraceId) -> bool;
}

/// A `Sample`r which always returns `true`.
pub struct AlwaysSampler;

impl Sample for AlwaysSampler {
    fn sample(&self, _: TraceId) -> bool {
        true
    }
}

/// A `Sample`r which always returns `false`.
pub struct NeverSampler;

impl Sample for NeverSampler {
    fn sample(&self, _: TraceId) -> bool {
        false
    }
}

/// A `Sample`r which samples a fixed fraction of traces.
///
/// The decision is a deterministic function of the trace ID, so every node
/// in a cluster makes the same decision for a given trace.
pub struct ProbabilitySampler {
    threshold: u64,
}

impl ProbabilitySampler {
    /// Creates a sampler retaining the specified fraction of traces.
    ///
    /// The rate is clamped to the range `[0, 1]`. Rates are applied at a
    /// granularity of 0.01%.
    pub fn new(rate: f64) -> ProbabilitySampler {
        let rate = rate.max(0.).min(1.);
        ProbabilitySampler {
            threshold: (rate * 10_000.) as u64,
        }
    }
}

impl Sample for ProbabilitySampler {
    fn sample(&self, trace_id: TraceId) -> bool {
        trace_id.low() % 10_000 < self.threshold
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn probability_bounds() {
        let all = ProbabilitySampler::new(1.);
        let none = ProbabilitySampler::new(0.);
        for id in 1..100 {
            assert!(all.sample(TraceId::from(id)));
            assert!(!none.sample(TraceId::from(id)));
        }
    }

    #[test]
    fn probability_is_deterministic() {
        let sampler = ProbabilitySampler::new(0.5);
        let id = TraceId::from(1234);
        assert_eq!(sampler.sample(id), sampler.sample(id));
    }

    #[test]
    fn rate_clamped() {
        assert!(ProbabilitySampler::new(2.).sample(TraceId::from(9_999)));
        assert!(!ProbabilitySampler::new(-1.).sample(TraceId::from(1)));
    }
}
