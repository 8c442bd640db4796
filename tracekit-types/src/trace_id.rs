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

//! Trace IDs.
use data_encoding::{DecodeError, HEXLOWER_PERMISSIVE};
use std::error::Error;
use std::fmt;
use std::str::FromStr;

/// The ID of a trace.
///
/// Trace IDs are 64 or 128 bits. A 128 bit ID has a nonzero high word and is
/// serialized as 32 hex characters; a 64 bit ID has a zero high word and is
/// serialized as 16.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TraceId {
    hi: u64,
    lo: u64,
}

impl TraceId {
    /// Creates a trace ID from its high and low 64 bit words.
    ///
    /// A high word of 0 produces a 64 bit ID.
    #[inline]
    pub fn new(hi: u64, lo: u64) -> TraceId {
        TraceId { hi, lo }
    }

    /// Returns the high 64 bits of the trace ID, 0 for a 64 bit ID.
    #[inline]
    pub fn high(&self) -> u64 {
        self.hi
    }

    /// Returns the low 64 bits of the trace ID.
    #[inline]
    pub fn low(&self) -> u64 {
        self.lo
    }

    /// Determines if this is a 128 bit trace ID.
    #[inline]
    pub fn is_128bit(&self) -> bool {
        self.hi != 0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hi != 0 {
            write!(fmt, "{:016x}{:016x}", self.hi, self.lo)
        } else {
            write!(fmt, "{:016x}", self.lo)
        }
    }
}

impl From<u64> for TraceId {
    #[inline]
    fn from(lo: u64) -> TraceId {
        TraceId { hi: 0, lo }
    }
}

impl From<[u8; 8]> for TraceId {
    #[inline]
    fn from(bytes: [u8; 8]) -> TraceId {
        TraceId {
            hi: 0,
            lo: u64::from_be_bytes(bytes),
        }
    }
}

impl From<[u8; 16]> for TraceId {
    #[inline]
    fn from(bytes: [u8; 16]) -> TraceId {
        let mut hi = [0; 8];
        let mut lo = [0; 8];
        hi.copy_from_slice(&bytes[..8]);
        lo.copy_from_slice(&bytes[8..]);
        TraceId {
            hi: u64::from_be_bytes(hi),
            lo: u64::from_be_bytes(lo),
        }
    }
}

impl FromStr for TraceId {
    type Err = TraceIdParseError;

    fn from_str(s: &str) -> Result<TraceId, TraceIdParseError> {
        match HEXLOWER_PERMISSIVE.decode_len(s.len()) {
            Ok(8) => {
                let mut buf = [0; 8];
                HEXLOWER_PERMISSIVE
                    .decode_mut(s.as_bytes(), &mut buf)
                    .map_err(|e| TraceIdParseError(Some(e.error)))?;
                Ok(TraceId::from(buf))
            }
            Ok(16) => {
                let mut buf = [0; 16];
                HEXLOWER_PERMISSIVE
                    .decode_mut(s.as_bytes(), &mut buf)
                    .map_err(|e| TraceIdParseError(Some(e.error)))?;
                Ok(TraceId::from(buf))
            }
            _ => Err(TraceIdParseError(None)),
        }
    }
}

#[cfg(feature = "serde")]
mod serde {
    use crate::trace_id::TraceId;
    use serde::de::{Error, Unexpected, Visitor};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::fmt;

    impl Serialize for TraceId {
        fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            s.collect_str(self)
        }
    }

    impl<'de> Deserialize<'de> for TraceId {
        fn deserialize<D>(d: D) -> Result<TraceId, D::Error>
        where
            D: Deserializer<'de>,
        {
            d.deserialize_str(V)
        }
    }

    struct V;

    impl<'de> Visitor<'de> for V {
        type Value = TraceId;

        fn expecting(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
            fmt.write_str("a hex-encoded trace ID")
        }

        fn visit_str<E>(self, v: &str) -> Result<TraceId, E>
        where
            E: Error,
        {
            v.parse()
                .map_err(|_| Error::invalid_value(Unexpected::Str(v), &self))
        }
    }
}

/// The error returned when parsing a `TraceId` from a string.
#[derive(Debug)]
pub struct TraceIdParseError(Option<DecodeError>);

impl fmt::Display for TraceIdParseError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str("error parsing trace ID: ")?;
        match self.0 {
            Some(ref err) => write!(fmt, "{}", err),
            None => fmt.write_str("invalid length"),
        }
    }
}

impl Error for TraceIdParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.0.as_ref().map(|e| e as _)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn short_round_trip() {
        let id = "0001020304050607".parse::<TraceId>().unwrap();
        assert_eq!(id.high(), 0);
        assert_eq!(id.low(), 0x0001_0203_0405_0607);
        assert!(!id.is_128bit());
        assert_eq!(id.to_string(), "0001020304050607");
    }

    #[test]
    fn long_round_trip() {
        let id = "48485a3953bb61246b221d5bc9e6496c"
            .parse::<TraceId>()
            .unwrap();
        assert!(id.is_128bit());
        assert_eq!(id.to_string(), "48485a3953bb61246b221d5bc9e6496c");
    }

    #[test]
    fn invalid_length() {
        assert!("02".parse::<TraceId>().is_err());
        assert!("".parse::<TraceId>().is_err());
    }
}
