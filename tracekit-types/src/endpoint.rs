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

//! Endpoints.
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// The network context of a node in the service graph.
///
/// Every field is optional; an endpoint with none of them set carries no
/// information and serializes as an empty object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Endpoint {
    /// The name of the service at this endpoint.
    #[cfg_attr(
        feature = "serde",
        serde(skip_serializing_if = "Option::is_none", default)
    )]
    pub service_name: Option<String>,

    /// The IPv4 address of the service.
    #[cfg_attr(
        feature = "serde",
        serde(skip_serializing_if = "Option::is_none", default)
    )]
    pub ipv4: Option<Ipv4Addr>,

    /// The IPv6 address of the service.
    #[cfg_attr(
        feature = "serde",
        serde(skip_serializing_if = "Option::is_none", default)
    )]
    pub ipv6: Option<Ipv6Addr>,

    /// The listen port of the service.
    #[cfg_attr(
        feature = "serde",
        serde(skip_serializing_if = "Option::is_none", default)
    )]
    pub port: Option<u16>,
}

impl Endpoint {
    /// Creates an endpoint carrying only a service name.
    pub fn named<S>(service_name: S) -> Endpoint
    where
        S: Into<String>,
    {
        Endpoint {
            service_name: Some(service_name.into()),
            ..Endpoint::default()
        }
    }

    /// Returns the endpoint with its IP address set, dispatching on address
    /// family.
    pub fn with_ip(mut self, ip: IpAddr) -> Endpoint {
        match ip {
            IpAddr::V4(addr) => self.ipv4 = Some(addr),
            IpAddr::V6(addr) => self.ipv6 = Some(addr),
        }
        self
    }

    /// Returns the endpoint with its IP address and port taken from a socket
    /// address.
    pub fn with_socket_addr(self, addr: SocketAddr) -> Endpoint {
        let mut endpoint = self.with_ip(addr.ip());
        endpoint.port = Some(addr.port());
        endpoint
    }
}
