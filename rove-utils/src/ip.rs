//
// Copyright (c) The Rove Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;

use ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};

// Extension methods for IpAddr.
pub trait IpAddrExt {
    // Returns true if this is a link-local address.
    fn is_link_local(&self) -> bool;

    // Returns true if this is a globally routable unicast address.
    fn is_global_unicast(&self) -> bool;
}

// Extension methods for IpNetwork.
pub trait IpNetworkExt {
    // Apply mask to prefix.
    #[must_use]
    fn apply_mask(&self) -> IpNetwork;
}

// ===== impl IpAddr =====

impl IpAddrExt for IpAddr {
    fn is_link_local(&self) -> bool {
        match self {
            IpAddr::V4(addr) => addr.is_link_local(),
            // fe80::/10
            IpAddr::V6(addr) => (addr.segments()[0] & 0xffc0) == 0xfe80,
        }
    }

    fn is_global_unicast(&self) -> bool {
        if self.is_unspecified()
            || self.is_loopback()
            || self.is_multicast()
            || self.is_link_local()
        {
            return false;
        }
        match self {
            IpAddr::V4(addr) => !addr.is_broadcast(),
            IpAddr::V6(_) => true,
        }
    }
}

// ===== impl IpNetwork =====

impl IpNetworkExt for IpNetwork {
    fn apply_mask(&self) -> IpNetwork {
        match self {
            IpNetwork::V4(network) => {
                // Prefix length is valid by construction.
                IpNetwork::V4(
                    Ipv4Network::new(network.network(), network.prefix())
                        .unwrap(),
                )
            }
            IpNetwork::V6(network) => IpNetwork::V6(
                Ipv6Network::new(network.network(), network.prefix()).unwrap(),
            ),
        }
    }
}
