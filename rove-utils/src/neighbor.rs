//
// Copyright (c) The Rove Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};
use std::net::{Ipv4Addr, Ipv6Addr};

use derive_new::new;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

// Event reported by the neighbor discovery component for a single neighbor
// on a single local interface.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct NeighborEvent {
    pub event: NeighborEventType,
    pub info: NeighborInfo,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum NeighborEventType {
    Up,
    Restarted,
    Restarting,
    Down,
    RttChange,
    // Event types introduced by newer neighbor discovery versions.
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct NeighborInfo {
    // Remote node name.
    pub node: String,
    // Area the neighbor session belongs to.
    pub area: String,
    // Local and remote interface names.
    pub local_ifname: String,
    pub remote_ifname: String,
    // Neighbor transport addresses.
    pub addr_v4: Option<Ipv4Addr>,
    pub addr_v6: Option<Ipv6Addr>,
    // Measured round-trip time in microseconds.
    pub rtt_us: i64,
    // Label the neighbor advertises for this adjacency.
    pub label: u32,
    // Ports the neighbor's KvStore and management plane listen on.
    pub kv_cmd_port: u16,
    pub ctrl_port: u16,
}

// Interface database pushed to the neighbor discovery and FIB components.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct InterfaceDatabase {
    pub node: String,
    pub interfaces: BTreeMap<String, InterfaceInfo>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct InterfaceInfo {
    pub up: bool,
    pub ifindex: u32,
    pub networks: BTreeSet<IpNetwork>,
}

// ===== impl NeighborEventType =====

impl NeighborEventType {
    // Returns the event name used in log samples.
    pub fn as_log_event(&self) -> &'static str {
        match self {
            NeighborEventType::Up => "NEIGHBOR_UP",
            NeighborEventType::Restarted => "NEIGHBOR_RESTARTED",
            NeighborEventType::Restarting => "NEIGHBOR_RESTARTING",
            NeighborEventType::Down => "NEIGHBOR_DOWN",
            NeighborEventType::RttChange => "NEIGHBOR_RTT_CHANGE",
            NeighborEventType::Unknown => "NEIGHBOR_UNKNOWN",
        }
    }
}

impl std::fmt::Display for NeighborEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_log_event())
    }
}
