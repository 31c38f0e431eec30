//
// Copyright (c) The Rove Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{Ipv4Addr, Ipv6Addr};

use chrono::Utc;
use derive_new::new;
use serde::{Deserialize, Serialize};

// One directed adjacency from this node over a local interface to a remote
// node, as advertised in the routing database.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Adjacency {
    pub other_node: String,
    // Local and remote interface names.
    pub ifname: String,
    pub other_ifname: String,
    pub next_hop_v4: Option<Ipv4Addr>,
    pub next_hop_v6: Option<Ipv6Addr>,
    pub metric: u32,
    // Adjacency label announced by the neighbor (0 when segment routing is
    // disabled).
    pub label: u32,
    pub overloaded: bool,
    pub rtt_us: i64,
    // Seconds since the Unix epoch at adjacency establishment.
    pub timestamp: i64,
    pub weight: u64,
}

// Per-node adjacency database published into the KvStore, one per area.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct AdjacencyDatabase {
    pub node: String,
    pub area: String,
    pub overloaded: bool,
    pub node_label: u32,
    pub adjacencies: Vec<Adjacency>,
    pub perf_events: Option<PerfEvents>,
}

// Convergence measurement breadcrumbs attached to published databases.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PerfEvents {
    pub events: Vec<PerfEvent>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct PerfEvent {
    pub node: String,
    pub event: String,
    pub unix_ts_ms: i64,
}

// ===== impl PerfEvents =====

impl PerfEvents {
    // Records an event stamped with the current time.
    pub fn push(&mut self, node: &str, event: &str) {
        self.events.push(PerfEvent::new(
            node.to_owned(),
            event.to_owned(),
            Utc::now().timestamp_millis(),
        ));
    }
}
