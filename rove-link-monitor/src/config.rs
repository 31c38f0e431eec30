//
// Copyright (c) The Rove Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use regex::RegexSet;
use rove_utils::prefix::{PrefixForwardingAlgorithm, PrefixForwardingType};

use crate::error::Error;

// Key the persistent overrides record is stored under.
pub const CONFIG_STORE_KEY: &str = "link-monitor-config";

// Key prefix of the per-node adjacency database in the KvStore.
pub const ADJ_DB_KEY_PREFIX: &str = "adj:";

// Key prefix used by the node-label range allocator.
pub const NODE_LABEL_KEY_PREFIX: &str = "node-label-alloc:";

// Delay before the initial kernel snapshot request.
pub(crate) const INITIAL_SYNC_DELAY: Duration = Duration::from_millis(100);

// Link monitor configuration.
//
// Built programmatically by the daemon shell from its command line and
// configuration file; immutable once the monitor is started.
#[derive(Debug)]
pub struct Config {
    // Local node name; used to key everything this node publishes.
    pub node_name: String,
    // Areas this node participates in.
    pub areas: Vec<AreaConfig>,
    // Advertise IPv4 prefixes and next-hops.
    pub enable_v4: bool,
    // Run the per-area node label allocators and advertise labels.
    pub enable_segment_routing: bool,
    // Attach convergence perf events to published databases.
    pub enable_perf_measurement: bool,
    // Derive adjacency metrics from the measured round-trip time.
    pub use_rtt_metric: bool,
    // Drain state assumed when no persistent record exists.
    pub assume_drained: bool,
    // Force the drain state from `assume_drained`, overriding the persistent
    // record.
    pub override_drain_state: bool,
    // Link flap damping bounds.
    pub linkflap_initial_backoff: Duration,
    pub linkflap_max_backoff: Duration,
    // TTL of keys this node writes into the KvStore.
    pub kvstore_key_ttl: Duration,
    // Coalescing window of the debounced advertisers.
    pub throttle_timeout: Duration,
    // Kernel snapshot reconciliation period and its failure backoff bounds.
    pub platform_sync_interval: Duration,
    pub sync_initial_backoff: Duration,
    pub sync_max_backoff: Duration,
    // Hold applied to the initial adjacency and address advertisements.
    pub adj_hold_time: Duration,
    // Range the node label is allocated from.
    pub node_label_range: LabelRange,
    // Forwarding attributes stamped on redistributed prefixes.
    pub prefix_forwarding_type: PrefixForwardingType,
    pub prefix_forwarding_algorithm: PrefixForwardingAlgorithm,
}

// Per-area configuration: which interfaces take part in neighbor discovery
// and which have their addresses redistributed.
#[derive(Debug)]
pub struct AreaConfig {
    pub area_id: String,
    include: RegexSet,
    exclude: RegexSet,
    redistribute: RegexSet,
}

// Range of node labels allocated through the KvStore.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LabelRange {
    pub start: u32,
    pub end: u32,
}

// ===== impl Config =====

impl Config {
    pub fn new(node_name: impl Into<String>) -> Config {
        Config {
            node_name: node_name.into(),
            areas: Vec::new(),
            enable_v4: false,
            enable_segment_routing: false,
            enable_perf_measurement: false,
            use_rtt_metric: false,
            assume_drained: false,
            override_drain_state: false,
            linkflap_initial_backoff: Duration::from_secs(1),
            linkflap_max_backoff: Duration::from_secs(60),
            kvstore_key_ttl: Duration::from_secs(300),
            throttle_timeout: Duration::from_millis(50),
            platform_sync_interval: Duration::from_secs(60),
            sync_initial_backoff: Duration::from_millis(64),
            sync_max_backoff: Duration::from_millis(8192),
            adj_hold_time: Duration::from_secs(4),
            node_label_range: LabelRange::default(),
            prefix_forwarding_type: PrefixForwardingType::default(),
            prefix_forwarding_algorithm: PrefixForwardingAlgorithm::default(),
        }
    }

    pub fn area(&self, area_id: &str) -> Option<&AreaConfig> {
        self.areas.iter().find(|area| area.area_id == area_id)
    }

    pub fn area_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.areas.iter().map(|area| area.area_id.as_str())
    }

    // Returns whether the interface takes part in neighbor discovery in any
    // area.
    pub fn is_discovery_iface(&self, ifname: &str) -> bool {
        self.areas.iter().any(|area| area.is_discovery_iface(ifname))
    }

    // Returns whether the interface's addresses are redistributed in any
    // area.
    pub fn is_redistribute_iface(&self, ifname: &str) -> bool {
        self.areas
            .iter()
            .any(|area| area.is_redistribute_iface(ifname))
    }

    // An interface is tracked at all iff some area cares about it.
    pub fn is_relevant_iface(&self, ifname: &str) -> bool {
        self.is_discovery_iface(ifname) || self.is_redistribute_iface(ifname)
    }
}

// ===== impl AreaConfig =====

impl AreaConfig {
    pub fn new(
        area_id: impl Into<String>,
        include: &[&str],
        exclude: &[&str],
        redistribute: &[&str],
    ) -> Result<AreaConfig, Error> {
        Ok(AreaConfig {
            area_id: area_id.into(),
            include: compile_regexes(include)?,
            exclude: compile_regexes(exclude)?,
            redistribute: compile_regexes(redistribute)?,
        })
    }

    pub fn is_discovery_iface(&self, ifname: &str) -> bool {
        self.include.is_match(ifname) && !self.exclude.is_match(ifname)
    }

    pub fn is_redistribute_iface(&self, ifname: &str) -> bool {
        self.redistribute.is_match(ifname)
    }
}

// ===== impl LabelRange =====

impl LabelRange {
    pub fn contains(&self, label: u32) -> bool {
        (self.start..=self.end).contains(&label)
    }

    pub fn size(&self) -> u32 {
        self.end - self.start + 1
    }
}

impl Default for LabelRange {
    fn default() -> LabelRange {
        LabelRange {
            start: 101,
            end: 49999,
        }
    }
}

// ===== helper functions =====

// Interface matching is on the whole name, not a substring.
fn compile_regexes(patterns: &[&str]) -> Result<RegexSet, Error> {
    let anchored = patterns
        .iter()
        .map(|pattern| format!("^(?:{})$", pattern))
        .collect::<Vec<_>>();
    RegexSet::new(anchored).map_err(Error::InvalidRegex)
}
