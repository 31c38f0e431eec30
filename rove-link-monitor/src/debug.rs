//
// Copyright (c) The Rove Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use rove_utils::kvstore::PeerSpec;
use rove_utils::neighbor::NeighborEvent;
use tracing::{debug, debug_span, info};

// Link monitor debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    // Neighbor events
    NeighborEventRx(&'a NeighborEvent),
    AdjacencyUp(&'a str, &'a str, u32),
    AdjacencyRestarting(&'a str, &'a str),
    AdjacencyDown(&'a str, &'a str),
    AdjacencyRttChange(&'a str, &'a str, u32),
    // Interfaces
    InterfaceUpdate(&'a str, bool, Duration),
    InterfaceAddrUpdate(&'a str, &'a ipnetwork::IpNetwork, bool),
    InterfaceSyncStart,
    // Advertisement
    AdjHoldExpired,
    AdvertiseAdjacencies(&'a str, usize),
    AdvertiseInterfaces(usize),
    AdvertiseRedistAddrs(&'a str, usize),
    PeerAdd(&'a str, &'a str, &'a PeerSpec),
    PeerDel(&'a str, &'a str),
    // Node label allocation
    AllocatorStart(&'a str, u32),
    AllocatorPropose(&'a str, u32),
    NodeLabelUpdate(u32),
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::NeighborEventRx(event) => {
                debug!(event = %event.event, node = %event.info.node,
                    ifname = %event.info.local_ifname, area = %event.info.area,
                    "{}", self);
            }
            Debug::AdjacencyUp(node, ifname, metric) => {
                info!(%node, %ifname, %metric, "{}", self);
            }
            Debug::AdjacencyRestarting(node, ifname)
            | Debug::AdjacencyDown(node, ifname) => {
                info!(%node, %ifname, "{}", self);
            }
            Debug::AdjacencyRttChange(node, ifname, metric) => {
                debug!(%node, %ifname, %metric, "{}", self);
            }
            Debug::InterfaceUpdate(ifname, up, backoff) => {
                debug_span!("interface", name = %ifname).in_scope(|| {
                    debug!(%up, backoff_ms = %backoff.as_millis(), "{}", self);
                })
            }
            Debug::InterfaceAddrUpdate(ifname, addr, valid) => {
                debug_span!("interface", name = %ifname).in_scope(|| {
                    debug!(%addr, %valid, "{}", self);
                })
            }
            Debug::InterfaceSyncStart | Debug::AdjHoldExpired => {
                debug!("{}", self);
            }
            Debug::AdvertiseAdjacencies(area, count) => {
                info!(%area, %count, "{}", self);
            }
            Debug::AdvertiseInterfaces(count) => {
                debug!(%count, "{}", self);
            }
            Debug::AdvertiseRedistAddrs(area, count) => {
                debug!(%area, %count, "{}", self);
            }
            Debug::PeerAdd(area, node, peer_spec) => {
                info!(%area, %node, cmd_url = %peer_spec.cmd_url, "{}", self);
            }
            Debug::PeerDel(area, node) => {
                info!(%area, %node, "{}", self);
            }
            Debug::AllocatorStart(area, label) => {
                debug!(%area, %label, "{}", self);
            }
            Debug::AllocatorPropose(area, label) => {
                debug!(%area, %label, "{}", self);
            }
            Debug::NodeLabelUpdate(label) => {
                info!(%label, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::NeighborEventRx(..) => {
                write!(f, "neighbor event")
            }
            Debug::AdjacencyUp(..) => {
                write!(f, "neighbor is up")
            }
            Debug::AdjacencyRestarting(..) => {
                write!(f, "neighbor is restarting")
            }
            Debug::AdjacencyDown(..) => {
                write!(f, "neighbor is down")
            }
            Debug::AdjacencyRttChange(..) => {
                write!(f, "neighbor rtt changed")
            }
            Debug::InterfaceUpdate(..) => {
                write!(f, "interface update")
            }
            Debug::InterfaceAddrUpdate(..) => {
                write!(f, "interface address update")
            }
            Debug::InterfaceSyncStart => {
                write!(f, "syncing interfaces from the kernel snapshot")
            }
            Debug::AdjHoldExpired => {
                write!(f, "initial hold expired")
            }
            Debug::AdvertiseAdjacencies(..) => {
                write!(f, "advertising adjacency database")
            }
            Debug::AdvertiseInterfaces(..) => {
                write!(f, "advertising interface database")
            }
            Debug::AdvertiseRedistAddrs(..) => {
                write!(f, "advertising redistributed prefixes")
            }
            Debug::PeerAdd(..) => {
                write!(f, "adding KvStore peer")
            }
            Debug::PeerDel(..) => {
                write!(f, "deleting KvStore peer")
            }
            Debug::AllocatorStart(..) => {
                write!(f, "starting node label allocation")
            }
            Debug::AllocatorPropose(..) => {
                write!(f, "proposing node label")
            }
            Debug::NodeLabelUpdate(..) => {
                write!(f, "node label updated")
            }
        }
    }
}
