//
// Copyright (c) The Rove Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use rove_utils::kvstore::{PeerSpec, Publication};
use rove_utils::lsdb::Adjacency;
use rove_utils::neighbor::{NeighborEvent, NeighborEventType, NeighborInfo};
use rove_utils::southbound::{
    AddressMsg, LinkEntry, LinkMsg, NetlinkEvent, NetlinkRequest,
    SnapshotError,
};
use rove_utils::task::Task;
use tokio::sync::oneshot;

use crate::adjacency::{AdjacencyKey, AdjacencyValue, rtt_metric};
use crate::advertise;
use crate::debug::Debug;
use crate::error::Error;
use crate::instance::Master;
use crate::tasks;
use crate::tasks::messages::input::ProtocolMsg;

// ===== Neighbor events =====

pub fn process_neighbor_event(master: &mut Master, event: NeighborEvent) {
    Debug::NeighborEventRx(&event).log();

    match event.event {
        NeighborEventType::Up | NeighborEventType::Restarted => {
            master.log_neighbor_event(&event);
            neighbor_up(master, event.info);
        }
        NeighborEventType::Restarting => {
            master.log_neighbor_event(&event);
            neighbor_restarting(master, event.info);
        }
        NeighborEventType::Down => {
            master.log_neighbor_event(&event);
            neighbor_down(master, event.info);
        }
        NeighborEventType::RttChange => {
            if !master.config.use_rtt_metric {
                return;
            }
            master.log_neighbor_event(&event);
            neighbor_rtt_change(master, event.info);
        }
        NeighborEventType::Unknown => {
            Error::UnknownNeighborEvent(event.info.node).log();
        }
    }
}

fn neighbor_up(master: &mut Master, info: NeighborInfo) {
    // The neighbor's link-local address carries both the next-hop and the
    // KvStore session endpoint.
    let Some(addr_v6) = info.addr_v6 else {
        Error::NeighborMissingTransportAddr(info.node, info.local_ifname)
            .log();
        return;
    };

    let metric = if master.config.use_rtt_metric {
        rtt_metric(info.rtt_us)
    } else {
        1
    };
    let weight = master
        .interfaces
        .get_by_name(&info.local_ifname)
        .map(|iface| iface.weight)
        .unwrap_or(1);

    let adjacency = Adjacency {
        other_node: info.node.clone(),
        ifname: info.local_ifname.clone(),
        other_ifname: info.remote_ifname.clone(),
        next_hop_v4: info.addr_v4,
        next_hop_v6: Some(addr_v6),
        metric,
        label: if master.config.enable_segment_routing {
            info.label
        } else {
            0
        },
        overloaded: false,
        rtt_us: if master.config.use_rtt_metric {
            info.rtt_us
        } else {
            0
        },
        timestamp: Utc::now().timestamp(),
        weight,
    };
    let peer_spec = PeerSpec::new(
        format!(
            "tcp://[{}%{}]:{}",
            addr_v6, info.local_ifname, info.kv_cmd_port
        ),
        format!("{}%{}", addr_v6, info.local_ifname),
        info.ctrl_port,
    );

    Debug::AdjacencyUp(&info.node, &info.local_ifname, metric).log();
    master.counters.neighbor_up += 1;

    // A repeated UP on the same (node, interface) replaces the old record.
    let key = AdjacencyKey::new(info.node.clone(), info.local_ifname.clone());
    master.adjacencies.insert(
        key,
        AdjacencyValue::new(
            info.area.clone(),
            peer_spec.clone(),
            adjacency,
            false,
        ),
    );

    // Advertise KvStore peers immediately, forcing a session (re)open even
    // when the endpoint did not change.
    let up_peers = BTreeMap::from([(info.node, peer_spec)]);
    advertise::kvstore_peers_area(master, &info.area, &up_peers);

    // Advertise the new adjacency in a debounced fashion.
    master.schedule_advertise_adjacencies();
}

fn neighbor_restarting(master: &mut Master, info: NeighborInfo) {
    Debug::AdjacencyRestarting(&info.node, &info.local_ifname).log();
    master.counters.neighbor_restarting += 1;

    // Restarting is a mutation, not a deletion; the adjacency stays
    // advertised but stops contributing a KvStore peer.
    let key = AdjacencyKey::new(info.node, info.local_ifname);
    if let Some(value) = master.adjacencies.get_mut(&key) {
        value.is_restarting = true;
    }
    let area = info.area;
    advertise::kvstore_peers_area(master, &area, &BTreeMap::new());
}

fn neighbor_down(master: &mut Master, info: NeighborInfo) {
    Debug::AdjacencyDown(&info.node, &info.local_ifname).log();
    master.counters.neighbor_down += 1;

    let key = AdjacencyKey::new(info.node, info.local_ifname);
    master.adjacencies.remove(&key);

    // Advertise both peers and adjacencies.
    advertise::kvstore_peers_area(master, &info.area, &BTreeMap::new());
    advertise::adjacencies_area(master, &info.area);
}

fn neighbor_rtt_change(master: &mut Master, info: NeighborInfo) {
    let metric = rtt_metric(info.rtt_us);
    let key = AdjacencyKey::new(info.node, info.local_ifname);
    let Some(value) = master.adjacencies.get_mut(&key) else {
        return;
    };
    value.adjacency.metric = metric;
    value.adjacency.rtt_us = info.rtt_us;
    Debug::AdjacencyRttChange(&key.node, &key.ifname, metric).log();
    master.schedule_advertise_adjacencies();
}

// ===== Netlink events =====

pub fn process_netlink_event(master: &mut Master, event: NetlinkEvent) {
    match event {
        NetlinkEvent::Link(msg) => link_event(master, msg),
        NetlinkEvent::Address(msg) => addr_event(master, msg),
    }
}

fn link_event(master: &mut Master, msg: LinkMsg) {
    // The ifindex cache covers every kernel interface, tracked or not.
    master
        .if_index_to_name
        .insert(msg.ifindex, msg.ifname.clone());

    if !master.config.is_relevant_iface(&msg.ifname) {
        return;
    }

    let initial = master.config.linkflap_initial_backoff;
    let maximum = master.config.linkflap_max_backoff;
    let outcome = master
        .interfaces
        .get_or_create(&msg.ifname, initial, maximum)
        .update_attrs(msg.ifindex, msg.flags, msg.weight);

    Debug::InterfaceUpdate(&msg.ifname, outcome.up, outcome.backoff_remaining)
        .log();
    if outcome.transitioned {
        master.log_link_event(
            &msg.ifname,
            outcome.was_up,
            outcome.up,
            outcome.backoff_remaining,
        );
    }
    if outcome.active_changed {
        master.schedule_advertise_iface_addr();
    }
}

fn addr_event(master: &mut Master, msg: AddressMsg) {
    let Some(ifname) = master.if_index_to_name.get(&msg.ifindex).cloned()
    else {
        Error::UnknownInterfaceIndex(msg.ifindex).log();
        return;
    };
    if !master.config.is_relevant_iface(&ifname) {
        return;
    }

    let initial = master.config.linkflap_initial_backoff;
    let maximum = master.config.linkflap_max_backoff;
    let updated = master
        .interfaces
        .get_or_create(&ifname, initial, maximum)
        .update_addr(msg.addr, msg.valid);
    if updated {
        Debug::InterfaceAddrUpdate(&ifname, &msg.addr, msg.valid).log();
        master.schedule_advertise_iface_addr();
    }
}

// ===== KvStore publications =====

pub fn process_kvstore_publication(
    master: &mut Master,
    publication: Publication,
) {
    // The only KvStore feedback the monitor consumes is the node label
    // election traffic.
    if let Some(allocator) = master.allocators.get_mut(&publication.area) {
        if let Some(label) = allocator.process_publication(&publication) {
            apply_node_label(master, label);
        }
    }
}

// ===== Internal protocol messages =====

pub fn process_protocol_msg(master: &mut Master, msg: ProtocolMsg) {
    match msg {
        ProtocolMsg::AdjHoldExpired => {
            Debug::AdjHoldExpired.log();
            master.adj_hold_timer = None;
            advertise::adjacencies(master);
            advertise::iface_addr(master);
        }
        ProtocolMsg::AdvertiseAdjacencies => {
            advertise::adjacencies(master);
        }
        ProtocolMsg::AdvertiseIfaceAddr => {
            advertise::iface_addr(master);
        }
        ProtocolMsg::SyncInterfaces => {
            sync_interfaces(master);
        }
        ProtocolMsg::LinkSnapshot(Ok(links)) => {
            apply_link_snapshot(master, links);
        }
        ProtocolMsg::LinkSnapshot(Err(error)) => {
            snapshot_failed(master, error);
        }
        ProtocolMsg::StartAllocator { area } => {
            let initial = (master.state.node_label != 0)
                .then_some(master.state.node_label);
            if let Some(allocator) = master.allocators.get_mut(&area) {
                allocator.start(initial);
            }
        }
        ProtocolMsg::AllocatorTimeout { area } => {
            if let Some(allocator) = master.allocators.get_mut(&area) {
                if let Some(label) = allocator.process_timeout() {
                    apply_node_label(master, label);
                }
            }
        }
    }
}

// Stores a newly allocated (or lost) node label and re-advertises.
fn apply_node_label(master: &mut Master, label: u32) {
    Debug::NodeLabelUpdate(label).log();
    master.state.node_label = label;
    master.persist_state();
    advertise::adjacencies(master);
}

// ===== Interface sync =====

// Requests the full kernel snapshot; the result comes back into the event
// loop as a protocol message, so no table is touched across the await.
fn sync_interfaces(master: &mut Master) {
    Debug::InterfaceSyncStart.log();

    let (responder, response) = oneshot::channel();
    if master
        .tx
        .netlink
        .send(NetlinkRequest::GetSnapshot { responder })
        .is_err()
    {
        snapshot_failed(
            master,
            SnapshotError::new("netlink transport unavailable".to_owned()),
        );
        return;
    }

    let protocol_tx = master.tx.protocol_input.clone();
    let mut task = Task::spawn(async move {
        let result = match response.await {
            Ok(result) => result,
            Err(_) => Err(SnapshotError::new(
                "netlink transport dropped the request".to_owned(),
            )),
        };
        let _ = protocol_tx.send(ProtocolMsg::LinkSnapshot(result));
    });
    task.detach();
}

// Reconciles the interface table against the kernel snapshot: updates link
// attributes, adds missing addresses and drops vanished ones.
fn apply_link_snapshot(master: &mut Master, links: Vec<LinkEntry>) {
    master.sync_backoff.report_success();

    let initial = master.config.linkflap_initial_backoff;
    let maximum = master.config.linkflap_max_backoff;
    let mut updated = false;

    for link in links {
        master
            .if_index_to_name
            .insert(link.ifindex, link.ifname.clone());
        if !master.config.is_relevant_iface(&link.ifname) {
            continue;
        }

        let outcome = master
            .interfaces
            .get_or_create(&link.ifname, initial, maximum)
            .update_attrs(link.ifindex, link.flags, link.weight);
        if outcome.transitioned {
            master.log_link_event(
                &link.ifname,
                outcome.was_up,
                outcome.up,
                outcome.backoff_remaining,
            );
        }
        updated |= outcome.active_changed;

        if let Some(iface) = master.interfaces.get_mut_by_name(&link.ifname) {
            let stale: Vec<_> = iface
                .networks
                .difference(&link.networks)
                .cloned()
                .collect();
            let fresh: Vec<_> = link
                .networks
                .difference(&iface.networks)
                .cloned()
                .collect();
            for addr in stale {
                iface.update_addr(addr, false);
                updated = true;
            }
            for addr in fresh {
                iface.update_addr(addr, true);
                updated = true;
            }
        }
    }

    if updated {
        master.schedule_advertise_iface_addr();
    }

    // Re-arm the periodic reconciliation.
    master.sync_timer = Some(tasks::platform_sync_timer(
        master.config.platform_sync_interval,
        &master.tx.protocol_input,
    ));
}

fn snapshot_failed(master: &mut Master, error: SnapshotError) {
    master.counters.sync_failures += 1;
    Error::SnapshotFailure(error).log();

    let delay = if master.if_index_to_name.is_empty() {
        // The interface table was never populated; retry immediately rather
        // than waiting out a backoff.
        Duration::ZERO
    } else {
        master.sync_backoff.report_error();
        master.sync_backoff.time_remaining(Instant::now())
    };
    master.sync_timer =
        Some(tasks::platform_sync_timer(delay, &master.tx.protocol_input));
}
