//
// Copyright (c) The Rove Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::time::Duration;

use rove_utils::kvstore::{
    KvRequest, KvStorePeerValue, PeerSpec, PeerUpdateRequest,
};
use rove_utils::lsdb::{Adjacency, AdjacencyDatabase, PerfEvents};
use rove_utils::neighbor::InterfaceDatabase;
use rove_utils::prefix::{
    DEFAULT_PATH_PREFERENCE, DEFAULT_SOURCE_PREFERENCE, PrefixEntry,
    PrefixType, PrefixUpdateCommand, PrefixUpdateRequest,
};

use crate::config::ADJ_DB_KEY_PREFIX;
use crate::debug::Debug;
use crate::error::Error;
use crate::instance::Master;

// ===== KvStore peer advertisement =====

// Recomputes the desired peer set of one area, diffs it against the
// previously announced one and pushes the delta to the KvStore driver.
//
// `up_peers` lists peers that were just observed UP: those are re-announced
// even when their endpoint did not change, forcing the driver to reopen the
// session. The hint is honored only for peers that are part of the desired
// set with a matching endpoint.
pub(crate) fn kvstore_peers_area(
    master: &mut Master,
    area: &str,
    up_peers: &BTreeMap<String, PeerSpec>,
) {
    let old_peers = std::mem::take(
        master.peers.entry(area.to_owned()).or_default(),
    );

    // Carry the initial-sync progress over for peers whose endpoint is
    // unchanged; an endpoint change restarts the session from scratch.
    let mut new_peers = BTreeMap::new();
    for (node, peer_spec) in master.adjacencies.peers(area) {
        let initial_synced = old_peers
            .get(&node)
            .filter(|old| old.peer_spec == peer_spec)
            .map(|old| old.initial_synced)
            .unwrap_or(false);
        new_peers
            .insert(node, KvStorePeerValue::new(peer_spec, initial_synced));
    }

    // Peers to delete.
    let mut peers_to_del = Vec::new();
    for (node, old) in &old_peers {
        if !new_peers.contains_key(node) {
            Debug::PeerDel(area, node).log();
            master.log_peer_event("DEL_PEER", node, &old.peer_spec);
            peers_to_del.push(node.clone());
        }
    }

    // Peers to add: new ones, and known ones whose endpoint changed
    // (parallel-link takeover).
    let mut peers_to_add = BTreeMap::new();
    for (node, new) in &new_peers {
        let changed = match old_peers.get(node) {
            Some(old) => old.peer_spec != new.peer_spec,
            None => true,
        };
        if changed {
            Debug::PeerAdd(area, node, &new.peer_spec).log();
            master.log_peer_event("ADD_PEER", node, &new.peer_spec);
            peers_to_add.insert(node.clone(), new.peer_spec.clone());
        }
    }

    for (node, peer_spec) in up_peers {
        if peers_to_add.contains_key(node) {
            continue;
        }
        // Honor the hint only when it matches the current record.
        match new_peers.get(node) {
            Some(new) if new.peer_spec == *peer_spec => {
                peers_to_add.insert(node.clone(), peer_spec.clone());
            }
            _ => (),
        }
    }

    master.peers.insert(area.to_owned(), new_peers);

    if peers_to_add.is_empty() && peers_to_del.is_empty() {
        return;
    }
    let _ = master.tx.peer_updates.send(PeerUpdateRequest::new(
        area.to_owned(),
        (!peers_to_add.is_empty()).then_some(peers_to_add),
        (!peers_to_del.is_empty()).then_some(peers_to_del),
    ));
}

// ===== Adjacency database advertisement =====

// Builds the adjacency database of one area, with the override rules
// applied: link overload bit, then link metric, then adjacency metric.
pub fn build_adjacency_db(master: &Master, area: &str) -> AdjacencyDatabase {
    let mut adjacencies = Vec::new();
    for (key, value) in master.adjacencies.iter() {
        if value.area != area || value.is_restarting {
            continue;
        }

        // NOTE: copy on purpose; overrides never touch the stored record.
        let mut adjacency: Adjacency = value.adjacency.clone();
        adjacency.overloaded =
            master.state.overloaded_links.contains(&adjacency.ifname);
        if let Some(metric) =
            master.state.link_metric_overrides.get(&adjacency.ifname)
        {
            adjacency.metric = *metric;
        }
        if let Some(metric) = master.state.adj_metric_overrides.get(key) {
            adjacency.metric = *metric;
        }
        adjacencies.push(adjacency);
    }

    let perf_events = master.config.enable_perf_measurement.then(|| {
        let mut perf_events = PerfEvents::default();
        perf_events.push(&master.config.node_name, "ADJ_DB_UPDATED");
        perf_events
    });

    AdjacencyDatabase::new(
        master.config.node_name.clone(),
        area.to_owned(),
        master.state.is_overloaded,
        if master.config.enable_segment_routing {
            master.state.node_label
        } else {
            0
        },
        adjacencies,
        perf_events,
    )
}

// Publishes the adjacency database of one area into the KvStore.
pub(crate) fn adjacencies_area(master: &mut Master, area: &str) {
    if master.hold_active() {
        return;
    }

    let db = build_adjacency_db(master, area);
    Debug::AdvertiseAdjacencies(area, db.adjacencies.len()).log();

    match serde_json::to_string(&db) {
        Ok(value) => {
            let _ = master.tx.kvstore.send(KvRequest::PersistKey {
                area: area.to_owned(),
                key: format!(
                    "{}{}",
                    ADJ_DB_KEY_PREFIX, master.config.node_name
                ),
                value,
                ttl: master.config.kvstore_key_ttl,
            });
            master.counters.advertise_adjacencies += 1;
        }
        Err(error) => Error::SerializeFailure(error).log(),
    }

    // The overrides are most likely what changed; rewrite the persistent
    // record.
    master.persist_state();

    // Refresh the gauges.
    master.counters.adjacencies = master.adjacencies.len() as u64;
    master.counters.neighbor_metric = master
        .adjacencies
        .iter()
        .map(|(key, value)| (key.node.clone(), value.adjacency.metric))
        .collect();
}

// Adjacency advertisement across all areas. Cancels a pending debounced
// advertisement, since it would only repeat this one.
pub(crate) fn adjacencies(master: &mut Master) {
    if master.hold_active() {
        return;
    }
    master.adj_throttle.cancel();

    let areas: Vec<_> =
        master.config.area_ids().map(str::to_owned).collect();
    for area in areas {
        adjacencies_area(master, &area);
    }
}

// ===== Interface and address advertisement =====

// Publishes the interface database and the redistributed prefixes, and arms
// a retry for interfaces still sitting out a flap-damping penalty.
pub(crate) fn iface_addr(master: &mut Master) {
    let retry = retry_time_on_unstable_interfaces(master);

    interfaces(master);
    redist_addrs(master);

    master.iface_throttle.cancel();

    if !retry.is_zero() {
        master.schedule_iface_retry(retry);
    }
}

// Publishes the interface database consumed by neighbor discovery and the
// FIB: every discovery-relevant interface, with the up bit replaced by the
// damped (active) view.
pub(crate) fn interfaces(master: &mut Master) {
    if master.hold_active() {
        return;
    }
    master.counters.advertise_links += 1;

    let mut interfaces = BTreeMap::new();
    for iface in master.interfaces.iter() {
        if !master.config.is_discovery_iface(&iface.name) {
            continue;
        }
        let mut info = iface.info();
        info.up = iface.is_active();
        interfaces.insert(iface.name.clone(), info);
    }

    Debug::AdvertiseInterfaces(interfaces.len()).log();
    let _ = master.tx.interface_updates.send(InterfaceDatabase::new(
        master.config.node_name.clone(),
        interfaces,
    ));
}

// Publishes the globally routable prefixes of active interfaces, one SYNC
// per area even when the list is empty.
pub(crate) fn redist_addrs(master: &mut Master) {
    if master.hold_active() {
        return;
    }

    for area in &master.config.areas {
        let mut prefixes = Vec::new();
        for iface in master.interfaces.iter() {
            if !iface.is_active()
                || !area.is_redistribute_iface(&iface.name)
            {
                continue;
            }
            for prefix in
                iface.global_unicast_networks(master.config.enable_v4)
            {
                let tags = [
                    "INTERFACE_SUBNET".to_owned(),
                    format!("{}:{}", master.config.node_name, iface.name),
                ]
                .into_iter()
                .collect();
                prefixes.push(PrefixEntry::new(
                    prefix,
                    PrefixType::Loopback,
                    master.config.prefix_forwarding_type,
                    master.config.prefix_forwarding_algorithm,
                    tags,
                    DEFAULT_PATH_PREFERENCE,
                    DEFAULT_SOURCE_PREFERENCE,
                ));
            }
        }

        Debug::AdvertiseRedistAddrs(&area.area_id, prefixes.len()).log();
        let _ = master.tx.prefix_updates.send(PrefixUpdateRequest::new(
            PrefixUpdateCommand::SyncPrefixesByType,
            Some(PrefixType::Loopback),
            prefixes,
            [area.area_id.clone()].into_iter().collect(),
        ));
    }
}

// Shortest remaining flap-damping penalty among UP but inactive interfaces;
// zero when none is pending.
fn retry_time_on_unstable_interfaces(master: &Master) -> Duration {
    master
        .interfaces
        .iter()
        .filter(|iface| !iface.is_active())
        .map(|iface| iface.backoff_remaining())
        .filter(|remaining| !remaining.is_zero())
        .map(|remaining| {
            std::cmp::min(remaining, master.config.linkflap_max_backoff)
        })
        .min()
        .unwrap_or(Duration::ZERO)
}
