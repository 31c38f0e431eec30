//
// Copyright (c) The Rove Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use rove_utils::Responder;
use rove_utils::lsdb::AdjacencyDatabase;
use rove_utils::neighbor::InterfaceInfo;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::adjacency::AdjacencyKey;
use crate::advertise;
use crate::error::Error;
use crate::instance::Master;

// Management requests, processed on the dispatcher context.
//
// Mutations are idempotent: asking for the current state answers success
// without advertising anything.
#[derive(Debug)]
pub enum Request {
    // Set/unset the node drain bit.
    SetNodeOverload {
        overload: bool,
        responder: Responder<Result<(), Error>>,
    },
    // Set/unset a link drain bit.
    SetInterfaceOverload {
        ifname: String,
        overload: bool,
        responder: Responder<Result<(), Error>>,
    },
    // Set (`Some`) or clear (`None`) a link metric override.
    SetLinkMetric {
        ifname: String,
        metric: Option<u32>,
        responder: Responder<Result<(), Error>>,
    },
    // Set or clear an adjacency metric override.
    SetAdjacencyMetric {
        node: String,
        ifname: String,
        metric: Option<u32>,
        responder: Responder<Result<(), Error>>,
    },
    // Dump the interface table.
    GetInterfaces {
        responder: Responder<DumpLinksReply>,
    },
    // Dump the adjacency databases of the selected areas (all areas when
    // the filter is empty).
    GetAdjacencies {
        areas: BTreeSet<String>,
        responder: Responder<Vec<AdjacencyDatabase>>,
    },
}

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct DumpLinksReply {
    pub node: String,
    pub overloaded: bool,
    pub interface_details: BTreeMap<String, InterfaceDetails>,
}

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct InterfaceDetails {
    pub info: InterfaceInfo,
    pub overloaded: bool,
    pub metric_override: Option<u32>,
    // Remaining flap-damping penalty, when one is charged.
    pub backoff_remaining: Option<Duration>,
}

// ===== global functions =====

pub fn process_request(master: &mut Master, request: Request) {
    match request {
        Request::SetNodeOverload {
            overload,
            responder,
        } => {
            let result = set_node_overload(master, overload);
            let _ = responder.send(result);
        }
        Request::SetInterfaceOverload {
            ifname,
            overload,
            responder,
        } => {
            let result = set_interface_overload(master, ifname, overload);
            let _ = responder.send(result);
        }
        Request::SetLinkMetric {
            ifname,
            metric,
            responder,
        } => {
            let result = set_link_metric(master, ifname, metric);
            let _ = responder.send(result);
        }
        Request::SetAdjacencyMetric {
            node,
            ifname,
            metric,
            responder,
        } => {
            let result = set_adjacency_metric(master, node, ifname, metric);
            let _ = responder.send(result);
        }
        Request::GetInterfaces { responder } => {
            let _ = responder.send(get_interfaces(master));
        }
        Request::GetAdjacencies { areas, responder } => {
            let _ = responder.send(get_adjacencies(master, areas));
        }
    }
}

// ===== helper functions =====

fn set_node_overload(
    master: &mut Master,
    overload: bool,
) -> Result<(), Error> {
    if master.state.is_overloaded == overload {
        info!(%overload, "node already in the requested drain state");
        return Ok(());
    }

    master.state.is_overloaded = overload;
    master.persist_state();
    info!(%overload, "node drain state changed");

    // Drain changes go out immediately, not debounced.
    advertise::adjacencies(master);
    Ok(())
}

fn set_interface_overload(
    master: &mut Master,
    ifname: String,
    overload: bool,
) -> Result<(), Error> {
    if master.interfaces.get_by_name(&ifname).is_none() {
        let error = Error::InterfaceNotFound(ifname);
        error.log();
        return Err(error);
    }
    if overload == master.state.overloaded_links.contains(&ifname) {
        info!(%ifname, %overload, "link already in the requested drain state");
        return Ok(());
    }

    if overload {
        master.state.overloaded_links.insert(ifname.clone());
    } else {
        master.state.overloaded_links.remove(&ifname);
    }
    master.persist_state();
    info!(%ifname, %overload, "link drain state changed");

    master.schedule_advertise_adjacencies();
    Ok(())
}

fn set_link_metric(
    master: &mut Master,
    ifname: String,
    metric: Option<u32>,
) -> Result<(), Error> {
    if master.interfaces.get_by_name(&ifname).is_none() {
        let error = Error::InterfaceNotFound(ifname);
        error.log();
        return Err(error);
    }
    if master.state.link_metric_overrides.get(&ifname).copied() == metric {
        info!(%ifname, "link metric override already in the requested state");
        return Ok(());
    }

    match metric {
        Some(metric) => {
            master.state.link_metric_overrides.insert(ifname.clone(), metric);
            info!(%ifname, %metric, "link metric override set");
        }
        None => {
            master.state.link_metric_overrides.remove(&ifname);
            info!(%ifname, "link metric override cleared");
        }
    }
    master.persist_state();

    master.schedule_advertise_adjacencies();
    Ok(())
}

fn set_adjacency_metric(
    master: &mut Master,
    node: String,
    ifname: String,
    metric: Option<u32>,
) -> Result<(), Error> {
    let key = AdjacencyKey::new(node, ifname);
    if !master.adjacencies.contains(&key) {
        let error = Error::AdjacencyNotFound(key.node, key.ifname);
        error.log();
        return Err(error);
    }
    if master.state.adj_metric_overrides.get(&key).copied() == metric {
        info!(adjacency = %key, "adjacency metric override already in the requested state");
        return Ok(());
    }

    match metric {
        Some(metric) => {
            master.state.adj_metric_overrides.insert(key.clone(), metric);
            info!(adjacency = %key, %metric, "adjacency metric override set");
        }
        None => {
            master.state.adj_metric_overrides.remove(&key);
            info!(adjacency = %key, "adjacency metric override cleared");
        }
    }
    master.persist_state();

    master.schedule_advertise_adjacencies();
    Ok(())
}

fn get_interfaces(master: &Master) -> DumpLinksReply {
    let mut interface_details = BTreeMap::new();
    for iface in master.interfaces.iter() {
        let backoff_remaining = iface.backoff_remaining();
        interface_details.insert(
            iface.name.clone(),
            InterfaceDetails {
                info: iface.info(),
                overloaded: master
                    .state
                    .overloaded_links
                    .contains(&iface.name),
                metric_override: master
                    .state
                    .link_metric_overrides
                    .get(&iface.name)
                    .copied(),
                backoff_remaining: (!backoff_remaining.is_zero())
                    .then_some(backoff_remaining),
            },
        );
    }
    DumpLinksReply {
        node: master.config.node_name.clone(),
        overloaded: master.state.is_overloaded,
        interface_details,
    }
}

fn get_adjacencies(
    master: &Master,
    areas: BTreeSet<String>,
) -> Vec<AdjacencyDatabase> {
    master
        .config
        .area_ids()
        .filter(|area| areas.is_empty() || areas.contains(*area))
        .map(|area| advertise::build_adjacency_db(master, area))
        .collect()
}
