//
// Copyright (c) The Rove Project Contributors
//
// SPDX-License-Identifier: MIT
//

#![allow(dead_code)]

mod api;
mod interfaces;
mod state;

use std::net::Ipv6Addr;

use rove_link_monitor::api::Request;
use rove_link_monitor::config::{AreaConfig, Config};
use rove_link_monitor::instance::{Master, MonitorChannelsTx};
use rove_link_monitor::tasks::messages::input::ProtocolMsg;
use rove_link_monitor::{advertise, events};
use rove_utils::kvstore::{
    KeyValue, KvRequest, Publication, PeerUpdateRequest,
};
use rove_utils::log::LogSample;
use rove_utils::lsdb::AdjacencyDatabase;
use rove_utils::neighbor::{
    InterfaceDatabase, NeighborEvent, NeighborEventType, NeighborInfo,
};
use rove_utils::prefix::PrefixUpdateRequest;
use rove_utils::southbound::{
    AddressMsg, LinkEntry, LinkFlags, LinkMsg, NetlinkEvent, NetlinkRequest,
};
use rove_utils::{Database, UnboundedReceiver};
use tokio::sync::mpsc;

// A link monitor with all of its collaborators stubbed out by channels.
//
// Events are driven through the same handler functions the dispatcher runs;
// timer-driven paths are exercised by injecting the corresponding protocol
// messages.
pub struct TestMonitor {
    pub master: Master,
    pub interface_updates: UnboundedReceiver<InterfaceDatabase>,
    pub prefix_updates: UnboundedReceiver<PrefixUpdateRequest>,
    pub peer_updates: UnboundedReceiver<PeerUpdateRequest>,
    pub kvstore: UnboundedReceiver<KvRequest>,
    pub netlink: UnboundedReceiver<NetlinkRequest>,
    pub logs: UnboundedReceiver<LogSample>,
    pub protocol: UnboundedReceiver<ProtocolMsg>,
}

impl TestMonitor {
    pub fn new(config: Config) -> TestMonitor {
        TestMonitor::with_db(config, None)
    }

    pub fn with_db(config: Config, db: Option<Database>) -> TestMonitor {
        let (interface_updates_tx, interface_updates) =
            mpsc::unbounded_channel();
        let (prefix_updates_tx, prefix_updates) = mpsc::unbounded_channel();
        let (peer_updates_tx, peer_updates) = mpsc::unbounded_channel();
        let (kvstore_tx, kvstore) = mpsc::unbounded_channel();
        let (netlink_tx, netlink) = mpsc::unbounded_channel();
        let (logs_tx, logs) = mpsc::unbounded_channel();
        let (protocol_tx, protocol) = mpsc::unbounded_channel();

        let master = Master::new(
            config,
            db,
            MonitorChannelsTx {
                interface_updates: interface_updates_tx,
                prefix_updates: prefix_updates_tx,
                peer_updates: peer_updates_tx,
                kvstore: kvstore_tx,
                netlink: netlink_tx,
                logs: logs_tx,
                protocol_input: protocol_tx,
            },
        );

        TestMonitor {
            master,
            interface_updates,
            prefix_updates,
            peer_updates,
            kvstore,
            netlink,
            logs,
            protocol,
        }
    }

    // ===== event injection =====

    pub fn neighbor(&mut self, event: NeighborEvent) {
        events::process_neighbor_event(&mut self.master, event);
    }

    pub fn netlink_event(&mut self, event: NetlinkEvent) {
        events::process_netlink_event(&mut self.master, event);
    }

    pub fn publication(&mut self, publication: Publication) {
        events::process_kvstore_publication(&mut self.master, publication);
    }

    pub fn protocol_msg(&mut self, msg: ProtocolMsg) {
        events::process_protocol_msg(&mut self.master, msg);
    }

    pub fn request(&mut self, request: Request) {
        rove_link_monitor::api::process_request(&mut self.master, request);
    }

    pub fn link_up(&mut self, ifname: &str, ifindex: u32) {
        self.netlink_event(NetlinkEvent::Link(link_msg(ifname, ifindex, true)));
    }

    pub fn link_down(&mut self, ifname: &str, ifindex: u32) {
        self.netlink_event(NetlinkEvent::Link(link_msg(
            ifname, ifindex, false,
        )));
    }

    pub fn addr_add(&mut self, ifindex: u32, addr: ipnetwork::IpNetwork) {
        self.netlink_event(NetlinkEvent::Address(AddressMsg::new(
            ifindex, addr, true,
        )));
    }

    // Runs the pending debounced adjacency advertisement.
    pub fn flush_adjacencies(&mut self) {
        self.protocol_msg(ProtocolMsg::AdvertiseAdjacencies);
    }

    // Runs the pending debounced interface/address advertisement.
    pub fn flush_iface_addr(&mut self) {
        self.protocol_msg(ProtocolMsg::AdvertiseIfaceAddr);
    }

    pub fn adjacency_db(&mut self, area: &str) -> AdjacencyDatabase {
        advertise::build_adjacency_db(&self.master, area)
    }

    // ===== output assertions =====

    pub fn recv_peer_update(&mut self) -> PeerUpdateRequest {
        self.peer_updates.try_recv().expect("expected a peer update")
    }

    pub fn assert_no_peer_update(&mut self) {
        assert!(
            self.peer_updates.try_recv().is_err(),
            "unexpected peer update"
        );
    }

    // Next KvStore request must be the adjacency database upsert; returns
    // the deserialized database together with its area.
    pub fn recv_adj_db(&mut self) -> (String, AdjacencyDatabase) {
        match self.kvstore.try_recv().expect("expected a kvstore request") {
            KvRequest::PersistKey {
                area, key, value, ..
            } => {
                assert!(key.starts_with("adj:"), "unexpected key {}", key);
                (area, serde_json::from_str(&value).unwrap())
            }
            other => panic!("unexpected kvstore request {:?}", other),
        }
    }

    // Next KvStore request must be an allocator proposal.
    pub fn recv_kv_set(&mut self) -> (String, String, KeyValue) {
        match self.kvstore.try_recv().expect("expected a kvstore request") {
            KvRequest::SetKey { area, key, entry } => (area, key, entry),
            other => panic!("unexpected kvstore request {:?}", other),
        }
    }

    pub fn assert_no_kv_request(&mut self) {
        assert!(
            self.kvstore.try_recv().is_err(),
            "unexpected kvstore request"
        );
    }

    pub fn recv_prefix_update(&mut self) -> PrefixUpdateRequest {
        self.prefix_updates
            .try_recv()
            .expect("expected a prefix update")
    }

    pub fn recv_interface_db(&mut self) -> InterfaceDatabase {
        self.interface_updates
            .try_recv()
            .expect("expected an interface database")
    }

    pub fn drain_outputs(&mut self) {
        while self.interface_updates.try_recv().is_ok() {}
        while self.prefix_updates.try_recv().is_ok() {}
        while self.peer_updates.try_recv().is_ok() {}
        while self.kvstore.try_recv().is_ok() {}
        while self.logs.try_recv().is_ok() {}
    }
}

// ===== helper functions =====

pub fn area(
    area_id: &str,
    include: &[&str],
    redistribute: &[&str],
) -> AreaConfig {
    AreaConfig::new(area_id, include, &[], redistribute).unwrap()
}

// Single area "0" matching eth interfaces for discovery and redistribution,
// with rtt-derived metrics and no flap damping.
pub fn config_single_area(node: &str) -> Config {
    let mut config = Config::new(node);
    config.areas.push(area("0", &["eth.*"], &["eth.*"]));
    config.use_rtt_metric = true;
    config.linkflap_initial_backoff = std::time::Duration::ZERO;
    config.linkflap_max_backoff = std::time::Duration::ZERO;
    config
}

pub fn neighbor_event(
    event: NeighborEventType,
    node: &str,
    ifname: &str,
    area: &str,
    addr_v6: Ipv6Addr,
    rtt_us: i64,
    label: u32,
) -> NeighborEvent {
    NeighborEvent::new(
        event,
        NeighborInfo {
            node: node.to_owned(),
            area: area.to_owned(),
            local_ifname: ifname.to_owned(),
            remote_ifname: "eth-remote".to_owned(),
            addr_v4: None,
            addr_v6: Some(addr_v6),
            rtt_us,
            label,
            kv_cmd_port: 60002,
            ctrl_port: 2018,
        },
    )
}

pub fn link_msg(ifname: &str, ifindex: u32, up: bool) -> LinkMsg {
    let flags = if up { LinkFlags::UP } else { LinkFlags::empty() };
    LinkMsg::new(ifname.to_owned(), ifindex, flags, 1)
}

pub fn snapshot_entry(
    ifname: &str,
    ifindex: u32,
    up: bool,
    networks: &[ipnetwork::IpNetwork],
) -> LinkEntry {
    let flags = if up { LinkFlags::UP } else { LinkFlags::empty() };
    LinkEntry::new(
        ifname.to_owned(),
        ifindex,
        flags,
        1,
        networks.iter().copied().collect(),
    )
}
