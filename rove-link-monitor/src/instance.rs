//
// Copyright (c) The Rove Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use rove_utils::kvstore::{
    KvRequest, KvStorePeerValue, PeerSpec, PeerUpdateRequest, Publication,
};
use rove_utils::log::LogSample;
use rove_utils::neighbor::{InterfaceDatabase, NeighborEvent};
use rove_utils::prefix::PrefixUpdateRequest;
use rove_utils::southbound::{NetlinkEvent, NetlinkRequest};
use rove_utils::task::{Task, Throttle, TimeoutTask};
use rove_utils::{Database, Receiver, Sender, UnboundedReceiver, UnboundedSender};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::adjacency::{Adjacencies, AdjacencyKey};
use crate::allocator::RangeAllocator;
use crate::api;
use crate::config::{CONFIG_STORE_KEY, Config, INITIAL_SYNC_DELAY};
use crate::error::Error;
use crate::events;
use crate::interface::Interfaces;
use crate::tasks;
use crate::tasks::messages::input::ProtocolMsg;

// Node-level overrides, serialized to the persistent store on every change.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct MonitorState {
    // Node label allocated through the KvStore (0 while unassigned).
    pub node_label: u32,
    // Node drain bit.
    pub is_overloaded: bool,
    // Drained links.
    pub overloaded_links: BTreeSet<String>,
    // Per-link and per-adjacency metric overrides.
    pub link_metric_overrides: BTreeMap<String, u32>,
    pub adj_metric_overrides: BTreeMap<AdjacencyKey, u32>,
}

// Observability counters.
#[derive(Debug, Default)]
pub struct Counters {
    pub neighbor_up: u64,
    pub neighbor_restarting: u64,
    pub neighbor_down: u64,
    pub advertise_adjacencies: u64,
    pub advertise_links: u64,
    pub sync_failures: u64,
    // Gauges.
    pub adjacencies: u64,
    pub neighbor_metric: BTreeMap<String, u32>,
}

pub struct Master {
    // Immutable configuration.
    pub config: Config,
    // Persistent overrides.
    pub state: MonitorState,
    // Shared persistent store.
    db: Option<Database>,
    // All tracked interfaces, including DOWN ones.
    pub interfaces: Interfaces,
    // Kernel ifindex -> ifname cache; covers interfaces the configuration
    // doesn't care about too.
    pub if_index_to_name: HashMap<u32, String>,
    // Currently active adjacencies.
    pub adjacencies: Adjacencies,
    // Previously announced KvStore peers, per area.
    pub peers: BTreeMap<String, BTreeMap<String, KvStorePeerValue>>,
    // Node label allocators, per area.
    pub allocators: BTreeMap<String, RangeAllocator>,
    // Output channels.
    pub tx: MonitorChannelsTx,
    // Debounced advertisers.
    pub adj_throttle: Throttle,
    pub iface_throttle: Throttle,
    // Timers.
    pub adj_hold_timer: Option<TimeoutTask>,
    pub sync_timer: Option<TimeoutTask>,
    pub iface_retry_timer: Option<TimeoutTask>,
    allocator_start_timers: Vec<TimeoutTask>,
    // Kernel snapshot failure backoff.
    pub(crate) sync_backoff: rove_utils::backoff::ExponentialBackoff,
    // Observability counters.
    pub counters: Counters,
}

// Messages sent to the external collaborators.
#[derive(Clone, Debug)]
pub struct MonitorChannelsTx {
    pub interface_updates: UnboundedSender<InterfaceDatabase>,
    pub prefix_updates: UnboundedSender<PrefixUpdateRequest>,
    pub peer_updates: UnboundedSender<PeerUpdateRequest>,
    pub kvstore: UnboundedSender<KvRequest>,
    pub netlink: UnboundedSender<NetlinkRequest>,
    pub logs: UnboundedSender<LogSample>,
    // Loopback channel for timers and helper tasks.
    pub protocol_input: UnboundedSender<ProtocolMsg>,
}

#[derive(Debug)]
pub struct MonitorChannelsRx {
    pub api: Receiver<api::Request>,
    pub neighbors: UnboundedReceiver<NeighborEvent>,
    pub netlink: UnboundedReceiver<NetlinkEvent>,
    pub kvstore: UnboundedReceiver<Publication>,
    pub protocol_input: UnboundedReceiver<ProtocolMsg>,
}

// Output endpoints handed in by the embedding daemon.
#[derive(Clone, Debug)]
pub struct OutputChannelsTx {
    pub interface_updates: UnboundedSender<InterfaceDatabase>,
    pub prefix_updates: UnboundedSender<PrefixUpdateRequest>,
    pub peer_updates: UnboundedSender<PeerUpdateRequest>,
    pub kvstore: UnboundedSender<KvRequest>,
    pub netlink: UnboundedSender<NetlinkRequest>,
    pub logs: UnboundedSender<LogSample>,
}

// Input event queues handed in by the embedding daemon.
#[derive(Debug)]
pub struct InputChannelsRx {
    pub neighbors: UnboundedReceiver<NeighborEvent>,
    pub netlink: UnboundedReceiver<NetlinkEvent>,
    pub kvstore: UnboundedReceiver<Publication>,
}

#[derive(Debug)]
pub enum EventMsg {
    Api(Option<api::Request>),
    Neighbor(NeighborEvent),
    Netlink(NetlinkEvent),
    KvStore(Publication),
    Protocol(ProtocolMsg),
}

// ===== impl MonitorState =====

impl MonitorState {
    fn load(db: &Database) -> Option<MonitorState> {
        db.lock().unwrap().get(CONFIG_STORE_KEY)
    }

    pub(crate) fn store(&self, db: &Database) {
        if let Err(error) = db.lock().unwrap().set(CONFIG_STORE_KEY, self) {
            Error::Database(error).log();
        }
    }
}

// ===== impl Master =====

impl Master {
    pub fn new(
        config: Config,
        db: Option<Database>,
        tx: MonitorChannelsTx,
    ) -> Master {
        // Load the persistent overrides; fall back to the drain flags when
        // nothing was stored.
        let mut state = db
            .as_ref()
            .and_then(MonitorState::load)
            .unwrap_or_else(|| {
                warn!(
                    assume_drained = %config.assume_drained,
                    "no persistent state found, initializing drain from flags"
                );
                MonitorState {
                    is_overloaded: config.assume_drained,
                    ..Default::default()
                }
            });
        if config.override_drain_state {
            warn!(
                assume_drained = %config.assume_drained,
                "drain state override requested"
            );
            state.is_overloaded = config.assume_drained;
        }

        // One node label allocator per area.
        let mut allocators = BTreeMap::new();
        if config.enable_segment_routing {
            for area in config.area_ids() {
                allocators.insert(
                    area.to_owned(),
                    RangeAllocator::new(
                        area.to_owned(),
                        config.node_name.clone(),
                        config.node_label_range,
                        tx.kvstore.clone(),
                        tx.protocol_input.clone(),
                    ),
                );
            }
        }

        let adj_throttle = Throttle::new(config.throttle_timeout);
        let iface_throttle = Throttle::new(config.throttle_timeout);
        let sync_backoff = rove_utils::backoff::ExponentialBackoff::new(
            config.sync_initial_backoff,
            config.sync_max_backoff,
        );

        Master {
            config,
            state,
            db,
            interfaces: Default::default(),
            if_index_to_name: Default::default(),
            adjacencies: Default::default(),
            peers: Default::default(),
            allocators,
            tx,
            adj_throttle,
            iface_throttle,
            adj_hold_timer: None,
            sync_timer: None,
            iface_retry_timer: None,
            allocator_start_timers: Vec::new(),
            sync_backoff,
            counters: Default::default(),
        }
    }

    // Arms the startup timers: the initial advertisement hold, the first
    // kernel snapshot request and the deferred allocator starts.
    pub fn init(&mut self) {
        self.adj_hold_timer = Some(tasks::adj_hold_timer(
            self.config.adj_hold_time,
            &self.tx.protocol_input,
        ));
        self.sync_timer = Some(tasks::platform_sync_timer(
            INITIAL_SYNC_DELAY,
            &self.tx.protocol_input,
        ));
        for area in self.allocators.keys() {
            self.allocator_start_timers.push(tasks::allocator_start_timer(
                self.config.adj_hold_time,
                area.clone(),
                &self.tx.protocol_input,
            ));
        }
    }

    pub(crate) async fn run(&mut self, channels_rx: MonitorChannelsRx) {
        // Spawn event aggregator task.
        let (agg_tx, mut agg_rx) = mpsc::channel(4);
        let _event_aggregator = event_aggregator(channels_rx, agg_tx);

        loop {
            // Receive event message.
            let Some(msg) = agg_rx.recv().await else {
                return;
            };

            // Process event message.
            match msg {
                EventMsg::Api(Some(request)) => {
                    api::process_request(self, request);
                }
                EventMsg::Api(None) => {
                    // Exit when the management channel closes.
                    return;
                }
                EventMsg::Neighbor(event) => {
                    events::process_neighbor_event(self, event);
                }
                EventMsg::Netlink(event) => {
                    events::process_netlink_event(self, event);
                }
                EventMsg::KvStore(publication) => {
                    events::process_kvstore_publication(self, publication);
                }
                EventMsg::Protocol(msg) => {
                    events::process_protocol_msg(self, msg);
                }
            }
        }
    }

    // The initial advertisement hold is in effect until its timer fires.
    pub(crate) fn hold_active(&self) -> bool {
        self.adj_hold_timer.is_some()
    }

    // Rewrites the persistent overrides record.
    pub(crate) fn persist_state(&self) {
        if let Some(db) = &self.db {
            self.state.store(db);
        }
    }

    // Schedules a debounced adjacency advertisement.
    pub(crate) fn schedule_advertise_adjacencies(&mut self) {
        let protocol_tx = self.tx.protocol_input.clone();
        self.adj_throttle.trigger(move || async move {
            let _ = protocol_tx.send(ProtocolMsg::AdvertiseAdjacencies);
        });
    }

    // Schedules a debounced interface/address advertisement.
    pub(crate) fn schedule_advertise_iface_addr(&mut self) {
        let protocol_tx = self.tx.protocol_input.clone();
        self.iface_throttle.trigger(move || async move {
            let _ = protocol_tx.send(ProtocolMsg::AdvertiseIfaceAddr);
        });
    }

    // Arms the flap-damping retry timer.
    pub(crate) fn schedule_iface_retry(&mut self, delay: Duration) {
        self.iface_retry_timer =
            Some(tasks::iface_retry_timer(delay, &self.tx.protocol_input));
    }

    // ===== log samples =====

    pub(crate) fn log_neighbor_event(&self, event: &NeighborEvent) {
        let mut sample = LogSample::new();
        sample
            .add_string("event", event.event.as_log_event())
            .add_string("node_name", &self.config.node_name)
            .add_string("neighbor", &event.info.node)
            .add_string("interface", &event.info.local_ifname)
            .add_string("remote_interface", &event.info.remote_ifname)
            .add_string("area", &event.info.area)
            .add_int("rtt_us", event.info.rtt_us);
        let _ = self.tx.logs.send(sample);
    }

    pub(crate) fn log_link_event(
        &self,
        ifname: &str,
        was_up: bool,
        is_up: bool,
        backoff: Duration,
    ) {
        // Do not log if no state transition.
        if was_up == is_up {
            return;
        }
        let mut sample = LogSample::new();
        sample
            .add_string("event", if is_up { "IFACE_UP" } else { "IFACE_DOWN" })
            .add_string("node_name", &self.config.node_name)
            .add_string("interface", ifname)
            .add_int("backoff_ms", backoff.as_millis() as i64);
        let _ = self.tx.logs.send(sample);
    }

    pub(crate) fn log_peer_event(
        &self,
        event: &str,
        peer_name: &str,
        peer_spec: &PeerSpec,
    ) {
        let mut sample = LogSample::new();
        sample
            .add_string("event", event)
            .add_string("node_name", &self.config.node_name)
            .add_string("peer_name", peer_name)
            .add_string("cmd_url", &peer_spec.cmd_url);
        let _ = self.tx.logs.send(sample);
    }
}

// The persistent store handle has no meaningful Debug form.
impl std::fmt::Debug for Master {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Master")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("interfaces", &self.interfaces)
            .field("adjacencies", &self.adjacencies)
            .field("peers", &self.peers)
            .field("counters", &self.counters)
            .finish()
    }
}

// ===== helper functions =====

fn event_aggregator(
    mut channels_rx: MonitorChannelsRx,
    agg_tx: Sender<EventMsg>,
) -> Task<()> {
    Task::spawn(async move {
        loop {
            let msg = tokio::select! {
                msg = channels_rx.api.recv() => {
                    EventMsg::Api(msg)
                }
                Some(msg) = channels_rx.neighbors.recv() => {
                    EventMsg::Neighbor(msg)
                }
                Some(msg) = channels_rx.netlink.recv() => {
                    EventMsg::Netlink(msg)
                }
                Some(msg) = channels_rx.kvstore.recv() => {
                    EventMsg::KvStore(msg)
                }
                Some(msg) = channels_rx.protocol_input.recv() => {
                    EventMsg::Protocol(msg)
                }
            };
            let _ = agg_tx.send(msg).await;
        }
    })
}

// ===== global functions =====

// Builds the channel bundles for a monitor instance, returning the
// management handle alongside.
pub fn channels(
    outputs: OutputChannelsTx,
    inputs: InputChannelsRx,
) -> (Sender<api::Request>, MonitorChannelsTx, MonitorChannelsRx) {
    let (api_tx, api_rx) = mpsc::channel(4);
    let (protocol_txp, protocol_rxc) = mpsc::unbounded_channel();

    let channels_tx = MonitorChannelsTx {
        interface_updates: outputs.interface_updates,
        prefix_updates: outputs.prefix_updates,
        peer_updates: outputs.peer_updates,
        kvstore: outputs.kvstore,
        netlink: outputs.netlink,
        logs: outputs.logs,
        protocol_input: protocol_txp,
    };
    let channels_rx = MonitorChannelsRx {
        api: api_rx,
        neighbors: inputs.neighbors,
        netlink: inputs.netlink,
        kvstore: inputs.kvstore,
        protocol_input: protocol_rxc,
    };

    (api_tx, channels_tx, channels_rx)
}
