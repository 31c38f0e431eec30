//
// Copyright (c) The Rove Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::time::Duration;

use derive_new::new;
use serde::{Deserialize, Serialize};

// Endpoint a remote node's KvStore is reachable at.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct PeerSpec {
    // Command socket URL used for replication sessions.
    pub cmd_url: String,
    // Plain peer address, scoped to the local interface.
    pub peer_addr: String,
    // Management plane port.
    pub ctrl_port: u16,
}

// A KvStore peer as tracked by the link monitor: the endpoint plus the
// initial full-sync progress reported back by the KvStore driver.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct KvStorePeerValue {
    pub peer_spec: PeerSpec,
    pub initial_synced: bool,
}

// Peer delta pushed to the KvStore driver. At least one of the add/del
// members is present.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct PeerUpdateRequest {
    pub area: String,
    pub peers_to_add: Option<BTreeMap<String, PeerSpec>>,
    pub peers_to_del: Option<Vec<String>>,
}

// A single replicated key-value entry.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct KeyValue {
    pub value: String,
    // Node that originated this version of the value.
    pub originator: String,
    pub version: i64,
    pub ttl: Option<Duration>,
}

// Key updates replicated back from the KvStore.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct Publication {
    pub area: String,
    pub key_vals: BTreeMap<String, KeyValue>,
}

// Requests pushed to the KvStore driver.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub enum KvRequest {
    // At-least-once upsert: the driver keeps the key alive and re-advertises
    // it in the background.
    PersistKey {
        area: String,
        key: String,
        value: String,
        ttl: Duration,
    },
    // Plain one-shot key write.
    SetKey {
        area: String,
        key: String,
        entry: KeyValue,
    },
}
