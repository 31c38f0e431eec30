//
// Copyright (c) The Rove Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;

use bitflags::bitflags;
use derive_new::new;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::Responder;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct LinkFlags: u8 {
        const UP = 0x01;
        const LOOPBACK = 0x02;
        const BROADCAST = 0x04;
    }
}

// Kernel events published by the netlink transport.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub enum NetlinkEvent {
    Link(LinkMsg),
    Address(AddressMsg),
}

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct LinkMsg {
    pub ifname: String,
    pub ifindex: u32,
    pub flags: LinkFlags,
    pub weight: u64,
}

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct AddressMsg {
    pub ifindex: u32,
    pub addr: IpNetwork,
    // An invalid address is one being withdrawn.
    pub valid: bool,
}

// One link of the full kernel snapshot, with its addresses merged in.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct LinkEntry {
    pub ifname: String,
    pub ifindex: u32,
    pub flags: LinkFlags,
    pub weight: u64,
    pub networks: BTreeSet<IpNetwork>,
}

// Failure reported by the netlink transport for a snapshot request.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct SnapshotError(pub String);

// Requests sent to the netlink transport task.
#[derive(Debug)]
pub enum NetlinkRequest {
    GetSnapshot {
        responder: Responder<Result<Vec<LinkEntry>, SnapshotError>>,
    },
}

// ===== impl LinkMsg =====

impl LinkMsg {
    pub fn is_up(&self) -> bool {
        self.flags.contains(LinkFlags::UP)
    }
}

// ===== impl SnapshotError =====

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for SnapshotError {}
