//
// Copyright (c) The Rove Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;

use derive_new::new;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

// Default route preference metrics attached to originated prefixes.
pub const DEFAULT_PATH_PREFERENCE: u32 = 1000;
pub const DEFAULT_SOURCE_PREFERENCE: u32 = 100;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum PrefixUpdateCommand {
    AddPrefixes,
    WithdrawPrefixes,
    // Replace all prefixes of the given type.
    SyncPrefixesByType,
}

// Origin of an advertised prefix.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum PrefixType {
    Default,
    Loopback,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum PrefixForwardingType {
    #[default]
    Ip,
    SrMpls,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum PrefixForwardingAlgorithm {
    #[default]
    SpEcmp,
    Ksp2EdEcmp,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct PrefixEntry {
    pub prefix: IpNetwork,
    pub prefix_type: PrefixType,
    pub forwarding_type: PrefixForwardingType,
    pub forwarding_algorithm: PrefixForwardingAlgorithm,
    pub tags: BTreeSet<String>,
    pub path_preference: u32,
    pub source_preference: u32,
}

// Request pushed to the prefix manager.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[derive(new)]
pub struct PrefixUpdateRequest {
    pub cmd: PrefixUpdateCommand,
    pub prefix_type: Option<PrefixType>,
    pub prefixes: Vec<PrefixEntry>,
    pub dst_areas: BTreeSet<String>,
}
