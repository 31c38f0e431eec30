//
// Copyright (c) The Rove Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;

use derive_new::new;
use rove_utils::kvstore::PeerSpec;
use rove_utils::lsdb::Adjacency;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// An adjacency is uniquely identified by the remote node and the local
// interface; parallel links to the same node are distinct adjacencies.
//
// Serialized in the `<node>:<ifname>` form (node names cannot contain a
// colon).
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(new)]
pub struct AdjacencyKey {
    pub node: String,
    pub ifname: String,
}

#[derive(Clone, Debug)]
#[derive(new)]
pub struct AdjacencyValue {
    // Area the adjacency belongs to.
    pub area: String,
    // Endpoint the remote node's KvStore is reachable at.
    pub peer_spec: PeerSpec,
    // The advertised adjacency record.
    pub adjacency: Adjacency,
    // A restarting neighbor keeps its adjacency but stops contributing a
    // KvStore peer.
    pub is_restarting: bool,
}

// Currently active adjacencies, keyed by (remote node, local interface).
#[derive(Debug, Default)]
pub struct Adjacencies(BTreeMap<AdjacencyKey, AdjacencyValue>);

// ===== impl Adjacencies =====

impl Adjacencies {
    // Inserts the adjacency, replacing any prior record under the same key.
    pub(crate) fn insert(&mut self, key: AdjacencyKey, value: AdjacencyValue) {
        self.0.insert(key, value);
    }

    pub(crate) fn remove(
        &mut self,
        key: &AdjacencyKey,
    ) -> Option<AdjacencyValue> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &AdjacencyKey) -> Option<&AdjacencyValue> {
        self.0.get(key)
    }

    pub(crate) fn get_mut(
        &mut self,
        key: &AdjacencyKey,
    ) -> Option<&mut AdjacencyValue> {
        self.0.get_mut(key)
    }

    pub fn contains(&self, key: &AdjacencyKey) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&'_ AdjacencyKey, &'_ AdjacencyValue)> + '_ {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    // Derives the required KvStore peers for one area.
    //
    // A remote node contributes a peer iff it has at least one
    // non-restarting adjacency in the area. With parallel links, the
    // endpoint comes from the adjacency with the lexicographically smallest
    // local interface name; key order makes that the first one visited.
    pub fn peers(&self, area: &str) -> BTreeMap<String, PeerSpec> {
        let mut peers = BTreeMap::new();
        for (key, value) in &self.0 {
            if value.area != area || value.is_restarting {
                continue;
            }
            peers
                .entry(key.node.clone())
                .or_insert_with(|| value.peer_spec.clone());
        }
        peers
    }
}

// ===== impl AdjacencyKey =====

impl std::fmt::Display for AdjacencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.node, self.ifname)
    }
}

impl std::str::FromStr for AdjacencyKey {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<AdjacencyKey, Self::Err> {
        let (node, ifname) =
            s.split_once(':').ok_or("missing ':' separator")?;
        Ok(AdjacencyKey::new(node.to_owned(), ifname.to_owned()))
    }
}

impl Serialize for AdjacencyKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AdjacencyKey {
    fn deserialize<D>(deserializer: D) -> Result<AdjacencyKey, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

// ===== global functions =====

// Converts a measured rtt (in us) to a metric value. The metric can never be
// zero.
pub(crate) fn rtt_metric(rtt_us: i64) -> u32 {
    (rtt_us / 100).clamp(1, i64::from(u32::MAX)) as u32
}
