//
// Copyright (c) The Rove Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use generational_arena::{Arena, Index};
use ipnetwork::IpNetwork;
use rove_utils::backoff::ExponentialBackoff;
use rove_utils::ip::{IpAddrExt, IpNetworkExt};
use rove_utils::neighbor::InterfaceInfo;
use rove_utils::southbound::LinkFlags;

#[derive(Debug, Default)]
pub struct Interfaces {
    // Interface arena.
    arena: Arena<Interface>,
    // Interface binary tree keyed by name (1:1).
    name_tree: BTreeMap<String, Index>,
}

// State of one tracked interface.
//
// Entries are created on first observation and survive link-down so the
// flap-damping penalty is preserved.
#[derive(Debug)]
pub struct Interface {
    pub name: String,
    pub ifindex: u32,
    pub flags: LinkFlags,
    pub weight: u64,
    pub networks: BTreeSet<IpNetwork>,
    // Flap damping state.
    pub backoff: ExponentialBackoff,
}

// Result of applying a kernel link update to the table.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinkUpdateOutcome {
    // Any attribute changed.
    pub updated: bool,
    // The up bit flipped.
    pub transitioned: bool,
    // The damped (active) view of the interface changed.
    pub active_changed: bool,
    // Up bit and damping penalty after the update.
    pub up: bool,
    pub was_up: bool,
    pub backoff_remaining: Duration,
}

// ===== impl Interface =====

impl Interface {
    fn new(
        name: String,
        initial_backoff: Duration,
        max_backoff: Duration,
    ) -> Interface {
        Interface {
            name,
            ifindex: 0,
            flags: LinkFlags::default(),
            weight: 1,
            networks: Default::default(),
            backoff: ExponentialBackoff::new(initial_backoff, max_backoff),
        }
    }

    pub fn is_up(&self) -> bool {
        self.flags.contains(LinkFlags::UP)
    }

    // An interface takes part in discovery and redistribution only while it
    // is up and the flap damping penalty has elapsed.
    pub fn is_active(&self) -> bool {
        self.is_up() && !self.backoff.is_active(Instant::now())
    }

    pub fn backoff_remaining(&self) -> Duration {
        self.backoff.time_remaining(Instant::now())
    }

    // Applies a kernel link update, charging the flap damping penalty on
    // up/down transitions.
    pub(crate) fn update_attrs(
        &mut self,
        ifindex: u32,
        flags: LinkFlags,
        weight: u64,
    ) -> LinkUpdateOutcome {
        let was_up = self.is_up();
        let was_active = self.is_active();

        let mut updated = false;
        updated |= std::mem::replace(&mut self.ifindex, ifindex) != ifindex;
        updated |= std::mem::replace(&mut self.flags, flags) != flags;
        updated |= std::mem::replace(&mut self.weight, weight) != weight;

        let transitioned = was_up != self.is_up();
        if transitioned {
            self.backoff.report_error();
        }

        LinkUpdateOutcome {
            updated,
            transitioned,
            active_changed: was_active != self.is_active(),
            up: self.is_up(),
            was_up,
            backoff_remaining: self.backoff_remaining(),
        }
    }

    // Adds or removes one address. Returns whether the set changed.
    pub(crate) fn update_addr(&mut self, addr: IpNetwork, valid: bool) -> bool {
        if valid {
            self.networks.insert(addr)
        } else {
            self.networks.remove(&addr)
        }
    }

    // Returns the masked, globally routable unicast networks of this
    // interface, optionally including IPv4.
    pub(crate) fn global_unicast_networks(
        &self,
        enable_v4: bool,
    ) -> Vec<IpNetwork> {
        self.networks
            .iter()
            .filter(|network| network.ip().is_global_unicast())
            .filter(|network| enable_v4 || !network.is_ipv4())
            .map(|network| network.apply_mask())
            .collect()
    }

    pub(crate) fn info(&self) -> InterfaceInfo {
        InterfaceInfo::new(self.is_up(), self.ifindex, self.networks.clone())
    }
}

// ===== impl Interfaces =====

impl Interfaces {
    // Returns the interface with the given name, creating it on first
    // observation.
    pub(crate) fn get_or_create(
        &mut self,
        ifname: &str,
        initial_backoff: Duration,
        max_backoff: Duration,
    ) -> &mut Interface {
        let iface_idx = match self.name_tree.get(ifname).copied() {
            Some(iface_idx) => iface_idx,
            None => {
                let iface = Interface::new(
                    ifname.to_owned(),
                    initial_backoff,
                    max_backoff,
                );
                let iface_idx = self.arena.insert(iface);
                self.name_tree.insert(ifname.to_owned(), iface_idx);
                iface_idx
            }
        };
        &mut self.arena[iface_idx]
    }

    // Returns a reference to the interface corresponding to the given name.
    pub fn get_by_name(&self, ifname: &str) -> Option<&Interface> {
        self.name_tree
            .get(ifname)
            .copied()
            .map(|iface_idx| &self.arena[iface_idx])
    }

    // Returns a mutable reference to the interface corresponding to the given
    // name.
    pub fn get_mut_by_name(&mut self, ifname: &str) -> Option<&mut Interface> {
        self.name_tree
            .get(ifname)
            .copied()
            .map(move |iface_idx| &mut self.arena[iface_idx])
    }

    // Returns an iterator visiting all interfaces.
    //
    // Interfaces are ordered by their names.
    pub fn iter(&self) -> impl Iterator<Item = &'_ Interface> + '_ {
        self.name_tree
            .values()
            .map(|iface_idx| &self.arena[*iface_idx])
    }

    pub fn is_empty(&self) -> bool {
        self.name_tree.is_empty()
    }
}
