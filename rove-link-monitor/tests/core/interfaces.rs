//
// Copyright (c) The Rove Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use ipnetwork::IpNetwork;
use rove_link_monitor::config::Config;
use rove_link_monitor::tasks::messages::input::ProtocolMsg;
use rove_utils::southbound::SnapshotError;

use super::{TestMonitor, area, config_single_area, snapshot_entry};

fn net(s: &str) -> IpNetwork {
    s.parse().unwrap()
}

fn config_with_damping(node: &str, backoff: Duration) -> Config {
    let mut config = config_single_area(node);
    config.linkflap_initial_backoff = backoff;
    config.linkflap_max_backoff = backoff * 8;
    config
}

#[tokio::test]
async fn link_flaps_are_damped() {
    let backoff = Duration::from_millis(30);
    let mut monitor = TestMonitor::new(config_with_damping("A", backoff));

    // The first transition already charges the penalty: up, but not yet
    // active.
    monitor.link_up("eth0", 1);
    let iface = monitor.master.interfaces.get_by_name("eth0").unwrap();
    assert!(iface.is_up());
    assert!(!iface.is_active());

    // Active once the penalty elapses.
    std::thread::sleep(backoff + Duration::from_millis(10));
    let iface = monitor.master.interfaces.get_by_name("eth0").unwrap();
    assert!(iface.is_active());

    // Each further flap doubles the penalty.
    monitor.link_down("eth0", 1);
    monitor.link_up("eth0", 1);
    let iface = monitor.master.interfaces.get_by_name("eth0").unwrap();
    assert!(!iface.is_active());
    assert!(iface.backoff_remaining() > backoff);

    // A retry advertisement gets scheduled for when the penalty clears.
    assert!(monitor.master.iface_retry_timer.is_none());
    monitor.flush_iface_addr();
    assert!(monitor.master.iface_retry_timer.is_some());
}

#[tokio::test]
async fn interface_database_reports_the_damped_state() {
    let backoff = Duration::from_millis(50);
    let mut monitor = TestMonitor::new(config_with_damping("A", backoff));

    monitor.link_up("eth0", 1);
    monitor.flush_iface_addr();
    let db = monitor.recv_interface_db();
    assert_eq!(db.node, "A");
    // Up in the kernel, but still sitting out the damping penalty.
    assert!(!db.interfaces["eth0"].up);

    std::thread::sleep(backoff + Duration::from_millis(10));
    monitor.flush_iface_addr();
    let db = monitor.recv_interface_db();
    assert!(db.interfaces["eth0"].up);
}

#[tokio::test]
async fn address_event_for_unknown_index_is_dropped() {
    let mut monitor = TestMonitor::new(config_single_area("A"));

    monitor.addr_add(99, net("2001:db8::1/64"));

    assert!(monitor.master.interfaces.is_empty());
    assert!(!monitor.master.iface_throttle.is_active());
}

#[tokio::test]
async fn irrelevant_interfaces_are_not_tracked() {
    let mut monitor = TestMonitor::new(config_single_area("A"));

    monitor.link_up("lo", 1);
    assert!(monitor.master.interfaces.is_empty());
    // The index cache still learns the mapping.
    assert_eq!(monitor.master.if_index_to_name[&1], "lo");
}

#[tokio::test]
async fn snapshot_reconciliation_is_idempotent() {
    let mut monitor = TestMonitor::new(config_single_area("A"));
    let addr = net("2001:db8::1/64");

    let links = vec![snapshot_entry("eth0", 1, true, &[addr])];

    monitor.protocol_msg(ProtocolMsg::LinkSnapshot(Ok(links.clone())));
    assert!(monitor.master.iface_throttle.is_active());
    let iface = monitor.master.interfaces.get_by_name("eth0").unwrap();
    assert!(iface.networks.contains(&addr));
    monitor.flush_iface_addr();
    monitor.drain_outputs();

    // The same snapshot again changes nothing.
    monitor.protocol_msg(ProtocolMsg::LinkSnapshot(Ok(links)));
    assert!(!monitor.master.iface_throttle.is_active());

    // A snapshot with the address gone withdraws it.
    let links = vec![snapshot_entry("eth0", 1, true, &[])];
    monitor.protocol_msg(ProtocolMsg::LinkSnapshot(Ok(links)));
    assert!(monitor.master.iface_throttle.is_active());
    let iface = monitor.master.interfaces.get_by_name("eth0").unwrap();
    assert!(iface.networks.is_empty());
}

#[tokio::test]
async fn snapshot_failures_back_off() {
    let mut monitor = TestMonitor::new(config_single_area("A"));

    monitor.protocol_msg(ProtocolMsg::LinkSnapshot(Err(SnapshotError::new(
        "transport unavailable".to_owned(),
    ))));
    assert_eq!(monitor.master.counters.sync_failures, 1);
    // A retry was scheduled.
    assert!(monitor.master.sync_timer.is_some());

    monitor.protocol_msg(ProtocolMsg::LinkSnapshot(Err(SnapshotError::new(
        "transport unavailable".to_owned(),
    ))));
    assert_eq!(monitor.master.counters.sync_failures, 2);
}

#[tokio::test]
async fn sync_request_reaches_the_transport() {
    let mut monitor = TestMonitor::new(config_single_area("A"));

    monitor.protocol_msg(ProtocolMsg::SyncInterfaces);
    assert!(monitor.netlink.try_recv().is_ok());
}

#[tokio::test]
async fn redistribution_is_per_area() {
    let mut config = Config::new("A");
    config.areas.push(area("0", &["eth.*"], &["eth.*"]));
    config.areas.push(area("1", &["po.*"], &[]));
    config.linkflap_initial_backoff = Duration::ZERO;
    config.linkflap_max_backoff = Duration::ZERO;
    let mut monitor = TestMonitor::new(config);

    monitor.link_up("eth0", 1);
    monitor.addr_add(1, net("2001:db8::1/64"));
    monitor.flush_iface_addr();

    // One sync per area: area 0 carries the masked prefix, area 1 is
    // explicitly empty.
    let update = monitor.recv_prefix_update();
    assert_eq!(update.dst_areas.iter().next().unwrap(), "0");
    assert_eq!(update.prefixes.len(), 1);
    let entry = &update.prefixes[0];
    assert_eq!(entry.prefix, net("2001:db8::/64"));
    assert!(entry.tags.contains("INTERFACE_SUBNET"));
    assert!(entry.tags.contains("A:eth0"));

    let update = monitor.recv_prefix_update();
    assert_eq!(update.dst_areas.iter().next().unwrap(), "1");
    assert!(update.prefixes.is_empty());
}

#[tokio::test]
async fn v4_redistribution_honors_the_toggle() {
    let mut monitor = TestMonitor::new(config_single_area("A"));

    monitor.link_up("eth0", 1);
    monitor.addr_add(1, net("192.0.2.1/24"));
    monitor.addr_add(1, net("2001:db8::1/64"));
    // Link-local addresses are never redistributed.
    monitor.addr_add(1, net("fe80::1/64"));
    monitor.flush_iface_addr();

    let update = monitor.recv_prefix_update();
    assert_eq!(update.prefixes.len(), 1);
    assert_eq!(update.prefixes[0].prefix, net("2001:db8::/64"));

    let mut config = config_single_area("A");
    config.enable_v4 = true;
    let mut monitor = TestMonitor::new(config);
    monitor.link_up("eth0", 1);
    monitor.addr_add(1, net("192.0.2.1/24"));
    monitor.addr_add(1, net("2001:db8::1/64"));
    monitor.flush_iface_addr();

    let update = monitor.recv_prefix_update();
    assert_eq!(update.prefixes.len(), 2);
}
