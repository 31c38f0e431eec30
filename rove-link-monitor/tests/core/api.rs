//
// Copyright (c) The Rove Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;

use const_addrs::ip6;
use rove_link_monitor::api::Request;
use rove_link_monitor::error::Error;
use rove_utils::neighbor::NeighborEventType;
use tokio::sync::oneshot;

use super::{TestMonitor, area, config_single_area, neighbor_event};

fn set_node_overload(
    monitor: &mut TestMonitor,
    overload: bool,
) -> Result<(), Error> {
    let (responder, mut response) = oneshot::channel();
    monitor.request(Request::SetNodeOverload {
        overload,
        responder,
    });
    response.try_recv().expect("request left unanswered")
}

fn set_interface_overload(
    monitor: &mut TestMonitor,
    ifname: &str,
    overload: bool,
) -> Result<(), Error> {
    let (responder, mut response) = oneshot::channel();
    monitor.request(Request::SetInterfaceOverload {
        ifname: ifname.to_owned(),
        overload,
        responder,
    });
    response.try_recv().expect("request left unanswered")
}

fn set_link_metric(
    monitor: &mut TestMonitor,
    ifname: &str,
    metric: Option<u32>,
) -> Result<(), Error> {
    let (responder, mut response) = oneshot::channel();
    monitor.request(Request::SetLinkMetric {
        ifname: ifname.to_owned(),
        metric,
        responder,
    });
    response.try_recv().expect("request left unanswered")
}

fn set_adjacency_metric(
    monitor: &mut TestMonitor,
    node: &str,
    ifname: &str,
    metric: Option<u32>,
) -> Result<(), Error> {
    let (responder, mut response) = oneshot::channel();
    monitor.request(Request::SetAdjacencyMetric {
        node: node.to_owned(),
        ifname: ifname.to_owned(),
        metric,
        responder,
    });
    response.try_recv().expect("request left unanswered")
}

fn published_metric(monitor: &mut TestMonitor) -> u32 {
    monitor.flush_adjacencies();
    let (_, db) = monitor.recv_adj_db();
    monitor.drain_outputs();
    db.adjacencies[0].metric
}

#[tokio::test]
async fn metric_override_precedence() {
    let mut monitor = TestMonitor::new(config_single_area("A"));
    monitor.link_up("eth0", 1);
    // rtt of 1000us gives a base metric of 10.
    monitor.neighbor(neighbor_event(
        NeighborEventType::Up,
        "B",
        "eth0",
        "0",
        ip6!("fe80::b"),
        1000,
        0,
    ));
    monitor.drain_outputs();
    assert_eq!(published_metric(&mut monitor), 10);

    set_link_metric(&mut monitor, "eth0", Some(20)).unwrap();
    assert_eq!(published_metric(&mut monitor), 20);

    // The adjacency override takes precedence over the link override.
    set_adjacency_metric(&mut monitor, "B", "eth0", Some(30)).unwrap();
    assert_eq!(published_metric(&mut monitor), 30);

    set_adjacency_metric(&mut monitor, "B", "eth0", None).unwrap();
    assert_eq!(published_metric(&mut monitor), 20);

    set_link_metric(&mut monitor, "eth0", None).unwrap();
    assert_eq!(published_metric(&mut monitor), 10);
}

#[tokio::test]
async fn no_op_requests_do_not_advertise() {
    let mut monitor = TestMonitor::new(config_single_area("A"));
    monitor.link_up("eth0", 1);
    monitor.drain_outputs();

    set_link_metric(&mut monitor, "eth0", Some(20)).unwrap();
    monitor.flush_adjacencies();
    monitor.drain_outputs();

    // The same value again is a no-op: success, no advertisement.
    set_link_metric(&mut monitor, "eth0", Some(20)).unwrap();
    assert!(!monitor.master.adj_throttle.is_active());
    monitor.assert_no_kv_request();

    // Same for clearing an override that is not set.
    set_link_metric(&mut monitor, "eth1", None).unwrap_err();
    set_adjacency_metric(&mut monitor, "B", "eth0", None).unwrap_err();

    // And for the node drain bit.
    set_node_overload(&mut monitor, false).unwrap();
    monitor.assert_no_kv_request();

    set_interface_overload(&mut monitor, "eth0", false).unwrap();
    assert!(!monitor.master.adj_throttle.is_active());
}

#[tokio::test]
async fn unknown_targets_are_rejected() {
    let mut monitor = TestMonitor::new(config_single_area("A"));

    let error = set_interface_overload(&mut monitor, "ge0", true).unwrap_err();
    assert!(matches!(error, Error::InterfaceNotFound(_)));

    let error = set_link_metric(&mut monitor, "ge0", Some(10)).unwrap_err();
    assert!(matches!(error, Error::InterfaceNotFound(_)));

    let error =
        set_adjacency_metric(&mut monitor, "B", "eth0", Some(10)).unwrap_err();
    assert!(matches!(error, Error::AdjacencyNotFound(..)));
}

#[tokio::test]
async fn node_drain_advertises_immediately() {
    let mut monitor = TestMonitor::new(config_single_area("A"));

    set_node_overload(&mut monitor, true).unwrap();

    // No debounce involved.
    let (_, db) = monitor.recv_adj_db();
    assert!(db.overloaded);
    assert!(monitor.master.state.is_overloaded);

    set_node_overload(&mut monitor, false).unwrap();
    let (_, db) = monitor.recv_adj_db();
    assert!(!db.overloaded);
}

#[tokio::test]
async fn link_drain_is_applied_to_the_published_database() {
    let mut monitor = TestMonitor::new(config_single_area("A"));
    monitor.link_up("eth0", 1);
    monitor.neighbor(neighbor_event(
        NeighborEventType::Up,
        "B",
        "eth0",
        "0",
        ip6!("fe80::b"),
        1000,
        0,
    ));
    monitor.drain_outputs();

    set_interface_overload(&mut monitor, "eth0", true).unwrap();
    monitor.flush_adjacencies();
    let (_, db) = monitor.recv_adj_db();
    assert!(db.adjacencies[0].overloaded);
}

#[tokio::test]
async fn interface_dump_reports_overrides() {
    let mut monitor = TestMonitor::new(config_single_area("A"));
    monitor.link_up("eth0", 1);
    set_interface_overload(&mut monitor, "eth0", true).unwrap();
    set_link_metric(&mut monitor, "eth0", Some(42)).unwrap();

    let (responder, mut response) = oneshot::channel();
    monitor.request(Request::GetInterfaces { responder });
    let reply = response.try_recv().unwrap();

    assert_eq!(reply.node, "A");
    let details = &reply.interface_details["eth0"];
    assert!(details.overloaded);
    assert_eq!(details.metric_override, Some(42));
    assert!(details.info.up);
}

#[tokio::test]
async fn adjacency_dump_filters_by_area() {
    let mut config = config_single_area("A");
    config.areas.push(area("1", &["po.*"], &[]));
    let mut monitor = TestMonitor::new(config);

    monitor.neighbor(neighbor_event(
        NeighborEventType::Up,
        "B",
        "eth0",
        "0",
        ip6!("fe80::b"),
        1000,
        0,
    ));
    monitor.neighbor(neighbor_event(
        NeighborEventType::Up,
        "C",
        "po1",
        "1",
        ip6!("fe80::c"),
        1000,
        0,
    ));
    monitor.drain_outputs();

    let (responder, mut response) = oneshot::channel();
    monitor.request(Request::GetAdjacencies {
        areas: BTreeSet::new(),
        responder,
    });
    let dbs = response.try_recv().unwrap();
    assert_eq!(dbs.len(), 2);

    let (responder, mut response) = oneshot::channel();
    monitor.request(Request::GetAdjacencies {
        areas: ["1".to_owned()].into_iter().collect(),
        responder,
    });
    let dbs = response.try_recv().unwrap();
    assert_eq!(dbs.len(), 1);
    assert_eq!(dbs[0].area, "1");
    assert_eq!(dbs[0].adjacencies[0].other_node, "C");
}
