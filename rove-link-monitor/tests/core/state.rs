//
// Copyright (c) The Rove Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::{Arc, Mutex};

use pickledb::{PickleDb, PickleDbDumpPolicy, SerializationMethod};
use rove_utils::Database;

use super::{TestMonitor, config_single_area};

fn temp_db(name: &str) -> (Database, std::path::PathBuf) {
    let path = std::env::temp_dir().join(format!(
        "rove-link-monitor-{}-{}.json",
        name,
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    let db = PickleDb::new(
        &path,
        PickleDbDumpPolicy::AutoDump,
        SerializationMethod::Json,
    );
    (Arc::new(Mutex::new(db)), path)
}

fn reload_db(path: &std::path::Path) -> Database {
    let db = PickleDb::load(
        path,
        PickleDbDumpPolicy::AutoDump,
        SerializationMethod::Json,
    )
    .expect("failed to reload the config store");
    Arc::new(Mutex::new(db))
}

#[tokio::test]
async fn drain_state_survives_restarts() {
    let (db, path) = temp_db("drain");

    // First boot: nothing stored, the drain flag wins.
    let mut config = config_single_area("A");
    config.assume_drained = true;
    let mut monitor = TestMonitor::with_db(config, Some(db));
    assert!(monitor.master.state.is_overloaded);

    // Any advertisement rewrites the record.
    monitor.flush_adjacencies();
    let (_, adj_db) = monitor.recv_adj_db();
    assert!(adj_db.overloaded);
    drop(monitor);

    // Second boot: the stored drain bit beats the flag.
    let mut config = config_single_area("A");
    config.assume_drained = false;
    let monitor = TestMonitor::with_db(config, Some(reload_db(&path)));
    assert!(monitor.master.state.is_overloaded);
    drop(monitor);

    // Unless the override is requested.
    let mut config = config_single_area("A");
    config.assume_drained = false;
    config.override_drain_state = true;
    let monitor = TestMonitor::with_db(config, Some(reload_db(&path)));
    assert!(!monitor.master.state.is_overloaded);

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn overrides_survive_restarts() {
    let (db, path) = temp_db("overrides");

    let mut monitor =
        TestMonitor::with_db(config_single_area("A"), Some(db));
    monitor.link_up("eth0", 1);
    monitor
        .master
        .state
        .link_metric_overrides
        .insert("eth0".to_owned(), 20);
    monitor
        .master
        .state
        .adj_metric_overrides
        .insert(
            rove_link_monitor::adjacency::AdjacencyKey::new(
                "B".to_owned(),
                "eth0".to_owned(),
            ),
            30,
        );
    // Advertising persists the record.
    monitor.flush_adjacencies();
    monitor.drain_outputs();
    let state = monitor.master.state.clone();
    drop(monitor);

    let monitor =
        TestMonitor::with_db(config_single_area("A"), Some(reload_db(&path)));
    assert_eq!(monitor.master.state, state);

    let _ = std::fs::remove_file(&path);
}
