//
// Copyright (c) The Rove Project Contributors
//
// SPDX-License-Identifier: MIT
//

#![warn(rust_2018_idioms)]

pub mod adjacency;
pub mod advertise;
pub mod allocator;
pub mod api;
pub mod config;
pub mod debug;
pub mod error;
pub mod events;
pub mod instance;
pub mod interface;
pub mod tasks;

use rove_utils::{Database, Sender};
use rove_utils::task::Task;
use tracing::Instrument;

use crate::config::Config;
use crate::instance::{InputChannelsRx, Master, OutputChannelsTx, channels};

// ===== global functions =====

// Starts the link monitor on its own task, returning the management handle
// and the task handle. Dropping the management handle (or the task handle)
// shuts the monitor down.
pub fn start(
    config: Config,
    db: Option<Database>,
    outputs: OutputChannelsTx,
    inputs: InputChannelsRx,
) -> (Sender<api::Request>, Task<()>) {
    let (api_tx, channels_tx, channels_rx) = channels(outputs, inputs);

    let task = Task::spawn(
        async move {
            let mut master = Master::new(config, db, channels_tx);
            master.init();
            master.run(channels_rx).await;
        }
        .instrument(tracing::debug_span!("link-monitor")),
    );

    (api_tx, task)
}
