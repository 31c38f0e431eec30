//
// Copyright (c) The Rove Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use rove_utils::UnboundedSender;
use rove_utils::task::TimeoutTask;

use crate::tasks::messages::input::ProtocolMsg;

//
// Link monitor tasks diagram:
//
//                                    +--------------+
//                                    |  management  |
//                                    +--------------+
//                                          | ^
//                                          | |
//                              api_rx (1x) V | (Nx) responders
//                                    +--------------+
//                                    |              |
//                 neighbor_rx (1x) ->|              |-> (1x) interface_updates
//                  netlink_rx (1x) ->|              |-> (1x) prefix_updates
//                  kvstore_rx (1x) ->|              |-> (1x) peer_updates
//              adj_hold_timer (1x) ->|    master    |-> (1x) kvstore requests
//         platform_sync_timer (1x) ->|              |-> (1x) netlink requests
//           iface_retry_timer (1x) ->|              |-> (1x) log samples
//        throttles/allocators (Nx) ->|              |
//                                    |              |
//                                    +--------------+
//

// Link monitor inter-task message types.
pub mod messages {
    // Type aliases.
    pub type ProtocolInputMsg = input::ProtocolMsg;

    // Input messages (child task -> main task).
    pub mod input {
        use rove_utils::southbound::{LinkEntry, SnapshotError};
        use serde::{Deserialize, Serialize};

        #[derive(Debug)]
        #[derive(Deserialize, Serialize)]
        pub enum ProtocolMsg {
            // Initial advertisement hold expired.
            AdjHoldExpired,
            // Debounced adjacency advertisement fired.
            AdvertiseAdjacencies,
            // Debounced interface/address advertisement fired, or the
            // flap-damping retry timer expired.
            AdvertiseIfaceAddr,
            // Periodic kernel snapshot reconciliation is due.
            SyncInterfaces,
            // Kernel snapshot arrived (or failed).
            LinkSnapshot(Result<Vec<LinkEntry>, SnapshotError>),
            // Deferred start of an area's node label allocator.
            StartAllocator { area: String },
            // Backoff or settling timer of an area's allocator expired.
            AllocatorTimeout { area: String },
        }
    }
}

// ===== Link monitor tasks =====

// Initial advertisement hold timer.
pub(crate) fn adj_hold_timer(
    hold_time: Duration,
    protocol_tx: &UnboundedSender<ProtocolMsg>,
) -> TimeoutTask {
    let protocol_tx = protocol_tx.clone();
    TimeoutTask::new(hold_time, move || async move {
        let _ = protocol_tx.send(ProtocolMsg::AdjHoldExpired);
    })
}

// Kernel snapshot reconciliation timer. Re-armed after every attempt, with
// the failure backoff applied when the previous attempt failed.
pub(crate) fn platform_sync_timer(
    delay: Duration,
    protocol_tx: &UnboundedSender<ProtocolMsg>,
) -> TimeoutTask {
    let protocol_tx = protocol_tx.clone();
    TimeoutTask::new(delay, move || async move {
        let _ = protocol_tx.send(ProtocolMsg::SyncInterfaces);
    })
}

// Re-advertisement timer for interfaces sitting out a flap-damping penalty.
pub(crate) fn iface_retry_timer(
    delay: Duration,
    protocol_tx: &UnboundedSender<ProtocolMsg>,
) -> TimeoutTask {
    let protocol_tx = protocol_tx.clone();
    TimeoutTask::new(delay, move || async move {
        let _ = protocol_tx.send(ProtocolMsg::AdvertiseIfaceAddr);
    })
}

// Deferred allocator start timer (one per area).
pub(crate) fn allocator_start_timer(
    delay: Duration,
    area: String,
    protocol_tx: &UnboundedSender<ProtocolMsg>,
) -> TimeoutTask {
    let protocol_tx = protocol_tx.clone();
    TimeoutTask::new(delay, move || async move {
        let _ = protocol_tx.send(ProtocolMsg::StartAllocator { area });
    })
}

// Allocator backoff/settling timer.
pub(crate) fn allocator_timer(
    delay: Duration,
    area: String,
    protocol_tx: &UnboundedSender<ProtocolMsg>,
) -> TimeoutTask {
    let protocol_tx = protocol_tx.clone();
    TimeoutTask::new(delay, move || async move {
        let _ = protocol_tx.send(ProtocolMsg::AllocatorTimeout { area });
    })
}
