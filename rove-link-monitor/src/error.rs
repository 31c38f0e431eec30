//
// Copyright (c) The Rove Project Contributors
//
// SPDX-License-Identifier: MIT
//

use rove_utils::DatabaseError;
use rove_utils::southbound::SnapshotError;
use tracing::{error, warn};

// Link monitor errors.
#[derive(Debug)]
pub enum Error {
    // Management requests
    InterfaceNotFound(String),
    AdjacencyNotFound(String, String),
    // Event input
    NeighborMissingTransportAddr(String, String),
    UnknownInterfaceIndex(u32),
    UnknownNeighborEvent(String),
    // External collaborators
    SnapshotFailure(SnapshotError),
    Database(DatabaseError),
    SerializeFailure(serde_json::Error),
    // Configuration
    InvalidRegex(regex::Error),
}

// ===== impl Error =====

impl Error {
    pub(crate) fn log(&self) {
        match self {
            Error::InterfaceNotFound(ifname) => {
                warn!(%ifname, "{}", self);
            }
            Error::AdjacencyNotFound(node, ifname) => {
                warn!(%node, %ifname, "{}", self);
            }
            Error::NeighborMissingTransportAddr(node, ifname) => {
                warn!(%node, %ifname, "{}", self);
            }
            Error::UnknownInterfaceIndex(ifindex) => {
                warn!(%ifindex, "{}", self);
            }
            Error::UnknownNeighborEvent(node) => {
                warn!(%node, "{}", self);
            }
            Error::SnapshotFailure(error) => {
                error!(%error, "{}", self);
            }
            Error::Database(error) => {
                error!(%error, "{}", self);
            }
            Error::SerializeFailure(error) => {
                error!(%error, "{}", self);
            }
            Error::InvalidRegex(error) => {
                error!(%error, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InterfaceNotFound(..) => {
                write!(f, "interface not found")
            }
            Error::AdjacencyNotFound(..) => {
                write!(f, "adjacency not found")
            }
            Error::NeighborMissingTransportAddr(..) => {
                write!(f, "neighbor event misses the transport address")
            }
            Error::UnknownInterfaceIndex(..) => {
                write!(f, "address event for unknown interface index")
            }
            Error::UnknownNeighborEvent(..) => {
                write!(f, "unknown neighbor event type")
            }
            Error::SnapshotFailure(..) => {
                write!(f, "failed to fetch the kernel interface snapshot")
            }
            Error::Database(..) => {
                write!(f, "failed to access the persistent store")
            }
            Error::SerializeFailure(..) => {
                write!(f, "failed to serialize the adjacency database")
            }
            Error::InvalidRegex(..) => {
                write!(f, "invalid interface matching expression")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::SnapshotFailure(error) => Some(error),
            Error::SerializeFailure(error) => Some(error),
            Error::InvalidRegex(error) => Some(error),
            _ => None,
        }
    }
}
