//
// Copyright (c) The Rove Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::{Arc, Mutex};

use pickledb::PickleDb;
use tokio::sync::{mpsc, oneshot};

pub mod backoff;
pub mod ip;
pub mod kvstore;
pub mod log;
pub mod lsdb;
pub mod neighbor;
pub mod prefix;
pub mod southbound;
pub mod task;

// Useful type definition(s).
pub type UnboundedSender<T> = mpsc::UnboundedSender<T>;
pub type UnboundedReceiver<T> = mpsc::UnboundedReceiver<T>;
pub type Sender<T> = mpsc::Sender<T>;
pub type Receiver<T> = mpsc::Receiver<T>;
pub type Responder<T> = oneshot::Sender<T>;

pub type Database = Arc<Mutex<PickleDb>>;
pub type DatabaseError = pickledb::error::Error;
