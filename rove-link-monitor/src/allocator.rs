//
// Copyright (c) The Rove Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use rove_utils::UnboundedSender;
use rove_utils::backoff::ExponentialBackoff;
use rove_utils::kvstore::{KeyValue, KvRequest, Publication};
use rove_utils::task::TimeoutTask;

use crate::config::{LabelRange, NODE_LABEL_KEY_PREFIX};
use crate::debug::Debug;
use crate::tasks;
use crate::tasks::messages::input::ProtocolMsg;

// Election pacing.
const ALLOC_MIN_BACKOFF: Duration = Duration::from_millis(100);
const ALLOC_MAX_BACKOFF: Duration = Duration::from_secs(2);

// An unchallenged proposal is accepted once it stands for this long.
const SETTLE_TIMEOUT: Duration = Duration::from_millis(500);

// TTL of the election keys this node writes.
const ALLOC_KEY_TTL: Duration = Duration::from_secs(300);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Phase {
    // Not started, or waiting out a lost election round.
    Idle,
    Backoff,
    // Proposal written; waiting for the settling interval to pass without a
    // conflicting proposal of higher priority.
    Settling,
    Allocated,
}

// Per-area node label election, arbitrated through the KvStore.
//
// The allocator claims a label by writing the label's well-known key with
// this node as originator. Conflicts are resolved by `(version,
// originator)` ordering; the loser re-hashes onto another candidate after an
// exponential backoff. All timers report back into the dispatcher as
// protocol messages; no state is touched outside of it.
#[derive(Debug)]
pub struct RangeAllocator {
    area: String,
    node: String,
    range: LabelRange,
    backoff: ExponentialBackoff,
    phase: Phase,
    candidate: Option<u32>,
    attempt: u64,
    version: i64,
    allocated: Option<u32>,
    kv_tx: UnboundedSender<KvRequest>,
    protocol_tx: UnboundedSender<ProtocolMsg>,
    timer: Option<TimeoutTask>,
}

// ===== impl RangeAllocator =====

impl RangeAllocator {
    pub(crate) fn new(
        area: String,
        node: String,
        range: LabelRange,
        kv_tx: UnboundedSender<KvRequest>,
        protocol_tx: UnboundedSender<ProtocolMsg>,
    ) -> RangeAllocator {
        RangeAllocator {
            area,
            node,
            range,
            backoff: ExponentialBackoff::new(
                ALLOC_MIN_BACKOFF,
                ALLOC_MAX_BACKOFF,
            ),
            phase: Phase::Idle,
            candidate: None,
            attempt: 0,
            version: 0,
            allocated: None,
            kv_tx,
            protocol_tx,
            timer: None,
        }
    }

    // Starts the election. A previously held label (from the persistent
    // record) seeds the first proposal so a restarting node converges back
    // onto its old value.
    pub(crate) fn start(&mut self, initial: Option<u32>) {
        let candidate = initial
            .filter(|label| self.range.contains(*label))
            .unwrap_or_else(|| self.probe(0));
        Debug::AllocatorStart(&self.area, candidate).log();
        self.candidate = Some(candidate);
        self.propose();
    }

    pub fn allocated(&self) -> Option<u32> {
        self.allocated
    }

    // An election round (or its backoff) is in flight.
    pub fn is_pending(&self) -> bool {
        self.timer.is_some()
    }

    // Handles a KvStore publication for this area. Returns `Some(0)` when a
    // previously held label was just lost to a higher-priority claim.
    pub(crate) fn process_publication(
        &mut self,
        publication: &Publication,
    ) -> Option<u32> {
        let candidate = self.candidate?;
        let kv = publication.key_vals.get(&key_for(candidate))?;
        if kv.originator == self.node || !self.beats(kv) {
            return None;
        }

        // Lost this value; back off and probe for another one.
        let had_label = self.phase == Phase::Allocated;
        self.allocated = None;
        self.phase = Phase::Backoff;
        self.backoff.report_error();
        self.timer = Some(tasks::allocator_timer(
            self.backoff.time_remaining(Instant::now()),
            self.area.clone(),
            &self.protocol_tx,
        ));
        had_label.then_some(0)
    }

    // Handles an expired backoff or settling timer. Returns the allocated
    // label when the election just converged.
    pub(crate) fn process_timeout(&mut self) -> Option<u32> {
        self.timer = None;
        match self.phase {
            Phase::Settling => {
                self.phase = Phase::Allocated;
                self.allocated = self.candidate;
                self.backoff.report_success();
                self.allocated
            }
            Phase::Backoff => {
                self.attempt += 1;
                self.candidate = Some(self.probe(self.attempt));
                self.propose();
                None
            }
            Phase::Idle | Phase::Allocated => None,
        }
    }

    // Writes the current candidate's key and arms the settling timer.
    fn propose(&mut self) {
        // Candidate is always set by the callers.
        let Some(candidate) = self.candidate else {
            return;
        };
        self.version += 1;
        Debug::AllocatorPropose(&self.area, candidate).log();
        let _ = self.kv_tx.send(KvRequest::SetKey {
            area: self.area.clone(),
            key: key_for(candidate),
            entry: KeyValue::new(
                self.node.clone(),
                self.node.clone(),
                self.version,
                Some(ALLOC_KEY_TTL),
            ),
        });
        self.phase = Phase::Settling;
        self.timer = Some(tasks::allocator_timer(
            SETTLE_TIMEOUT,
            self.area.clone(),
            &self.protocol_tx,
        ));
    }

    // Whether a remote claim takes precedence over our own proposal.
    fn beats(&self, kv: &KeyValue) -> bool {
        kv.version > self.version
            || (kv.version == self.version && kv.originator > self.node)
    }

    // Deterministic candidate sequence for this node.
    fn probe(&self, attempt: u64) -> u32 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        (&self.node, &self.area, attempt).hash(&mut hasher);
        self.range.start + (hasher.finish() % u64::from(self.range.size())) as u32
    }
}

// ===== helper functions =====

fn key_for(label: u32) -> String {
    format!("{}{}", NODE_LABEL_KEY_PREFIX, label)
}
