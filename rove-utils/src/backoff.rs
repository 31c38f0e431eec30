//
// Copyright (c) The Rove Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::{Duration, Instant};

/// Exponential backoff state machine.
///
/// The holder reports errors and successes; the backoff answers, for a given
/// point in time, whether the guarded operation is still suppressed and for
/// how long. Every reported error doubles the penalty, bounded by
/// `[initial, maximum]`; a reported success clears it.
///
/// All queries take an explicit `now` so the state machine stays a pure
/// function of its inputs. The `Instant::now()`-based convenience wrappers
/// exist for call sites that don't care.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    initial: Duration,
    maximum: Duration,
    current: Duration,
    last_error: Option<Instant>,
}

// ===== impl ExponentialBackoff =====

impl ExponentialBackoff {
    /// Creates a new backoff bounded by `[initial, maximum]`.
    pub fn new(initial: Duration, maximum: Duration) -> ExponentialBackoff {
        ExponentialBackoff {
            initial,
            maximum,
            current: Duration::ZERO,
            last_error: None,
        }
    }

    /// Reports a failure (or a flap), charging the next penalty window.
    pub fn report_error(&mut self) {
        self.report_error_at(Instant::now());
    }

    /// Reports a failure observed at the given point in time.
    pub fn report_error_at(&mut self, now: Instant) {
        self.current =
            std::cmp::min(self.maximum, std::cmp::max(self.initial, self.current * 2));
        self.last_error = Some(now);
    }

    /// Reports a success, clearing any charged penalty.
    pub fn report_success(&mut self) {
        self.current = Duration::ZERO;
        self.last_error = None;
    }

    /// Returns the time remaining until the guarded operation may be retried.
    pub fn time_remaining(&self, now: Instant) -> Duration {
        match self.last_error {
            Some(last_error) => (last_error + self.current)
                .saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// Returns whether the backoff is currently suppressing the operation.
    pub fn is_active(&self, now: Instant) -> bool {
        !self.time_remaining(now).is_zero()
    }

    /// Returns whether the penalty has reached its upper bound.
    pub fn at_maximum(&self) -> bool {
        self.current >= self.maximum
    }
}
