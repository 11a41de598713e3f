// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Notify;

/// Exclusivity gate between the human and the agent.
///
/// The flag is the logical lock on the PTY write path: it is held for the
/// whole agent turn but never across a suspension point in a way that
/// blocks the human — `interrupt` flips it synchronously and wakes any
/// waiter, so user bytes always preempt.
///
/// Each acquisition gets a generation number. Agent bytes are tagged with
/// it and the session loop drops bytes from stale generations, so no agent
/// byte can reach the PTY after a preemption.
#[derive(Debug, Default)]
pub struct AgentGate {
    active: AtomicBool,
    generation: AtomicU64,
    interrupted: Notify,
}

impl AgentGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the agent turn. Returns the turn's generation, or `None` if
    /// an agent turn is already in flight.
    pub fn try_acquire(&self) -> Option<u64> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(self.generation.load(Ordering::Acquire))
        } else {
            None
        }
    }

    /// Release a turn acquired with [`try_acquire`]. No-op if the turn was
    /// already torn down by an interrupt.
    ///
    /// [`try_acquire`]: Self::try_acquire
    pub fn release(&self, generation: u64) -> bool {
        if self.generation.load(Ordering::Acquire) != generation {
            return false;
        }
        self.active
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Preempt the agent turn: clear the flag, invalidate the generation,
    /// wake waiters. Idempotent. Returns whether a turn was active.
    pub fn interrupt(&self) -> bool {
        let was_active = self
            .active
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if was_active {
            self.generation.fetch_add(1, Ordering::AcqRel);
            self.interrupted.notify_waiters();
        }
        was_active
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Whether bytes tagged with this generation may still be written.
    pub fn accepts(&self, generation: u64) -> bool {
        self.active.load(Ordering::Acquire)
            && self.generation.load(Ordering::Acquire) == generation
    }

    /// Sleep for `dur`, waking early on interrupt. Returns `true` when the
    /// turn was torn down (already or during the sleep).
    pub async fn sleep_or_interrupt(&self, generation: u64, dur: std::time::Duration) -> bool {
        let notified = self.interrupted.notified();
        tokio::pin!(notified);
        if !self.accepts(generation) {
            return true;
        }
        tokio::select! {
            _ = &mut notified => true,
            _ = tokio::time::sleep(dur) => !self.accepts(generation),
        }
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
