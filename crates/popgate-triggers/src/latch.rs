//! Single-shot detector state machine.
//!
//! ```text
//! Idle ──arm──▶ Armed ──fire──▶ Triggered
//!   │             │
//!   └────stop─────┴──────────▶ Stopped
//! ```
//!
//! `Triggered` and `Stopped` are terminal.

use parking_lot::Mutex;

/// Lifecycle state of one detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchState {
    /// Created, not yet started.
    Idle,
    /// Started and waiting for its condition.
    Armed,
    /// Condition met; the detector has resolved.
    Triggered,
    /// Stopped before (or instead of) triggering.
    Stopped,
}

impl LatchState {
    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Triggered | Self::Stopped)
    }
}

/// Mutex-guarded [`LatchState`].
#[derive(Debug)]
pub struct TriggerLatch {
    state: Mutex<LatchState>,
}

impl Default for TriggerLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerLatch {
    /// New latch in [`LatchState::Idle`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LatchState::Idle),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> LatchState {
        *self.state.lock()
    }

    /// Whether the latch is [`LatchState::Armed`].
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.state() == LatchState::Armed
    }

    /// `Idle → Armed`. Returns `false` from any other state.
    pub fn arm(&self) -> bool {
        self.transition(LatchState::Idle, LatchState::Armed)
    }

    /// `Armed → Triggered`. Returns `false` if not armed, so at most one
    /// caller ever wins.
    pub fn fire(&self) -> bool {
        self.transition(LatchState::Armed, LatchState::Triggered)
    }

    /// `Armed → Stopped`, for a detector that resolved unmet.
    pub fn abandon(&self) -> bool {
        self.transition(LatchState::Armed, LatchState::Stopped)
    }

    /// `Idle | Armed → Stopped`. Returns `false` if already terminal.
    pub fn stop(&self) -> bool {
        let mut state = self.state.lock();
        if state.is_terminal() {
            return false;
        }
        *state = LatchState::Stopped;
        true
    }

    fn transition(&self, from: LatchState, to: LatchState) -> bool {
        let mut state = self.state.lock();
        if *state != from {
            return false;
        }
        *state = to;
        true
    }
}
