// Per-document save scheduling.
//
// Idle -> PendingLocalSave -> PendingRemotePush -> Idle. An edit re-arms the
// short local timer and drops any pending push. A completed local save arms
// the long push timer, unless a push is already in flight, in which case the
// push is re-armed once that request settles. A push that fails because the
// server is unreachable is retried on its own with a doubling delay.

use std::time::Duration;

use tokio::time::Instant;

/// Upper bound on the delay between retries of an unreachable push.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub local_save_delay: Duration,
    pub remote_push_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    PendingLocalSave { due: Instant },
    PendingRemotePush { due: Instant },
}

/// Work that has come due for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueAction {
    LocalSave,
    RemotePush,
}

#[derive(Debug, Clone)]
pub struct DocSchedule {
    phase: Phase,
    pushing: bool,
    push_after_flight: bool,
    retry_delay: Option<Duration>,
}

impl Default for DocSchedule {
    fn default() -> Self {
        Self { phase: Phase::Idle, pushing: false, push_after_flight: false, retry_delay: None }
    }
}

impl DocSchedule {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_pushing(&self) -> bool {
        self.pushing
    }

    pub fn on_edit(&mut self, now: Instant, config: &ScheduleConfig) {
        self.phase = Phase::PendingLocalSave { due: now + config.local_save_delay };
    }

    pub fn on_local_saved(&mut self, now: Instant, config: &ScheduleConfig) {
        if self.pushing {
            self.push_after_flight = true;
            self.phase = Phase::Idle;
        } else {
            self.phase = Phase::PendingRemotePush { due: now + config.remote_push_delay };
        }
    }

    /// Request a push at `now`, e.g. after loading a dirty draft.
    pub fn push_now(&mut self, now: Instant) {
        if self.pushing {
            self.push_after_flight = true;
        } else if !matches!(self.phase, Phase::PendingLocalSave { .. }) {
            self.phase = Phase::PendingRemotePush { due: now };
        }
    }

    pub fn begin_push(&mut self) {
        self.pushing = true;
        self.push_after_flight = false;
        if matches!(self.phase, Phase::PendingRemotePush { .. }) {
            self.phase = Phase::Idle;
        }
    }

    /// Settle an in-flight push. `still_dirty` re-arms the push timer when
    /// the draft changed while the request was out.
    pub fn finish_push(&mut self, now: Instant, still_dirty: bool, config: &ScheduleConfig) {
        self.pushing = false;
        self.retry_delay = None;
        let rearm = std::mem::take(&mut self.push_after_flight) || still_dirty;
        if rearm && self.phase == Phase::Idle {
            self.phase = Phase::PendingRemotePush { due: now + config.remote_push_delay };
        }
    }

    /// Settle a push that could not reach the server and schedule the next
    /// attempt. The delay starts at the push delay and doubles per failure up
    /// to [`MAX_RETRY_DELAY`]. Returns the delay used.
    pub fn retry_push(&mut self, now: Instant, config: &ScheduleConfig) -> Duration {
        self.pushing = false;
        self.push_after_flight = false;
        let delay = match self.retry_delay {
            Some(previous) => previous.saturating_mul(2).min(MAX_RETRY_DELAY),
            None => config.remote_push_delay.min(MAX_RETRY_DELAY),
        };
        self.retry_delay = Some(delay);
        if self.phase == Phase::Idle {
            self.phase = Phase::PendingRemotePush { due: now + delay };
        }
        delay
    }

    /// Drop both timers. Used by force-save and flush.
    pub fn cancel(&mut self) {
        self.phase = Phase::Idle;
        self.push_after_flight = false;
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::Idle => None,
            Phase::PendingLocalSave { due } => Some(due),
            Phase::PendingRemotePush { due } if !self.pushing => Some(due),
            Phase::PendingRemotePush { .. } => None,
        }
    }

    pub fn due_action(&self, now: Instant) -> Option<DueAction> {
        match self.phase {
            Phase::PendingLocalSave { due } if due <= now => Some(DueAction::LocalSave),
            Phase::PendingRemotePush { due } if due <= now && !self.pushing => {
                Some(DueAction::RemotePush)
            }
            _ => None,
        }
    }
}
