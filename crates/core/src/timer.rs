use std::fmt;

use crate::policy::ModePolicy;
use crate::time::{format_display, minutes_to_seconds};

/// Completion slot invoked when the countdown reaches zero.
pub type ExpiryCallback = Box<dyn FnMut() + Send>;

/// Snapshot of the countdown for presentation and persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerState {
    pub time_remaining_seconds: u32,
    pub is_paused: bool,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// One second was taken off the clock.
    Ticked,
    /// The timer is paused; nothing changed.
    Skipped,
    /// This tick reached zero and fired the expiry callback.
    Expired,
    /// The timer already expired or was halted.
    Finished,
}

/// Countdown for one exam session.
///
/// Knows nothing about questions or storage. Expiry fires exactly once, through
/// whichever callback is bound at the moment the countdown hits zero.
pub struct CountdownTimer {
    remaining: u32,
    paused: bool,
    finished: bool,
    policy: ModePolicy,
    on_expiry: Option<ExpiryCallback>,
}

impl CountdownTimer {
    /// Start a countdown of `time_limit_minutes`, or resume from `initial_remaining` seconds.
    #[must_use]
    pub fn start(time_limit_minutes: u32, initial_remaining: Option<u32>, policy: ModePolicy) -> Self {
        Self {
            remaining: initial_remaining.unwrap_or_else(|| minutes_to_seconds(time_limit_minutes)),
            paused: false,
            finished: false,
            policy,
            on_expiry: None,
        }
    }

    /// Replace the expiry callback. Only the latest binding is ever invoked.
    pub fn set_on_expiry(&mut self, callback: ExpiryCallback) {
        self.on_expiry = Some(callback);
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        TimerState {
            time_remaining_seconds: self.remaining,
            is_paused: self.paused,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[must_use]
    pub fn policy(&self) -> ModePolicy {
        self.policy
    }

    pub fn pause(&mut self) -> bool {
        self.set_paused(true)
    }

    pub fn resume(&mut self) -> bool {
        self.set_paused(false)
    }

    /// Flip pause in modes that allow it.
    pub fn toggle_pause(&mut self) -> bool {
        let requested = !self.paused;
        self.set_paused(requested)
    }

    /// Idempotent pause setter. Returns true if the pause state changed.
    ///
    /// Modes that cannot pause keep the timer running whatever is requested.
    pub fn set_paused(&mut self, paused: bool) -> bool {
        let next = self.policy.effective_pause(paused);
        let changed = next != self.paused;
        self.paused = next;
        changed
    }

    /// Advance the countdown by one second.
    pub fn tick(&mut self) -> TickOutcome {
        if self.finished {
            return TickOutcome::Finished;
        }
        if self.paused {
            return TickOutcome::Skipped;
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining > 0 {
            return TickOutcome::Ticked;
        }

        self.finished = true;
        if let Some(callback) = self.on_expiry.as_mut() {
            callback();
        }
        TickOutcome::Expired
    }

    /// Stop for good without firing the expiry callback.
    pub fn halt(&mut self) {
        self.finished = true;
        self.paused = false;
    }

    /// True below `threshold_secs`.
    #[must_use]
    pub fn is_low_time(&self, threshold_secs: u32) -> bool {
        self.remaining < threshold_secs
    }

    #[must_use]
    pub fn display(&self) -> String {
        format_display(self.remaining)
    }
}

impl fmt::Debug for CountdownTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountdownTimer")
            .field("remaining", &self.remaining)
            .field("paused", &self.paused)
            .field("finished", &self.finished)
            .field("mode", &self.policy.mode())
            .field("has_expiry_callback", &self.on_expiry.is_some())
            .finish()
    }
}
