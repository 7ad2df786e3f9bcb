use crate::model::ExamMode;

/// What each exam mode is allowed to do.
///
/// | capability            | practice | challenge |
/// |-----------------------|----------|-----------|
/// | pause / resume        | yes      | no        |
/// | persist progress      | yes      | no        |
/// | restore at start      | yes      | no        |
/// | purge record at start | no       | yes       |
/// | clear record on submit| yes      | no        |
///
/// Every pause, persist and restore decision in the engine goes through this table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModePolicy {
    mode: ExamMode,
    can_pause: bool,
    persists: bool,
    restores: bool,
    purges_on_start: bool,
    clears_on_submit: bool,
}

impl ModePolicy {
    pub const PRACTICE: Self = Self {
        mode: ExamMode::Practice,
        can_pause: true,
        persists: true,
        restores: true,
        purges_on_start: false,
        clears_on_submit: true,
    };

    pub const CHALLENGE: Self = Self {
        mode: ExamMode::Challenge,
        can_pause: false,
        persists: false,
        restores: false,
        purges_on_start: true,
        clears_on_submit: false,
    };

    #[must_use]
    pub const fn for_mode(mode: ExamMode) -> Self {
        match mode {
            ExamMode::Practice => Self::PRACTICE,
            ExamMode::Challenge => Self::CHALLENGE,
        }
    }

    #[must_use]
    pub fn mode(&self) -> ExamMode {
        self.mode
    }

    #[must_use]
    pub fn can_pause(&self) -> bool {
        self.can_pause
    }

    #[must_use]
    pub fn persists(&self) -> bool {
        self.persists
    }

    #[must_use]
    pub fn restores(&self) -> bool {
        self.restores
    }

    #[must_use]
    pub fn purges_on_start(&self) -> bool {
        self.purges_on_start
    }

    #[must_use]
    pub fn clears_on_submit(&self) -> bool {
        self.clears_on_submit
    }

    /// Pause state the timer is allowed to hold when `requested` is asked for.
    #[must_use]
    pub fn effective_pause(&self, requested: bool) -> bool {
        self.can_pause && requested
    }
}
