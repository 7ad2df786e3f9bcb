use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use exam_core::model::{
    AttemptId, ExamDefinition, ExamMode, OptionLabel, QuestionId, ScoreReport, SessionState,
    SubmissionStats,
};
use exam_core::{Clock, CountdownTimer, EngineSettings, TickOutcome, TimerState};
use tracing::{debug, info};

use super::navigation::Navigator;
use super::persistence::PersistTrigger;
use super::store::SessionStore;
use super::submission::{
    CompletionHandler, SubmissionPhase, SubmissionWorkflow, SubmitReason, SubmittedExam,
};
use super::view::ExamView;
use crate::error::ExamSessionError;

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One running exam: countdown, answer sheet, navigation and submission in one place.
///
/// Driven through `&mut self` from a single logical thread; `ExamHandle` adds the
/// once-per-second ticking. Once submitted, the session is frozen and every mutating
/// call is a no-op.
pub struct ExamSession {
    attempt_id: AttemptId,
    exam: Arc<ExamDefinition>,
    settings: EngineSettings,
    clock: Clock,
    started_at: DateTime<Utc>,
    timer: CountdownTimer,
    store: SessionStore,
    navigator: Navigator,
    submission: SubmissionWorkflow,
    violation_count: u32,
    expiry_signal: Arc<AtomicBool>,
}

impl ExamSession {
    /// Wire the parts together. The timer's expiry slot is bound last, once the
    /// submission workflow it ends up driving exists.
    pub(crate) fn assemble(
        exam: Arc<ExamDefinition>,
        settings: EngineSettings,
        clock: Clock,
        store: SessionStore,
        restored_time: Option<u32>,
        on_complete: CompletionHandler,
    ) -> Self {
        let policy = store.policy();
        let timer = CountdownTimer::start(exam.time_limit_minutes(), restored_time, policy);

        let mut session = Self {
            attempt_id: AttemptId::generate(),
            started_at: clock.now(),
            exam,
            settings,
            clock,
            timer,
            store,
            navigator: Navigator::new(),
            submission: SubmissionWorkflow::new(on_complete),
            violation_count: 0,
            expiry_signal: Arc::new(AtomicBool::new(false)),
        };

        let signal = Arc::clone(&session.expiry_signal);
        session.timer.set_on_expiry(Box::new(move || {
            signal.store(true, Ordering::SeqCst);
        }));

        info!(
            attempt_id = %session.attempt_id,
            exam = session.exam.title(),
            mode = %policy.mode(),
            time_remaining = session.timer.remaining(),
            "exam session started"
        );
        session.persist(PersistTrigger::Interaction);
        session
    }

    #[must_use]
    pub fn attempt_id(&self) -> AttemptId {
        self.attempt_id
    }

    #[must_use]
    pub fn exam(&self) -> &ExamDefinition {
        &self.exam
    }

    #[must_use]
    pub fn mode(&self) -> ExamMode {
        self.store.policy().mode()
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn timer(&self) -> &CountdownTimer {
        &self.timer
    }

    #[must_use]
    pub fn timer_state(&self) -> TimerState {
        self.timer.state()
    }

    #[must_use]
    pub fn session_state(&self) -> &SessionState {
        self.store.state()
    }

    #[must_use]
    pub fn submission_phase(&self) -> SubmissionPhase {
        self.submission.phase()
    }

    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.submission.is_submitted()
    }

    #[must_use]
    pub fn is_sidebar_open(&self) -> bool {
        self.navigator.is_sidebar_open()
    }

    #[must_use]
    pub fn violation_count(&self) -> u32 {
        self.violation_count
    }

    /// Counts for the submit prompt, always computed from the current sheet and clock.
    #[must_use]
    pub fn compute_stats(&self) -> SubmissionStats {
        self.store
            .state()
            .stats(self.exam.question_count(), self.timer.remaining())
    }

    #[must_use]
    pub fn view(&self) -> ExamView {
        ExamView::build(self)
    }

    //
    // ─── ANSWERS & FLAGS ───────────────────────────────────────────────────────
    //

    pub fn select_answer(&mut self, id: QuestionId, option: OptionLabel) -> bool {
        if self.is_submitted() {
            return false;
        }
        let changed = self.store.select_answer(id, option);
        if changed {
            self.persist(PersistTrigger::Interaction);
        }
        changed
    }

    /// Answer the question currently on screen.
    pub fn answer_current(&mut self, option: OptionLabel) -> bool {
        let current = self.store.state().current_question();
        self.select_answer(current, option)
    }

    /// Returns the new flag state, or `None` once the exam is submitted or when `id` is
    /// not a question of this exam.
    pub fn toggle_flag(&mut self, id: QuestionId) -> Option<bool> {
        if self.is_submitted() {
            return None;
        }
        let flagged = self.store.toggle_flag(id)?;
        self.persist(PersistTrigger::Interaction);
        Some(flagged)
    }

    pub fn toggle_current_flag(&mut self) -> Option<bool> {
        let current = self.store.state().current_question();
        self.toggle_flag(current)
    }

    //
    // ─── NAVIGATION ────────────────────────────────────────────────────────────
    //

    pub fn go_to(&mut self, target: u32) -> bool {
        self.navigate(|nav, store| nav.go_to(store, target))
    }

    pub fn go_previous(&mut self) -> bool {
        self.navigate(Navigator::go_previous)
    }

    pub fn go_next(&mut self) -> bool {
        self.navigate(Navigator::go_next)
    }

    pub fn go_to_first_flagged(&mut self) -> bool {
        self.navigate(Navigator::go_to_first_flagged)
    }

    pub fn toggle_sidebar(&mut self) -> bool {
        self.navigator.toggle_sidebar()
    }

    pub fn close_sidebar(&mut self) {
        self.navigator.close_sidebar();
    }

    fn navigate(&mut self, step: impl FnOnce(&mut Navigator, &mut SessionStore) -> bool) -> bool {
        if self.is_submitted() {
            return false;
        }
        let moved = step(&mut self.navigator, &mut self.store);
        if moved {
            self.persist(PersistTrigger::Interaction);
        }
        moved
    }

    //
    // ─── TIMER ─────────────────────────────────────────────────────────────────
    //

    pub fn pause(&mut self) -> bool {
        self.set_paused(true)
    }

    pub fn resume(&mut self) -> bool {
        self.set_paused(false)
    }

    pub fn toggle_pause(&mut self) -> bool {
        let requested = !self.timer.is_paused();
        self.set_paused(requested)
    }

    /// Returns true if the pause state changed. Challenge runs never pause.
    pub fn set_paused(&mut self, paused: bool) -> bool {
        if self.is_submitted() {
            return false;
        }
        let changed = self.timer.set_paused(paused);
        if changed {
            debug!(attempt_id = %self.attempt_id, paused, "exam timer pause changed");
        }
        changed
    }

    /// Advance the countdown by one second; submits the exam when it hits zero.
    pub fn tick(&mut self) -> TickOutcome {
        let outcome = self.timer.tick();
        match outcome {
            TickOutcome::Ticked => self.persist(PersistTrigger::Tick),
            TickOutcome::Expired | TickOutcome::Skipped | TickOutcome::Finished => {}
        }
        if self.expiry_signal.swap(false, Ordering::SeqCst) {
            info!(attempt_id = %self.attempt_id, "exam time expired");
            self.finish(SubmitReason::TimeExpired);
        }
        outcome
    }

    //
    // ─── SUBMISSION ────────────────────────────────────────────────────────────
    //

    /// Open the submit confirmation. Does not touch the sheet or the timer.
    pub fn request_submit(&mut self) -> bool {
        self.submission.request_submit()
    }

    pub fn cancel_submit(&mut self) -> bool {
        self.submission.cancel_submit()
    }

    /// Submit after confirmation: clear the saved copy, then deliver the answers.
    ///
    /// # Errors
    ///
    /// Returns `ExamSessionError::AlreadySubmitted` if the exam already ended and
    /// `ExamSessionError::NotAwaitingConfirmation` if no submit was requested.
    pub fn confirm_submit(&mut self) -> Result<(), ExamSessionError> {
        if self.is_submitted() {
            return Err(ExamSessionError::AlreadySubmitted);
        }
        if !self.submission.is_awaiting_confirmation() {
            return Err(ExamSessionError::NotAwaitingConfirmation);
        }
        self.finish(SubmitReason::Manual);
        Ok(())
    }

    /// Record the anti-cheat violation count. The count only ever goes up.
    pub fn set_violation_count(&mut self, count: u32) {
        if count > self.violation_count {
            self.violation_count = count;
        }
    }

    fn finish(&mut self, reason: SubmitReason) {
        let Some(on_complete) = self.submission.commit(reason) else {
            return;
        };
        self.timer.halt();
        self.store.clear();

        let answers = self.store.state().answers().clone();
        let submitted = SubmittedExam {
            attempt_id: self.attempt_id,
            exam_title: self.exam.title().to_owned(),
            mode: self.mode(),
            reason,
            score: ScoreReport::grade(&self.exam, &answers),
            stats: self.compute_stats(),
            answers,
            submitted_at: self.clock.now(),
        };
        info!(
            attempt_id = %self.attempt_id,
            ?reason,
            answered = submitted.stats.answered_questions,
            total = submitted.stats.total_questions,
            "exam submitted"
        );
        on_complete(submitted);
    }

    fn persist(&self, trigger: PersistTrigger) {
        if self.is_submitted() {
            return;
        }
        self.store.persist(self.timer.remaining(), trigger);
    }

    /// Tear the session down, cancelling pending saves and waiting for queued deletes.
    pub async fn close(self) {
        debug!(attempt_id = %self.attempt_id, "closing exam session");
        self.store.close().await;
    }
}

impl fmt::Debug for ExamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExamSession")
            .field("attempt_id", &self.attempt_id)
            .field("exam", &self.exam.title())
            .field("timer", &self.timer)
            .field("store", &self.store)
            .field("submission", &self.submission)
            .field("violation_count", &self.violation_count)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
