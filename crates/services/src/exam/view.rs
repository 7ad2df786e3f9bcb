use exam_core::model::{ExamMode, OptionLabel, Question, QuestionId, SubmissionStats};

use super::session::ExamSession;
use super::submission::SubmissionPhase;

/// One cell of the question grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionStatus {
    pub id: QuestionId,
    pub answered: bool,
    pub flagged: bool,
    pub current: bool,
}

/// Anti-cheat counter shown next to the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViolationBadge {
    pub count: u32,
    pub max: u32,
    pub limit_reached: bool,
}

/// The question on screen together with what the candidate did with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentQuestion {
    pub question: Question,
    pub selected: Option<OptionLabel>,
    pub flagged: bool,
}

/// Render-ready snapshot of an exam session.
///
/// Built fresh on every call; holds no references back into the session.
/// Only the timer is pre-formatted, everything else is left to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamView {
    pub title: String,
    pub mode: ExamMode,

    pub timer_display: String,
    pub time_remaining_seconds: u32,
    pub is_low_time: bool,
    pub can_pause: bool,
    pub is_paused: bool,

    pub current: Option<CurrentQuestion>,
    pub has_previous: bool,
    pub has_next: bool,
    pub grid: Vec<QuestionStatus>,

    pub answered_count: usize,
    pub flagged_count: usize,
    pub completion_percent: u32,
    pub violations: ViolationBadge,

    pub sidebar_open: bool,
    pub phase: SubmissionPhase,
    pub stats: SubmissionStats,
}

impl ExamView {
    pub(crate) fn build(session: &ExamSession) -> Self {
        let exam = session.exam();
        let sheet = session.session_state();
        let timer = session.timer();
        let settings = session.settings();
        let current_id = sheet.current_question();
        let stats = session.compute_stats();

        let current = exam.question(current_id).map(|question| CurrentQuestion {
            question: question.clone(),
            selected: sheet.answer_for(current_id),
            flagged: sheet.is_flagged(current_id),
        });

        let grid = exam
            .questions()
            .iter()
            .map(|question| QuestionStatus {
                id: question.id,
                answered: sheet.answer_for(question.id).is_some(),
                flagged: sheet.is_flagged(question.id),
                current: question.id == current_id,
            })
            .collect();

        let max_violations = settings.max_violations();
        let violation_count = session.violation_count();

        Self {
            title: exam.title().to_owned(),
            mode: session.mode(),
            timer_display: timer.display(),
            time_remaining_seconds: timer.remaining(),
            is_low_time: timer.is_low_time(settings.low_time_threshold_secs()),
            can_pause: timer.policy().can_pause(),
            is_paused: timer.is_paused(),
            current,
            has_previous: current_id.value() > 1,
            has_next: current_id.value() < exam.question_count(),
            grid,
            answered_count: sheet.answered_count(),
            flagged_count: sheet.flagged_count(),
            completion_percent: stats.completion_percent(),
            violations: ViolationBadge {
                count: violation_count,
                max: max_violations,
                limit_reached: violation_count >= max_violations,
            },
            sidebar_open: session.is_sidebar_open(),
            phase: session.submission_phase(),
            stats,
        }
    }
}
