use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use exam_core::model::{
    AttemptId, ExamMode, OptionLabel, QuestionId, ScoreReport, SubmissionStats,
};

/// Why the exam ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SubmitReason {
    /// The candidate confirmed the submit prompt.
    Manual,
    /// The countdown reached zero.
    TimeExpired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionPhase {
    Idle,
    AwaitingConfirmation,
    Submitted(SubmitReason),
}

/// Everything handed to the completion handler when an exam ends.
///
/// Serializes with camelCase keys for hand-off to grading or reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedExam {
    pub attempt_id: AttemptId,
    pub exam_title: String,
    pub mode: ExamMode,
    pub reason: SubmitReason,
    pub answers: BTreeMap<QuestionId, OptionLabel>,
    pub stats: SubmissionStats,
    pub score: ScoreReport,
    pub submitted_at: DateTime<Utc>,
}

/// Receives the final answers. Called at most once per session.
pub type CompletionHandler = Box<dyn FnOnce(SubmittedExam) + Send>;

/// Confirm / cancel / submit state machine.
///
/// `Idle -> AwaitingConfirmation -> Submitted`, with cancel leading back to `Idle`.
/// Expiry may submit from either live phase. `Submitted` is terminal.
pub struct SubmissionWorkflow {
    phase: SubmissionPhase,
    on_complete: Option<CompletionHandler>,
}

impl SubmissionWorkflow {
    #[must_use]
    pub fn new(on_complete: CompletionHandler) -> Self {
        Self {
            phase: SubmissionPhase::Idle,
            on_complete: Some(on_complete),
        }
    }

    #[must_use]
    pub fn phase(&self) -> SubmissionPhase {
        self.phase
    }

    #[must_use]
    pub fn is_awaiting_confirmation(&self) -> bool {
        self.phase == SubmissionPhase::AwaitingConfirmation
    }

    #[must_use]
    pub fn is_submitted(&self) -> bool {
        matches!(self.phase, SubmissionPhase::Submitted(_))
    }

    /// Open the confirmation prompt.
    pub fn request_submit(&mut self) -> bool {
        if self.phase != SubmissionPhase::Idle {
            return false;
        }
        self.phase = SubmissionPhase::AwaitingConfirmation;
        true
    }

    /// Close the confirmation prompt without side effects.
    pub fn cancel_submit(&mut self) -> bool {
        if self.phase != SubmissionPhase::AwaitingConfirmation {
            return false;
        }
        self.phase = SubmissionPhase::Idle;
        true
    }

    /// Enter `Submitted` and hand out the completion handler.
    ///
    /// Returns `None` when the transition is not allowed: already submitted, or a manual
    /// submit that was never requested. The handler can be taken only once.
    pub fn commit(&mut self, reason: SubmitReason) -> Option<CompletionHandler> {
        let allowed = match (self.phase, reason) {
            (SubmissionPhase::Submitted(_), _) => false,
            (SubmissionPhase::AwaitingConfirmation, _) => true,
            (SubmissionPhase::Idle, SubmitReason::TimeExpired) => true,
            (SubmissionPhase::Idle, SubmitReason::Manual) => false,
        };
        if !allowed {
            return None;
        }
        self.phase = SubmissionPhase::Submitted(reason);
        self.on_complete.take()
    }
}

impl fmt::Debug for SubmissionWorkflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionWorkflow")
            .field("phase", &self.phase)
            .field("handler_pending", &self.on_complete.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workflow() -> SubmissionWorkflow {
        SubmissionWorkflow::new(Box::new(|_| {}))
    }

    #[test]
    fn request_then_cancel_returns_to_idle() {
        let mut flow = workflow();
        assert!(flow.request_submit());
        assert!(!flow.request_submit());
        assert!(flow.is_awaiting_confirmation());
        assert!(flow.cancel_submit());
        assert_eq!(flow.phase(), SubmissionPhase::Idle);
        assert!(!flow.cancel_submit());
    }

    #[test]
    fn manual_commit_requires_request() {
        let mut flow = workflow();
        assert!(flow.commit(SubmitReason::Manual).is_none());
        assert_eq!(flow.phase(), SubmissionPhase::Idle);

        flow.request_submit();
        assert!(flow.commit(SubmitReason::Manual).is_some());
        assert_eq!(flow.phase(), SubmissionPhase::Submitted(SubmitReason::Manual));
    }

    #[test]
    fn submitted_exam_serializes_camel_case() {
        use exam_core::time::fixed_now;

        let submitted = SubmittedExam {
            attempt_id: AttemptId::generate(),
            exam_title: "N3 Mock".into(),
            mode: ExamMode::Practice,
            reason: SubmitReason::TimeExpired,
            answers: BTreeMap::from([(QuestionId::new(2), OptionLabel::C)]),
            stats: SubmissionStats {
                total_questions: 3,
                answered_questions: 1,
                unanswered_questions: 2,
                flagged_questions: 0,
                time_remaining_seconds: 0,
            },
            score: ScoreReport {
                graded_questions: 3,
                correct: 1,
                incorrect: 0,
                unanswered: 2,
                percentage: 33,
            },
            submitted_at: fixed_now(),
        };

        let value = serde_json::to_value(&submitted).unwrap();
        assert_eq!(value["examTitle"], "N3 Mock");
        assert_eq!(value["mode"], "practice");
        assert_eq!(value["reason"], "timeExpired");
        assert_eq!(value["answers"], serde_json::json!({ "2": "C" }));
        assert_eq!(value["stats"]["answeredQuestions"], 1);
        assert_eq!(value["score"]["percentage"], 33);
        assert_eq!(value["submittedAt"], "2023-11-14T22:13:20Z");
    }

    #[test]
    fn expiry_commits_from_idle_and_only_once() {
        let mut flow = workflow();
        assert!(flow.commit(SubmitReason::TimeExpired).is_some());
        assert!(flow.commit(SubmitReason::TimeExpired).is_none());
        assert!(flow.commit(SubmitReason::Manual).is_none());
        assert!(!flow.request_submit());
        assert!(flow.is_submitted());
    }
}
