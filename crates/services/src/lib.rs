#![forbid(unsafe_code)]

pub mod error;
pub mod exam;
pub mod exam_service;

pub use exam_core::Clock;

pub use error::ExamSessionError;
pub use exam::{
    CompletionHandler, CurrentQuestion, ExamHandle, ExamSession, ExamView, Navigator,
    PersistTrigger, QuestionStatus, SessionStore, SubmissionPhase, SubmissionWorkflow,
    SubmitReason, SubmittedExam, ViolationBadge,
};
pub use exam_service::ExamSessionService;
