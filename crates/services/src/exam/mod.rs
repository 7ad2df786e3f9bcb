mod navigation;
mod persistence;
mod runner;
mod session;
mod store;
mod submission;
mod view;

// Public API of the exam subsystem.
pub use crate::error::ExamSessionError;
pub use navigation::Navigator;
pub use persistence::PersistTrigger;
pub use runner::ExamHandle;
pub use session::ExamSession;
pub use store::SessionStore;
pub use submission::{
    CompletionHandler, SubmissionPhase, SubmissionWorkflow, SubmitReason, SubmittedExam,
};
pub use view::{CurrentQuestion, ExamView, QuestionStatus, ViolationBadge};
