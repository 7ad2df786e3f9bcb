mod exam;
mod ids;
mod question;
mod session;
mod stats;

pub use exam::{ExamDefinition, ExamDefinitionDraft, ExamError, ExamMode};
pub use ids::{AttemptId, ExamKey, QuestionId};
pub use question::{OptionLabel, Question, QuestionOptions};
pub use session::SessionState;
pub use stats::{ScoreReport, SubmissionStats};
