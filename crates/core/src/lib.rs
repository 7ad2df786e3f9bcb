#![forbid(unsafe_code)]

pub mod model;
pub mod policy;
pub mod settings;
pub mod time;
pub mod timer;

pub use model::{
    AttemptId, ExamDefinition, ExamDefinitionDraft, ExamError, ExamKey, ExamMode, OptionLabel,
    Question, QuestionId, QuestionOptions, ScoreReport, SessionState, SubmissionStats,
};
pub use policy::ModePolicy;
pub use settings::{EngineSettings, EngineSettingsDraft, SettingsError};
pub use time::Clock;
pub use timer::{CountdownTimer, ExpiryCallback, TickOutcome, TimerState};
