use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{ExamKey, QuestionId};
use crate::model::question::Question;
use crate::policy::ModePolicy;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExamError {
    #[error("exam title cannot be empty")]
    EmptyTitle,

    #[error("exam has no questions")]
    NoQuestions,

    #[error("question at position {position} has id {found}")]
    NonSequentialId { position: u32, found: QuestionId },

    #[error("too many questions for a single exam: {len}")]
    TooManyQuestions { len: usize },

    #[error("unknown exam mode: {0}")]
    UnknownMode(String),
}

//
// ─── MODE ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamMode {
    /// Pausable, resumable after a crash or reload.
    #[default]
    Practice,
    /// Never paused, never persisted, always fresh.
    Challenge,
}

impl ExamMode {
    #[must_use]
    pub fn policy(self) -> ModePolicy {
        ModePolicy::for_mode(self)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Practice => "practice",
            Self::Challenge => "challenge",
        }
    }
}

impl FromStr for ExamMode {
    type Err = ExamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "practice" => Ok(Self::Practice),
            "challenge" => Ok(Self::Challenge),
            other => Err(ExamError::UnknownMode(other.to_owned())),
        }
    }
}

impl fmt::Display for ExamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── DEFINITION ────────────────────────────────────────────────────────────────
//

/// Unvalidated exam as read from an exam file or handed over by a caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamDefinitionDraft {
    pub title: String,
    pub questions: Vec<Question>,
    /// Time limit in minutes.
    pub time_limit: u32,
    #[serde(default)]
    pub mode: ExamMode,
}

impl ExamDefinitionDraft {
    /// Validate the draft into a read-only exam definition.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::EmptyTitle` for a blank title, `ExamError::NoQuestions` for an
    /// empty question list and `ExamError::NonSequentialId` unless ids run `1..=N` in order.
    pub fn validate(self) -> Result<ExamDefinition, ExamError> {
        let title = self.title.trim().to_owned();
        if title.is_empty() {
            return Err(ExamError::EmptyTitle);
        }
        if self.questions.is_empty() {
            return Err(ExamError::NoQuestions);
        }
        let len = self.questions.len();
        let question_count =
            u32::try_from(len).map_err(|_| ExamError::TooManyQuestions { len })?;

        for (position, question) in (1..=question_count).zip(&self.questions) {
            if question.id.value() != position {
                return Err(ExamError::NonSequentialId {
                    position,
                    found: question.id,
                });
            }
        }

        Ok(ExamDefinition {
            key: ExamKey::for_title(&title),
            title,
            questions: self.questions,
            question_count,
            time_limit_minutes: self.time_limit,
            mode: self.mode,
        })
    }
}

/// A validated exam. The engine reads it and never changes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamDefinition {
    title: String,
    key: ExamKey,
    questions: Vec<Question>,
    question_count: u32,
    time_limit_minutes: u32,
    mode: ExamMode,
}

impl ExamDefinition {
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn key(&self) -> &ExamKey {
        &self.key
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question_count(&self) -> u32 {
        self.question_count
    }

    #[must_use]
    pub fn time_limit_minutes(&self) -> u32 {
        self.time_limit_minutes
    }

    #[must_use]
    pub fn mode(&self) -> ExamMode {
        self.mode
    }

    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        if !id.is_within(self.question_count) {
            return None;
        }
        let index = usize::try_from(id.value() - 1).ok()?;
        self.questions.get(index)
    }

    /// Same exam in another mode. Used when the mode is chosen at launch.
    #[must_use]
    pub fn with_mode(mut self, mode: ExamMode) -> Self {
        self.mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::question::QuestionOptions;

    fn question(id: u32) -> Question {
        Question {
            id: QuestionId::new(id),
            question: format!("Q{id}"),
            options: QuestionOptions {
                a: "a".into(),
                b: "b".into(),
                c: "c".into(),
                d: "d".into(),
            },
            correct_answer: None,
        }
    }

    fn draft(ids: &[u32]) -> ExamDefinitionDraft {
        ExamDefinitionDraft {
            title: "N5 Vocabulary".into(),
            questions: ids.iter().copied().map(question).collect(),
            time_limit: 30,
            mode: ExamMode::Practice,
        }
    }

    #[test]
    fn validates_sequential_exam() {
        let exam = draft(&[1, 2, 3]).validate().unwrap();
        assert_eq!(exam.question_count(), 3);
        assert_eq!(exam.key().as_str(), "exam-state-N5 Vocabulary");
        assert_eq!(exam.question(QuestionId::new(2)).unwrap().question, "Q2");
        assert!(exam.question(QuestionId::new(4)).is_none());
        assert!(exam.question(QuestionId::new(0)).is_none());
    }

    #[test]
    fn rejects_gaps_and_empty_input() {
        let err = draft(&[1, 3]).validate().unwrap_err();
        assert_eq!(
            err,
            ExamError::NonSequentialId {
                position: 2,
                found: QuestionId::new(3)
            }
        );
        assert_eq!(draft(&[]).validate().unwrap_err(), ExamError::NoQuestions);

        let mut blank = draft(&[1]);
        blank.title = "   ".into();
        assert_eq!(blank.validate().unwrap_err(), ExamError::EmptyTitle);
    }

    #[test]
    fn mode_parses_and_defaults_to_practice() {
        assert_eq!("Challenge".parse::<ExamMode>().unwrap(), ExamMode::Challenge);
        assert!("ranked".parse::<ExamMode>().is_err());

        let json = r#"{ "title": "t", "questions": [], "timeLimit": 10 }"#;
        let parsed: ExamDefinitionDraft = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.mode, ExamMode::Practice);
        assert_eq!(parsed.time_limit, 10);
    }
}
