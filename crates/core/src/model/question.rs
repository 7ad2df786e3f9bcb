use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::ids::QuestionId;

/// One of the four answer choices printed on every question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OptionLabel {
    A,
    B,
    C,
    D,
}

impl OptionLabel {
    pub const ALL: [OptionLabel; 4] = [Self::A, Self::B, Self::C, Self::D];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptionLabelError(String);

impl fmt::Display for ParseOptionLabelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid option label: {:?}", self.0)
    }
}

impl std::error::Error for ParseOptionLabelError {}

impl FromStr for OptionLabel {
    type Err = ParseOptionLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Self::A),
            "B" | "b" => Ok(Self::B),
            "C" | "c" => Ok(Self::C),
            "D" | "d" => Ok(Self::D),
            other => Err(ParseOptionLabelError(other.to_owned())),
        }
    }
}

impl fmt::Display for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Option texts keyed by label, in the `{ "A": .., "B": .., .. }` shape of exam files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOptions {
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "B")]
    pub b: String,
    #[serde(rename = "C")]
    pub c: String,
    #[serde(rename = "D")]
    pub d: String,
}

impl QuestionOptions {
    #[must_use]
    pub fn text(&self, label: OptionLabel) -> &str {
        match label {
            OptionLabel::A => &self.a,
            OptionLabel::B => &self.b,
            OptionLabel::C => &self.c,
            OptionLabel::D => &self.d,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub question: String,
    pub options: QuestionOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<OptionLabel>,
}

impl Question {
    /// Returns `Some(true|false)` when the question carries an answer key.
    #[must_use]
    pub fn is_correct(&self, answer: OptionLabel) -> Option<bool> {
        self.correct_answer.map(|key| key == answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labels_case_insensitively() {
        assert_eq!("b".parse::<OptionLabel>().unwrap(), OptionLabel::B);
        assert_eq!(" D ".parse::<OptionLabel>().unwrap(), OptionLabel::D);
        assert!("E".parse::<OptionLabel>().is_err());
    }

    #[test]
    fn reads_exam_file_question_shape() {
        let json = r#"{
            "id": 1,
            "question": "「学校」の読み方は？",
            "options": { "A": "がっこう", "B": "がくこう", "C": "かっこう", "D": "がこう" },
            "correctAnswer": "A"
        }"#;
        let question: Question = serde_json::from_str(json).unwrap();
        assert_eq!(question.id, QuestionId::new(1));
        assert_eq!(question.options.text(OptionLabel::C), "かっこう");
        assert_eq!(question.is_correct(OptionLabel::A), Some(true));
        assert_eq!(question.is_correct(OptionLabel::B), Some(false));
    }

    #[test]
    fn answer_key_is_optional() {
        let json = r#"{
            "id": 2,
            "question": "q",
            "options": { "A": "1", "B": "2", "C": "3", "D": "4" }
        }"#;
        let question: Question = serde_json::from_str(json).unwrap();
        assert_eq!(question.is_correct(OptionLabel::A), None);
    }
}
