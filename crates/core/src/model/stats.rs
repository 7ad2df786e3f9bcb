use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::exam::ExamDefinition;
use crate::model::ids::QuestionId;
use crate::model::question::OptionLabel;

/// Derived counts shown before the final submit. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionStats {
    pub total_questions: usize,
    pub answered_questions: usize,
    pub unanswered_questions: usize,
    pub flagged_questions: usize,
    pub time_remaining_seconds: u32,
}

impl SubmissionStats {
    /// Share of answered questions, rounded to a whole percent.
    #[must_use]
    pub fn completion_percent(&self) -> u32 {
        percent(self.answered_questions, self.total_questions)
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.unanswered_questions > 0 || self.flagged_questions > 0
    }
}

/// Grading of a submitted answer sheet against the exam's answer keys.
///
/// Questions without an answer key are left out of every count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreReport {
    pub graded_questions: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub unanswered: usize,
    pub percentage: u32,
}

impl ScoreReport {
    #[must_use]
    pub fn grade(exam: &ExamDefinition, answers: &BTreeMap<QuestionId, OptionLabel>) -> Self {
        let mut report = Self {
            graded_questions: 0,
            correct: 0,
            incorrect: 0,
            unanswered: 0,
            percentage: 0,
        };

        for question in exam.questions() {
            if question.correct_answer.is_none() {
                continue;
            }
            report.graded_questions += 1;
            match answers.get(&question.id).map(|a| question.is_correct(*a)) {
                Some(Some(true)) => report.correct += 1,
                Some(_) => report.incorrect += 1,
                None => report.unanswered += 1,
            }
        }

        report.percentage = percent(report.correct, report.graded_questions);
        report
    }
}

fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    let rounded = (part.saturating_mul(200) + whole) / whole.saturating_mul(2);
    u32::try_from(rounded).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::exam::{ExamDefinitionDraft, ExamMode};
    use crate::model::question::{Question, QuestionOptions};

    fn exam(keys: &[Option<OptionLabel>]) -> ExamDefinition {
        let questions = keys
            .iter()
            .zip(1_u32..)
            .map(|(key, id)| Question {
                id: QuestionId::new(id),
                question: format!("Q{id}"),
                options: QuestionOptions {
                    a: "a".into(),
                    b: "b".into(),
                    c: "c".into(),
                    d: "d".into(),
                },
                correct_answer: *key,
            })
            .collect();
        ExamDefinitionDraft {
            title: "Grammar".into(),
            questions,
            time_limit: 10,
            mode: ExamMode::Practice,
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn grades_only_keyed_questions() {
        let exam = exam(&[
            Some(OptionLabel::A),
            Some(OptionLabel::B),
            Some(OptionLabel::C),
            None,
        ]);
        let answers = BTreeMap::from([
            (QuestionId::new(1), OptionLabel::A),
            (QuestionId::new(2), OptionLabel::D),
            (QuestionId::new(4), OptionLabel::A),
        ]);

        let report = ScoreReport::grade(&exam, &answers);
        assert_eq!(report.graded_questions, 3);
        assert_eq!(report.correct, 1);
        assert_eq!(report.incorrect, 1);
        assert_eq!(report.unanswered, 1);
        assert_eq!(report.percentage, 33);
    }

    #[test]
    fn ungradable_exam_scores_zero() {
        let exam = exam(&[None, None]);
        let report = ScoreReport::grade(&exam, &BTreeMap::new());
        assert_eq!(report.graded_questions, 0);
        assert_eq!(report.percentage, 0);
    }

    #[test]
    fn completion_percent_rounds() {
        let stats = SubmissionStats {
            total_questions: 3,
            answered_questions: 2,
            unanswered_questions: 1,
            flagged_questions: 0,
            time_remaining_seconds: 0,
        };
        assert_eq!(stats.completion_percent(), 67);
        assert!(stats.has_warnings());
    }
}
