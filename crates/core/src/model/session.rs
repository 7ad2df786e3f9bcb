use std::collections::{BTreeMap, BTreeSet};

use crate::model::ids::QuestionId;
use crate::model::question::OptionLabel;
use crate::model::stats::SubmissionStats;

/// Answer sheet of a running exam: where the candidate is, what they chose, what they flagged.
///
/// A plain value. Transitions below are deterministic and touch nothing outside the value;
/// persistence happens at a separate boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    current_question: QuestionId,
    answers: BTreeMap<QuestionId, OptionLabel>,
    flagged: BTreeSet<QuestionId>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::fresh()
    }
}

impl SessionState {
    /// Question 1, nothing answered, nothing flagged.
    #[must_use]
    pub fn fresh() -> Self {
        Self {
            current_question: QuestionId::FIRST,
            answers: BTreeMap::new(),
            flagged: BTreeSet::new(),
        }
    }

    /// Rebuild a state from restored parts, dropping anything outside `1..=question_count`.
    ///
    /// A missing or out-of-range current question falls back to question 1.
    #[must_use]
    pub fn restore(
        current_question: Option<QuestionId>,
        answers: impl IntoIterator<Item = (QuestionId, OptionLabel)>,
        flagged: impl IntoIterator<Item = QuestionId>,
        question_count: u32,
    ) -> Self {
        let current_question = current_question
            .filter(|id| id.is_within(question_count))
            .unwrap_or(QuestionId::FIRST);
        let answers = answers
            .into_iter()
            .filter(|(id, _)| id.is_within(question_count))
            .collect();
        let flagged = flagged
            .into_iter()
            .filter(|id| id.is_within(question_count))
            .collect();
        Self {
            current_question,
            answers,
            flagged,
        }
    }

    #[must_use]
    pub fn current_question(&self) -> QuestionId {
        self.current_question
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<QuestionId, OptionLabel> {
        &self.answers
    }

    /// Flagged ids in ascending order.
    #[must_use]
    pub fn flagged(&self) -> &BTreeSet<QuestionId> {
        &self.flagged
    }

    #[must_use]
    pub fn answer_for(&self, id: QuestionId) -> Option<OptionLabel> {
        self.answers.get(&id).copied()
    }

    #[must_use]
    pub fn is_flagged(&self, id: QuestionId) -> bool {
        self.flagged.contains(&id)
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn flagged_count(&self) -> usize {
        self.flagged.len()
    }

    /// Record `option` for `id`, replacing any earlier choice.
    ///
    /// Returns true if the sheet changed.
    pub fn select_answer(&mut self, id: QuestionId, option: OptionLabel) -> bool {
        self.answers.insert(id, option) != Some(option)
    }

    /// Flip the review flag on `id`. Returns the new flag state, or `None` when `id` is
    /// outside `1..=question_count` and nothing changed.
    pub fn toggle_flag(&mut self, id: QuestionId, question_count: u32) -> Option<bool> {
        if !id.is_within(question_count) {
            return None;
        }
        if self.flagged.remove(&id) {
            Some(false)
        } else {
            self.flagged.insert(id);
            Some(true)
        }
    }

    /// Move to question `target` if it exists in an exam of `question_count` questions.
    ///
    /// Returns false (and changes nothing) for out-of-range targets.
    pub fn go_to(&mut self, target: u32, question_count: u32) -> bool {
        let target = QuestionId::new(target);
        if !target.is_within(question_count) {
            return false;
        }
        self.current_question = target;
        true
    }

    /// Lowest flagged id.
    #[must_use]
    pub fn first_flagged(&self) -> Option<QuestionId> {
        self.flagged.first().copied()
    }

    /// Counts for the submission prompt, computed from the sheet as it is now.
    #[must_use]
    pub fn stats(&self, total_questions: u32, time_remaining_seconds: u32) -> SubmissionStats {
        let total = usize::try_from(total_questions).unwrap_or(usize::MAX);
        SubmissionStats {
            total_questions: total,
            answered_questions: self.answered_count(),
            unanswered_questions: total.saturating_sub(self.answered_count()),
            flagged_questions: self.flagged_count(),
            time_remaining_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(id: u32) -> QuestionId {
        QuestionId::new(id)
    }

    #[test]
    fn go_to_accepts_only_existing_questions() {
        let mut state = SessionState::fresh();
        assert!(!state.go_to(0, 10));
        assert!(!state.go_to(11, 10));
        assert_eq!(state.current_question(), q(1));

        for n in 1..=10 {
            assert!(state.go_to(n, 10));
            assert_eq!(state.current_question(), q(n));
        }
    }

    #[test]
    fn answers_overwrite() {
        let mut state = SessionState::fresh();
        assert!(state.select_answer(q(3), OptionLabel::B));
        assert!(!state.select_answer(q(3), OptionLabel::B));
        assert!(state.select_answer(q(3), OptionLabel::D));
        assert_eq!(state.answer_for(q(3)), Some(OptionLabel::D));
        assert_eq!(state.answered_count(), 1);
    }

    #[test]
    fn flags_toggle_and_first_flagged_is_lowest() {
        let mut state = SessionState::fresh();
        assert_eq!(state.toggle_flag(q(7), 10), Some(true));
        assert_eq!(state.toggle_flag(q(2), 10), Some(true));
        assert_eq!(state.toggle_flag(q(5), 10), Some(true));
        assert_eq!(state.first_flagged(), Some(q(2)));

        assert_eq!(state.toggle_flag(q(2), 10), Some(false));
        assert_eq!(state.first_flagged(), Some(q(5)));
        assert!(!state.is_flagged(q(2)));
    }

    #[test]
    fn flags_outside_the_exam_are_ignored() {
        let mut state = SessionState::fresh();
        assert_eq!(state.toggle_flag(q(0), 10), None);
        assert_eq!(state.toggle_flag(q(5), 10), Some(true));
        assert_eq!(state.toggle_flag(q(11), 10), None);
        assert_eq!(state.first_flagged(), Some(q(5)));
        assert_eq!(state.flagged_count(), 1);
    }

    #[test]
    fn restore_drops_out_of_range_entries() {
        let state = SessionState::restore(
            Some(q(12)),
            [(q(1), OptionLabel::A), (q(11), OptionLabel::C)],
            [q(0), q(4)],
            10,
        );
        assert_eq!(state.current_question(), q(1));
        assert_eq!(state.answered_count(), 1);
        assert_eq!(state.flagged().iter().copied().collect::<Vec<_>>(), vec![q(4)]);
    }

    #[test]
    fn stats_reflect_sheet() {
        let mut state = SessionState::fresh();
        for id in 1..=5 {
            state.select_answer(q(id), OptionLabel::A);
        }
        state.toggle_flag(q(2), 20);
        state.toggle_flag(q(9), 20);

        let stats = state.stats(20, 1_234);
        assert_eq!(
            stats,
            SubmissionStats {
                total_questions: 20,
                answered_questions: 5,
                unanswered_questions: 15,
                flagged_questions: 2,
                time_remaining_seconds: 1_234,
            }
        );
    }
}
