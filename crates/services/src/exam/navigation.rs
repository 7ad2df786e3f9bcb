use super::store::SessionStore;

/// Moves the current-question pointer and keeps the question panel in step.
///
/// Every successful jump collapses the side panel, the way the question grid closes
/// after picking a question on a narrow screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Navigator {
    sidebar_open: bool,
}

impl Navigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_sidebar_open(&self) -> bool {
        self.sidebar_open
    }

    pub fn toggle_sidebar(&mut self) -> bool {
        self.sidebar_open = !self.sidebar_open;
        self.sidebar_open
    }

    pub fn close_sidebar(&mut self) {
        self.sidebar_open = false;
    }

    /// Jump to question `target`. Targets outside the exam are ignored.
    pub fn go_to(&mut self, store: &mut SessionStore, target: u32) -> bool {
        if !store.go_to(target) {
            return false;
        }
        self.close_sidebar();
        true
    }

    pub fn go_previous(&mut self, store: &mut SessionStore) -> bool {
        match store.state().current_question().value().checked_sub(1) {
            Some(target) => self.go_to(store, target),
            None => false,
        }
    }

    pub fn go_next(&mut self, store: &mut SessionStore) -> bool {
        match store.state().current_question().value().checked_add(1) {
            Some(target) => self.go_to(store, target),
            None => false,
        }
    }

    /// Jump to the lowest-numbered flagged question, if any.
    pub fn go_to_first_flagged(&mut self, store: &mut SessionStore) -> bool {
        match store.state().first_flagged() {
            Some(id) => self.go_to(store, id.value()),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::ModePolicy;
    use exam_core::model::{ExamKey, QuestionId};
    use std::sync::Arc;
    use std::time::Duration;
    use storage::repository::InMemoryRepository;

    async fn challenge_store(question_count: u32) -> SessionStore {
        let (store, _) = SessionStore::initialize(
            Arc::new(InMemoryRepository::new()),
            ExamKey::for_title("nav"),
            ModePolicy::CHALLENGE,
            question_count,
            Duration::from_secs(1),
        )
        .await;
        store
    }

    #[tokio::test]
    async fn out_of_range_jumps_are_ignored() {
        let mut store = challenge_store(10).await;
        let mut nav = Navigator::new();
        nav.toggle_sidebar();

        assert!(!nav.go_to(&mut store, 0));
        assert!(!nav.go_to(&mut store, 11));
        assert_eq!(store.state().current_question(), QuestionId::new(1));
        assert!(nav.is_sidebar_open());

        assert!(nav.go_to(&mut store, 10));
        assert!(!nav.is_sidebar_open());
    }

    #[tokio::test]
    async fn previous_and_next_stop_at_the_edges() {
        let mut store = challenge_store(3).await;
        let mut nav = Navigator::new();

        assert!(!nav.go_previous(&mut store));
        assert!(nav.go_next(&mut store));
        assert!(nav.go_next(&mut store));
        assert!(!nav.go_next(&mut store));
        assert_eq!(store.state().current_question(), QuestionId::new(3));
        assert!(nav.go_previous(&mut store));
        assert_eq!(store.state().current_question(), QuestionId::new(2));
    }

    #[tokio::test]
    async fn first_flagged_is_lowest_id() {
        let mut store = challenge_store(10).await;
        let mut nav = Navigator::new();
        assert!(!nav.go_to_first_flagged(&mut store));

        store.toggle_flag(QuestionId::new(8));
        store.toggle_flag(QuestionId::new(4));
        assert!(nav.go_to_first_flagged(&mut store));
        assert_eq!(store.state().current_question(), QuestionId::new(4));
    }
}
