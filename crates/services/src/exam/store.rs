use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use exam_core::ModePolicy;
use exam_core::model::{ExamKey, OptionLabel, QuestionId, SessionState};
use storage::repository::{ExamStateRepository, PersistedRecord};
use tracing::{debug, info, warn};

use super::persistence::{PersistTrigger, PersistenceWorker};

/// Owns the answer sheet of one exam run and its durable copy.
///
/// Whether anything reaches storage is decided by the session's `ModePolicy`: practice
/// runs restore and save, challenge runs never do.
pub struct SessionStore {
    key: ExamKey,
    policy: ModePolicy,
    question_count: u32,
    state: SessionState,
    writer: Option<PersistenceWorker>,
}

impl SessionStore {
    /// Open the store for an exam.
    ///
    /// Returns the store and, when a saved practice run was found, its remaining time.
    /// Storage problems are logged and the run starts fresh; opening never fails.
    pub async fn initialize(
        repo: Arc<dyn ExamStateRepository>,
        key: ExamKey,
        policy: ModePolicy,
        question_count: u32,
        debounce: Duration,
    ) -> (Self, Option<u32>) {
        if policy.purges_on_start() {
            if let Err(err) = repo.delete_state(&key).await {
                warn!(exam_key = %key, error = %err, "failed to purge leftover exam state");
            }
        }

        let (state, restored_time) = if policy.restores() {
            restore(repo.as_ref(), &key, question_count).await
        } else {
            (SessionState::fresh(), None)
        };

        let writer = policy
            .persists()
            .then(|| PersistenceWorker::spawn(Arc::clone(&repo), key.clone(), debounce));

        let store = Self {
            key,
            policy,
            question_count,
            state,
            writer,
        };
        (store, restored_time)
    }

    #[must_use]
    pub fn key(&self) -> &ExamKey {
        &self.key
    }

    #[must_use]
    pub fn policy(&self) -> ModePolicy {
        self.policy
    }

    #[must_use]
    pub fn question_count(&self) -> u32 {
        self.question_count
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Ids come from the exam definition, so no range check happens here.
    pub fn select_answer(&mut self, id: QuestionId, option: OptionLabel) -> bool {
        self.state.select_answer(id, option)
    }

    /// Flip the flag on `id`; `None` when the id is not a question of this exam.
    pub fn toggle_flag(&mut self, id: QuestionId) -> Option<bool> {
        self.state.toggle_flag(id, self.question_count)
    }

    /// Move the current-question pointer. Out-of-range targets are ignored.
    pub fn go_to(&mut self, target: u32) -> bool {
        self.state.go_to(target, self.question_count)
    }

    /// Stage the current sheet plus `time_remaining_seconds` for a debounced save.
    pub fn persist(&self, time_remaining_seconds: u32, trigger: PersistTrigger) {
        if let Some(writer) = &self.writer {
            writer.stage(
                PersistedRecord::from_session(&self.state, time_remaining_seconds),
                trigger,
            );
        }
    }

    /// Drop the saved copy. Cancels any pending save first.
    pub fn clear(&self) {
        if !self.policy.clears_on_submit() {
            return;
        }
        if let Some(writer) = &self.writer {
            writer.clear();
        }
    }

    /// Tear down, waiting for already requested storage work. Pending saves are discarded.
    pub async fn close(self) {
        if let Some(writer) = self.writer {
            writer.close().await;
        }
    }
}

async fn restore(
    repo: &dyn ExamStateRepository,
    key: &ExamKey,
    question_count: u32,
) -> (SessionState, Option<u32>) {
    match repo.load_state(key).await {
        Ok(Some(record)) => {
            let state = record.to_session(question_count);
            info!(
                exam_key = %key,
                current_question = %state.current_question(),
                answered = state.answered_count(),
                "restored saved exam state"
            );
            (state, record.time_remaining_seconds)
        }
        Ok(None) => {
            debug!(exam_key = %key, "no saved exam state");
            (SessionState::fresh(), None)
        }
        Err(err) => {
            warn!(exam_key = %key, error = %err, "failed to restore exam state; starting fresh");
            (SessionState::fresh(), None)
        }
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("key", &self.key)
            .field("mode", &self.policy.mode())
            .field("question_count", &self.question_count)
            .field("state", &self.state)
            .field("persists", &self.writer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use exam_core::model::ExamMode;
    use storage::repository::{InMemoryRepository, StorageError};
    use tokio::time::sleep;

    const DEBOUNCE: Duration = Duration::from_millis(1_000);

    fn q(id: u32) -> QuestionId {
        QuestionId::new(id)
    }

    async fn open(
        repo: &InMemoryRepository,
        mode: ExamMode,
        question_count: u32,
    ) -> (SessionStore, Option<u32>) {
        SessionStore::initialize(
            Arc::new(repo.clone()),
            ExamKey::for_title("N3 Mock"),
            mode.policy(),
            question_count,
            DEBOUNCE,
        )
        .await
    }

    struct FailingRepository;

    #[async_trait]
    impl ExamStateRepository for FailingRepository {
        async fn load_state(&self, _key: &ExamKey) -> Result<Option<PersistedRecord>, StorageError> {
            Err(StorageError::Connection("offline".into()))
        }

        async fn save_state(
            &self,
            _key: &ExamKey,
            _record: &PersistedRecord,
        ) -> Result<(), StorageError> {
            Err(StorageError::Connection("offline".into()))
        }

        async fn delete_state(&self, _key: &ExamKey) -> Result<(), StorageError> {
            Err(StorageError::Connection("offline".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_changes_coalesce_into_one_write() {
        let repo = InMemoryRepository::new();
        let (mut store, _) = open(&repo, ExamMode::Practice, 10).await;

        for n in 1..=10 {
            store.go_to(n);
            store.persist(600, PersistTrigger::Interaction);
            sleep(Duration::from_millis(90)).await;
        }
        assert_eq!(repo.save_count(), 0);

        sleep(Duration::from_millis(1_100)).await;
        assert_eq!(repo.save_count(), 1);

        let saved = repo.load_state(store.key()).await.unwrap().unwrap();
        assert_eq!(saved.current_question, Some(q(10)));
        store.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn persist_then_restore_round_trips() {
        let repo = InMemoryRepository::new();
        let (mut store, restored) = open(&repo, ExamMode::Practice, 10).await;
        assert_eq!(restored, None);

        store.go_to(6);
        store.select_answer(q(2), OptionLabel::D);
        store.toggle_flag(q(6));
        store.persist(1_234, PersistTrigger::Interaction);
        let expected = store.state().clone();
        sleep(Duration::from_millis(1_100)).await;
        store.close().await;

        let (reopened, restored) = open(&repo, ExamMode::Practice, 10).await;
        assert_eq!(reopened.state(), &expected);
        assert_eq!(restored, Some(1_234));
        reopened.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn challenge_purges_and_never_writes() {
        let repo = InMemoryRepository::new();
        let key = ExamKey::for_title("N3 Mock");
        repo.insert_raw(&key, r#"{"currentQuestion":4,"answers":{"1":"A"},"flagged":[2],"timeRemainingSeconds":10}"#)
            .unwrap();

        let (mut store, restored) = open(&repo, ExamMode::Challenge, 10).await;
        assert_eq!(restored, None);
        assert_eq!(store.state(), &SessionState::fresh());
        assert!(repo.raw_payload(&key).unwrap().is_none());

        store.select_answer(q(1), OptionLabel::B);
        store.persist(100, PersistTrigger::Interaction);
        sleep(Duration::from_secs(3)).await;
        assert_eq!(repo.save_count(), 0);
        assert!(repo.raw_payload(&key).unwrap().is_none());
        store.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn corrupt_record_starts_fresh() {
        let repo = InMemoryRepository::new();
        repo.insert_raw(&ExamKey::for_title("N3 Mock"), "{{garbage").unwrap();

        let (store, restored) = open(&repo, ExamMode::Practice, 10).await;
        assert_eq!(store.state(), &SessionState::fresh());
        assert_eq!(restored, None);
        store.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn partially_malformed_record_keeps_valid_fields() {
        let repo = InMemoryRepository::new();
        repo.insert_raw(
            &ExamKey::for_title("N3 Mock"),
            r#"{"currentQuestion":"x","answers":{"3":"C","15":"A"},"flagged":"nope","timeRemainingSeconds":42}"#,
        )
        .unwrap();

        let (store, restored) = open(&repo, ExamMode::Practice, 10).await;
        assert_eq!(store.state().current_question(), q(1));
        assert_eq!(store.state().answer_for(q(3)), Some(OptionLabel::C));
        assert_eq!(store.state().answered_count(), 1);
        assert_eq!(store.state().flagged_count(), 0);
        assert_eq!(restored, Some(42));
        store.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn storage_failures_never_block_the_session() {
        let (mut store, restored) = SessionStore::initialize(
            Arc::new(FailingRepository),
            ExamKey::for_title("offline"),
            ModePolicy::PRACTICE,
            5,
            DEBOUNCE,
        )
        .await;
        assert_eq!(restored, None);

        store.select_answer(q(1), OptionLabel::A);
        store.persist(10, PersistTrigger::Interaction);
        sleep(Duration::from_millis(1_100)).await;
        assert_eq!(store.state().answer_for(q(1)), Some(OptionLabel::A));
        store.clear();
        store.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_pending_write_and_deletes() {
        let repo = InMemoryRepository::new();
        let (store, _) = open(&repo, ExamMode::Practice, 10).await;
        let key = store.key().clone();

        store.persist(50, PersistTrigger::Interaction);
        sleep(Duration::from_millis(1_100)).await;
        assert_eq!(repo.save_count(), 1);

        store.persist(49, PersistTrigger::Interaction);
        store.clear();
        store.close().await;

        assert_eq!(repo.save_count(), 1);
        assert!(repo.raw_payload(&key).unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_drops_pending_write() {
        let repo = InMemoryRepository::new();
        let (store, _) = open(&repo, ExamMode::Practice, 10).await;

        store.persist(50, PersistTrigger::Interaction);
        store.close().await;
        sleep(Duration::from_secs(2)).await;

        assert_eq!(repo.save_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_do_not_postpone_an_armed_write() {
        let repo = InMemoryRepository::new();
        let (store, _) = open(&repo, ExamMode::Practice, 10).await;

        store.persist(100, PersistTrigger::Interaction);
        for remaining in [99, 98, 97] {
            sleep(Duration::from_millis(300)).await;
            store.persist(remaining, PersistTrigger::Tick);
        }
        sleep(Duration::from_millis(200)).await;

        assert_eq!(repo.save_count(), 1);
        let saved = repo.load_state(store.key()).await.unwrap().unwrap();
        assert_eq!(saved.time_remaining_seconds, Some(97));
        store.close().await;
    }
}
