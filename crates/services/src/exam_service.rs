use std::sync::Arc;

use exam_core::EngineSettings;
use exam_core::model::ExamDefinition;
use storage::repository::{ExamStateRepository, InMemoryRepository, Storage};
use tracing::info;

use crate::Clock;
use crate::error::ExamSessionError;
use crate::exam::{CompletionHandler, ExamHandle, ExamSession, SessionStore};

/// Entry point for starting exam sessions.
///
/// This service owns:
/// - the wall clock (`Clock`) used for submission timestamps
/// - the engine settings (tick period, save debounce, badge limits)
/// - access to the durable exam-state slots
#[derive(Clone)]
pub struct ExamSessionService {
    clock: Clock,
    settings: EngineSettings,
    exam_states: Arc<dyn ExamStateRepository>,
}

impl ExamSessionService {
    #[must_use]
    pub fn new(clock: Clock, exam_states: Arc<dyn ExamStateRepository>) -> Self {
        Self {
            clock,
            settings: EngineSettings::default(),
            exam_states,
        }
    }

    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::new(clock, Arc::new(InMemoryRepository::new()))
    }

    /// Build the service on top of a `SQLite` database, running migrations first.
    ///
    /// # Errors
    ///
    /// Returns `ExamSessionError::Sqlite` if the database cannot be opened or migrated.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, ExamSessionError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::new(clock, Arc::clone(&storage.exam_states)))
    }

    #[must_use]
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Open a session that the caller ticks by hand.
    ///
    /// Practice exams resume from their saved state; challenge exams wipe it first.
    /// Storage trouble never fails the start, the run just begins fresh.
    pub async fn start(
        &self,
        exam: Arc<ExamDefinition>,
        on_complete: CompletionHandler,
    ) -> ExamSession {
        let (store, restored_time) = SessionStore::initialize(
            Arc::clone(&self.exam_states),
            exam.key().clone(),
            exam.mode().policy(),
            exam.question_count(),
            self.settings.persist_debounce(),
        )
        .await;
        ExamSession::assemble(
            exam,
            self.settings,
            self.clock,
            store,
            restored_time,
            on_complete,
        )
    }

    /// Open a session and tick it in the background at the configured period.
    pub async fn start_running(
        &self,
        exam: Arc<ExamDefinition>,
        on_complete: CompletionHandler,
    ) -> ExamHandle {
        let session = self.start(exam, on_complete).await;
        ExamHandle::spawn(session, self.settings.tick_interval())
    }

    /// Delete any saved progress for `exam`, whatever its mode.
    ///
    /// # Errors
    ///
    /// Returns `ExamSessionError::Storage` if the repository rejects the delete.
    pub async fn discard_saved(&self, exam: &ExamDefinition) -> Result<(), ExamSessionError> {
        self.exam_states.delete_state(exam.key()).await?;
        info!(exam_key = %exam.key(), "discarded saved exam state");
        Ok(())
    }
}
