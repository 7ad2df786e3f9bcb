use async_trait::async_trait;
use exam_core::model::{ExamKey, OptionLabel, QuestionId, SessionState};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape of an in-progress practice exam.
///
/// Serialized as
/// `{ "currentQuestion", "answers": { "<id>": "A".."D" }, "flagged": [..], "timeRemainingSeconds" }`.
/// Reading is lenient per field: anything missing or malformed comes back empty or `None`
/// rather than failing the whole record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_question: Option<QuestionId>,
    pub answers: BTreeMap<QuestionId, OptionLabel>,
    pub flagged: Vec<QuestionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining_seconds: Option<u32>,
}

impl PersistedRecord {
    #[must_use]
    pub fn from_session(state: &SessionState, time_remaining_seconds: u32) -> Self {
        Self {
            current_question: Some(state.current_question()),
            answers: state.answers().clone(),
            flagged: state.flagged().iter().copied().collect(),
            time_remaining_seconds: Some(time_remaining_seconds),
        }
    }

    /// Rebuild the answer sheet for an exam of `question_count` questions.
    #[must_use]
    pub fn to_session(&self, question_count: u32) -> SessionState {
        SessionState::restore(
            self.current_question,
            self.answers.iter().map(|(id, label)| (*id, *label)),
            self.flagged.iter().copied(),
            question_count,
        )
    }

    /// Encode as JSON.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if encoding fails.
    pub fn to_json(&self) -> Result<String, StorageError> {
        serde_json::to_string(self).map_err(|err| StorageError::Serialization(err.to_string()))
    }

    /// Decode a stored payload.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the payload is not a JSON object.
    pub fn from_json(payload: &str) -> Result<Self, StorageError> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let Value::Object(fields) = value else {
            return Err(StorageError::Serialization(
                "exam state payload is not an object".into(),
            ));
        };

        let current_question = fields
            .get("currentQuestion")
            .and_then(as_u32)
            .map(QuestionId::new);

        let answers = fields
            .get("answers")
            .and_then(Value::as_object)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|(key, label)| {
                        let id = key.trim().parse::<u32>().ok()?;
                        let label = label.as_str()?.parse::<OptionLabel>().ok()?;
                        Some((QuestionId::new(id), label))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let flagged = fields
            .get("flagged")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(as_u32).map(QuestionId::new).collect())
            .unwrap_or_default();

        // Older records wrote the remaining time as `timeRemaining`.
        let time_remaining_seconds = fields
            .get("timeRemainingSeconds")
            .or_else(|| fields.get("timeRemaining"))
            .and_then(as_u32);

        Ok(Self {
            current_question,
            answers,
            flagged,
            time_remaining_seconds,
        })
    }
}

fn as_u32(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|raw| u32::try_from(raw).ok())
}

/// Durable per-exam slot for in-progress state.
#[async_trait]
pub trait ExamStateRepository: Send + Sync {
    /// Fetch the record stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` for an unreadable payload, or other storage errors.
    async fn load_state(&self, key: &ExamKey) -> Result<Option<PersistedRecord>, StorageError>;

    /// Store `record` under `key`, replacing what was there.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn save_state(&self, key: &ExamKey, record: &PersistedRecord)
    -> Result<(), StorageError>;

    /// Remove the record under `key`. Removing a missing record is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be reached.
    async fn delete_state(&self, key: &ExamKey) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Payloads are kept as JSON text so tests can plant corrupt records.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    states: Arc<Mutex<HashMap<ExamKey, String>>>,
    saves: Arc<AtomicUsize>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw payload, bypassing encoding.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn insert_raw(&self, key: &ExamKey, payload: impl Into<String>) -> Result<(), StorageError> {
        let mut guard = self
            .states
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.clone(), payload.into());
        Ok(())
    }

    /// Raw payload stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn raw_payload(&self, key: &ExamKey) -> Result<Option<String>, StorageError> {
        let guard = self
            .states
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    /// Number of successful `save_state` calls so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExamStateRepository for InMemoryRepository {
    async fn load_state(&self, key: &ExamKey) -> Result<Option<PersistedRecord>, StorageError> {
        let payload = {
            let guard = self
                .states
                .lock()
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            guard.get(key).cloned()
        };
        payload.as_deref().map(PersistedRecord::from_json).transpose()
    }

    async fn save_state(
        &self,
        key: &ExamKey,
        record: &PersistedRecord,
    ) -> Result<(), StorageError> {
        let payload = record.to_json()?;
        let mut guard = self
            .states
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.clone(), payload);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_state(&self, key: &ExamKey) -> Result<(), StorageError> {
        let mut guard = self
            .states
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }
}

/// Storage backends behind trait objects for easy swapping.
#[derive(Clone)]
pub struct Storage {
    pub exam_states: Arc<dyn ExamStateRepository>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(id: u32) -> QuestionId {
        QuestionId::new(id)
    }

    #[test]
    fn encodes_wire_shape() {
        let mut state = SessionState::fresh();
        state.select_answer(q(3), OptionLabel::B);
        state.toggle_flag(q(3), 10);

        let json = PersistedRecord::from_session(&state, 3_599).to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "currentQuestion": 1,
                "answers": { "3": "B" },
                "flagged": [3],
                "timeRemainingSeconds": 3599
            })
        );
    }

    #[test]
    fn decodes_fields_independently() {
        let record = PersistedRecord::from_json(
            r#"{
                "currentQuestion": "two",
                "answers": { "1": "A", "x": "B", "2": "E", "4": "d" },
                "flagged": [2, -1, "3", 5],
                "timeRemaining": 120
            }"#,
        )
        .unwrap();

        assert_eq!(record.current_question, None);
        assert_eq!(
            record.answers,
            BTreeMap::from([(q(1), OptionLabel::A), (q(4), OptionLabel::D)])
        );
        assert_eq!(record.flagged, vec![q(2), q(5)]);
        assert_eq!(record.time_remaining_seconds, Some(120));
    }

    #[test]
    fn rejects_non_object_payloads() {
        assert!(matches!(
            PersistedRecord::from_json("{not json"),
            Err(StorageError::Serialization(_))
        ));
        assert!(matches!(
            PersistedRecord::from_json("[1,2,3]"),
            Err(StorageError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn in_memory_round_trips_and_deletes() {
        let repo = InMemoryRepository::new();
        let key = ExamKey::for_title("N4 Reading");

        let mut state = SessionState::fresh();
        state.go_to(4, 10);
        state.select_answer(q(4), OptionLabel::C);
        let record = PersistedRecord::from_session(&state, 900);

        repo.save_state(&key, &record).await.unwrap();
        assert_eq!(repo.save_count(), 1);

        let loaded = repo.load_state(&key).await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.to_session(10), state);

        repo.delete_state(&key).await.unwrap();
        assert!(repo.load_state(&key).await.unwrap().is_none());
        repo.delete_state(&key).await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_payload_surfaces_as_serialization_error() {
        let repo = InMemoryRepository::new();
        let key = ExamKey::for_title("broken");
        repo.insert_raw(&key, "}}").unwrap();
        assert!(matches!(
            repo.load_state(&key).await,
            Err(StorageError::Serialization(_))
        ));
    }
}
