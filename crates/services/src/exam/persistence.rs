use std::future;
use std::sync::Arc;
use std::time::Duration;

use exam_core::model::ExamKey;
use storage::repository::{ExamStateRepository, PersistedRecord};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

/// What caused a state change to be staged for saving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistTrigger {
    /// The candidate answered, flagged or navigated. Restarts the quiet window.
    Interaction,
    /// The countdown moved. Refreshes the pending record and arms a write if none is
    /// armed, without pushing back an armed deadline.
    Tick,
}

enum PersistCommand {
    Stage {
        record: PersistedRecord,
        trigger: PersistTrigger,
    },
    Clear,
}

/// Background writer for one exam's durable slot.
///
/// Saves are debounced; the record written is always the latest one staged. Saves and
/// deletes run in the order they were requested. Dropping the worker cancels any
/// pending save, while commands already sent are still applied.
#[derive(Debug)]
pub(crate) struct PersistenceWorker {
    tx: mpsc::UnboundedSender<PersistCommand>,
    task: JoinHandle<()>,
}

impl PersistenceWorker {
    /// Spawn the writer on the current tokio runtime.
    pub(crate) fn spawn(
        repo: Arc<dyn ExamStateRepository>,
        key: ExamKey,
        debounce: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(repo, key, debounce, rx));
        Self { tx, task }
    }

    pub(crate) fn stage(&self, record: PersistedRecord, trigger: PersistTrigger) {
        if self.tx.send(PersistCommand::Stage { record, trigger }).is_err() {
            warn!("exam state writer stopped; dropping staged record");
        }
    }

    pub(crate) fn clear(&self) {
        if self.tx.send(PersistCommand::Clear).is_err() {
            warn!("exam state writer stopped; saved state not cleared");
        }
    }

    /// Stop accepting commands and wait for queued ones to finish.
    pub(crate) async fn close(self) {
        let Self { tx, task } = self;
        drop(tx);
        if let Err(err) = task.await {
            warn!(error = %err, "exam state writer ended abnormally");
        }
    }
}

impl std::fmt::Debug for PersistCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stage { trigger, .. } => write!(f, "Stage({trigger:?})"),
            Self::Clear => f.write_str("Clear"),
        }
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => future::pending().await,
    }
}

async fn run(
    repo: Arc<dyn ExamStateRepository>,
    key: ExamKey,
    debounce: Duration,
    mut rx: mpsc::UnboundedReceiver<PersistCommand>,
) {
    let mut pending: Option<PersistedRecord> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            biased;

            command = rx.recv() => match command {
                Some(PersistCommand::Stage { record, trigger }) => {
                    pending = Some(record);
                    if trigger == PersistTrigger::Interaction || deadline.is_none() {
                        deadline = Some(Instant::now() + debounce);
                    }
                }
                Some(PersistCommand::Clear) => {
                    pending = None;
                    deadline = None;
                    match repo.delete_state(&key).await {
                        Ok(()) => debug!(exam_key = %key, "cleared saved exam state"),
                        Err(err) => warn!(exam_key = %key, error = %err, "failed to clear saved exam state"),
                    }
                }
                None => {
                    if pending.is_some() {
                        debug!(exam_key = %key, "discarding unsaved exam state on teardown");
                    }
                    break;
                }
            },
            () = wait_for(deadline) => {
                deadline = None;
                if let Some(record) = pending.take() {
                    match repo.save_state(&key, &record).await {
                        Ok(()) => debug!(exam_key = %key, "saved exam state"),
                        // Keep going in memory; the next change stages a fresh record.
                        Err(err) => warn!(exam_key = %key, error = %err, "failed to save exam state"),
                    }
                }
            }
        }
    }
}
