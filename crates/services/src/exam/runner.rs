use std::sync::{Arc, Mutex};
use std::time::Duration;

use exam_core::TickOutcome;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, warn};

use super::session::ExamSession;
use super::view::ExamView;
use crate::error::ExamSessionError;

/// A session that ticks on its own.
///
/// Commands and ticks are serialised through one lock, so a tick is either fully
/// applied or not started when a command runs. Dropping the handle stops the ticker;
/// `close` additionally waits for queued storage work.
///
/// The completion handler runs while the session lock is held and must not call back
/// into the handle.
#[derive(Debug)]
pub struct ExamHandle {
    session: Arc<Mutex<ExamSession>>,
    ticker: TickerTask,
}

impl ExamHandle {
    /// Start ticking `session` every `period` on the current tokio runtime.
    pub(crate) fn spawn(session: ExamSession, period: Duration) -> Self {
        let session = Arc::new(Mutex::new(session));
        let task = tokio::spawn(tick_loop(Arc::clone(&session), period));
        Self {
            session,
            ticker: TickerTask(Some(task)),
        }
    }

    /// Run `f` against the session.
    ///
    /// # Errors
    ///
    /// Returns `ExamSessionError::Poisoned` if a previous caller panicked with the lock held.
    pub fn with_session<R>(
        &self,
        f: impl FnOnce(&mut ExamSession) -> R,
    ) -> Result<R, ExamSessionError> {
        let mut guard = self
            .session
            .lock()
            .map_err(|_| ExamSessionError::Poisoned)?;
        Ok(f(&mut guard))
    }

    /// # Errors
    ///
    /// Returns `ExamSessionError::Poisoned` if the session lock is poisoned.
    pub fn view(&self) -> Result<ExamView, ExamSessionError> {
        self.with_session(|session| session.view())
    }

    /// False once the countdown expired or the exam was submitted.
    #[must_use]
    pub fn is_ticking(&self) -> bool {
        self.ticker
            .0
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stop ticking and tear the session down.
    ///
    /// # Errors
    ///
    /// Returns `ExamSessionError::Poisoned` if the session lock is poisoned.
    pub async fn close(self) -> Result<(), ExamSessionError> {
        let Self { session, ticker } = self;
        ticker.stop().await;

        let session = match Arc::try_unwrap(session) {
            Ok(session) => session,
            Err(_) => {
                warn!("exam session still shared at close; skipping teardown");
                return Ok(());
            }
        };
        let session = session
            .into_inner()
            .map_err(|_| ExamSessionError::Poisoned)?;
        session.close().await;
        Ok(())
    }
}

/// Aborts the tick loop when dropped.
#[derive(Debug)]
struct TickerTask(Option<JoinHandle<()>>);

impl TickerTask {
    async fn stop(mut self) {
        let Some(task) = self.0.take() else {
            return;
        };
        task.abort();
        if let Err(err) = task.await {
            if !err.is_cancelled() {
                warn!(error = %err, "exam ticker ended abnormally");
            }
        }
    }
}

impl Drop for TickerTask {
    fn drop(&mut self) {
        if let Some(task) = &self.0 {
            task.abort();
        }
    }
}

async fn tick_loop(session: Arc<Mutex<ExamSession>>, period: Duration) {
    let mut ticks = interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticks.tick().await;
        let outcome = match session.lock() {
            Ok(mut session) => session.tick(),
            Err(_) => {
                warn!("exam session lock poisoned; ticker stopping");
                return;
            }
        };
        if matches!(outcome, TickOutcome::Expired | TickOutcome::Finished) {
            debug!(?outcome, "exam ticker done");
            return;
        }
    }
}
