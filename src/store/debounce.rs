use crate::codec::StateCodec;
use crate::core::{Result, StoreError};
use crate::migration::MigrationChain;
use crate::state::PersistedState;
use crate::storage::StateBackend;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant, sleep_until};
use tracing::{Level, event};

/// Write counters shared between the store and its writer task.
#[derive(Debug, Default)]
pub(crate) struct WriterCounters {
    pub scheduled: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
}

/// Everything the writer needs to turn a state into a stored record.
pub(crate) struct PersistTarget {
    pub key: String,
    pub chain: Arc<MigrationChain>,
    pub codec: Arc<dyn StateCodec>,
    pub backend: Arc<dyn StateBackend>,
    pub counters: Arc<WriterCounters>,
}

impl PersistTarget {
    /// Writes `state` once. Failures are logged and swallowed; the next
    /// update writes the full state again.
    async fn persist(&self, state: &PersistedState) {
        let record = self.chain.seal(state);
        let result = match self.codec.encode(&record) {
            Ok(bytes) => self.backend.write(&self.key, bytes).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => {
                self.counters.completed.fetch_add(1, Ordering::SeqCst);
                event!(Level::DEBUG, key = %self.key, codec = self.codec.name(), "settings persisted");
            }
            Err(err) => {
                self.counters.failed.fetch_add(1, Ordering::SeqCst);
                event!(Level::WARN, key = %self.key, error = %err, "settings write failed; will retry on next update");
            }
        }
    }
}

enum WriterCommand {
    Schedule(PersistedState),
    Flush(oneshot::Sender<()>),
}

/// Handle to the task that coalesces bursts of updates into one write.
///
/// Every schedule restarts the quiet window; when the window elapses the most
/// recent state is written. Dropping the handle writes whatever is pending
/// and stops the task once every clone is gone.
#[derive(Clone)]
pub(crate) struct DebouncedWriter {
    tx: mpsc::UnboundedSender<WriterCommand>,
}

impl DebouncedWriter {
    /// Spawns the writer on the current tokio runtime.
    pub(crate) fn spawn(target: PersistTarget, window: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(target, window, rx));
        Self { tx }
    }

    pub(crate) fn schedule(&self, state: PersistedState) -> Result<()> {
        self.tx
            .send(WriterCommand::Schedule(state))
            .map_err(|_| StoreError::WriterStopped)
    }

    /// Writes any pending state now and waits for the write to finish.
    pub(crate) async fn flush(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(WriterCommand::Flush(done_tx))
            .map_err(|_| StoreError::WriterStopped)?;
        done_rx.await.map_err(|_| StoreError::WriterStopped)
    }
}

async fn run_writer(
    target: PersistTarget,
    window: Duration,
    mut rx: mpsc::UnboundedReceiver<WriterCommand>,
) {
    let mut pending: Option<PersistedState> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(WriterCommand::Schedule(state)) => {
                    pending = Some(state);
                    deadline = Some(Instant::now() + window);
                }
                Some(WriterCommand::Flush(done)) => {
                    deadline = None;
                    if let Some(state) = pending.take() {
                        target.persist(&state).await;
                    }
                    let _ = done.send(());
                }
                None => {
                    if let Some(state) = pending.take() {
                        target.persist(&state).await;
                    }
                    break;
                }
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                if let Some(state) = pending.take() {
                    target.persist(&state).await;
                }
            }
        }
    }

    event!(Level::DEBUG, key = %target.key, "settings writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use crate::migration::new_tab_chain;
    use crate::storage::MemoryBackend;

    fn writer(backend: Arc<MemoryBackend>) -> (DebouncedWriter, Arc<WriterCounters>) {
        let counters = Arc::new(WriterCounters::default());
        let target = PersistTarget {
            key: "k".to_string(),
            chain: Arc::new(new_tab_chain().unwrap()),
            codec: Arc::new(JsonCodec),
            backend,
            counters: counters.clone(),
        };
        (DebouncedWriter::spawn(target, Duration::from_millis(50)), counters)
    }

    fn clock(on: bool) -> PersistedState {
        PersistedState {
            show_clock: on,
            ..PersistedState::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_window_restarts_on_schedule() {
        let backend = Arc::new(MemoryBackend::new());
        let (writer, _) = writer(backend.clone());

        writer.schedule(clock(true)).unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        writer.schedule(clock(false)).unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(backend.write_count(), 0);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(backend.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_immediately() {
        let backend = Arc::new(MemoryBackend::new());
        let (writer, counters) = writer(backend.clone());

        writer.schedule(clock(true)).unwrap();
        writer.flush().await.unwrap();
        assert_eq!(backend.write_count(), 1);

        // Nothing left for the timer.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(backend.write_count(), 1);
        assert_eq!(counters.completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_is_counted() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_fail_writes(true);
        let (writer, counters) = writer(backend.clone());

        writer.schedule(clock(true)).unwrap();
        writer.flush().await.unwrap();
        assert_eq!(counters.failed.load(Ordering::SeqCst), 1);
        assert_eq!(backend.get("k").await, None);
    }
}
