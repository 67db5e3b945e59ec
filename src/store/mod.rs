//! The settings store: one canonical copy of the page's preferences.
//!
//! Lifecycle is `Uninitialized -> Loading -> Ready`. [`SettingsStore::load`]
//! never fails: unreadable or corrupt records are logged and replaced by the
//! compiled-in defaults, so the page can always render. Updates are applied
//! synchronously; writes are coalesced by a debounced writer task.
//!
//! Known limitation: a process that exits inside the quiet window loses the
//! pending write.

pub mod config;
mod debounce;
pub mod notifier;

pub use config::{DEFAULT_DEBOUNCE, DEFAULT_STORAGE_KEY, StoreConfig};
pub use notifier::{ChangeNotifier, Subscription};

use crate::codec::StateCodec;
use crate::core::Result;
use crate::migration::{MigrationChain, new_tab_chain};
use crate::state::{CombinedState, EphemeralState, HostEnvironment, PersistedState, StatePatch};
use crate::storage::StateBackend;
use debounce::{DebouncedWriter, PersistTarget, WriterCounters};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{Level, event};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorePhase {
    Uninitialized,
    Loading,
    Ready,
}

/// Persistence counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Updates handed to the writer.
    pub scheduled_writes: u64,
    /// Records the backend accepted.
    pub completed_writes: u64,
    /// Records the backend rejected or that failed to encode.
    pub failed_writes: u64,
}

struct StoreInner {
    phase: StorePhase,
    persisted: PersistedState,
    ephemeral: EphemeralState,
    /// Updates issued before `load` finished, in call order.
    queued: Vec<StatePatch>,
    writer: Option<DebouncedWriter>,
}

impl StoreInner {
    /// Defaults with every queued patch applied.
    fn provisional(&self) -> PersistedState {
        let mut provisional = self.persisted.clone();
        for patch in &self.queued {
            provisional.apply(patch);
        }
        provisional
    }

    fn combined(&self) -> CombinedState {
        CombinedState {
            persisted: self.persisted.clone(),
            ephemeral: self.ephemeral.clone(),
        }
    }
}

pub struct SettingsStore {
    config: StoreConfig,
    chain: Arc<MigrationChain>,
    codec: Arc<dyn StateCodec>,
    backend: Arc<dyn StateBackend>,
    notifier: ChangeNotifier,
    counters: Arc<WriterCounters>,
    inner: Mutex<StoreInner>,
    load_gate: tokio::sync::Mutex<()>,
}

impl SettingsStore {
    /// Creates a store running the New Tab Page migration chain.
    pub fn new(
        config: StoreConfig,
        backend: Arc<dyn StateBackend>,
        host: HostEnvironment,
    ) -> Result<Self> {
        Self::with_chain(config, backend, host, new_tab_chain()?)
    }

    /// Creates a store with a caller-supplied migration chain.
    pub fn with_chain(
        config: StoreConfig,
        backend: Arc<dyn StateBackend>,
        host: HostEnvironment,
        chain: MigrationChain,
    ) -> Result<Self> {
        config.validate()?;
        let codec = config.codec.build();
        Ok(Self {
            config,
            chain: Arc::new(chain),
            codec,
            backend,
            notifier: ChangeNotifier::new(),
            counters: Arc::new(WriterCounters::default()),
            inner: Mutex::new(StoreInner {
                phase: StorePhase::Uninitialized,
                persisted: PersistedState::default(),
                ephemeral: EphemeralState::from_host(&host),
                queued: Vec::new(),
                writer: None,
            }),
            load_gate: tokio::sync::Mutex::new(()),
        })
    }

    /// Replaces the codec chosen by the configuration.
    pub fn with_codec(mut self, codec: Arc<dyn StateCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn chain(&self) -> &MigrationChain {
        &self.chain
    }

    pub fn phase(&self) -> StorePhase {
        self.lock().phase
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            scheduled_writes: self.counters.scheduled.load(Ordering::SeqCst),
            completed_writes: self.counters.completed.load(Ordering::SeqCst),
            failed_writes: self.counters.failed.load(Ordering::SeqCst),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reads, decodes and migrates the stored record, then moves to `Ready`.
    ///
    /// Updates queued before this call are applied in order on top of the
    /// loaded state. A call that overlaps one in progress waits for it and
    /// returns the same state; calling `load` once `Ready` returns the current
    /// state.
    pub async fn load(&self) -> PersistedState {
        // Held until the store is `Ready`. A load cancelled mid-read leaves the
        // phase at `Loading` and the next caller starts over.
        let _loading = self.load_gate.lock().await;
        {
            let mut inner = self.lock();
            if inner.phase == StorePhase::Ready {
                return inner.persisted.clone();
            }
            inner.phase = StorePhase::Loading;
        }

        let (loaded, upgraded) = self.read_persisted().await;
        let writer = DebouncedWriter::spawn(
            PersistTarget {
                key: self.config.storage_key.clone(),
                chain: self.chain.clone(),
                codec: self.codec.clone(),
                backend: self.backend.clone(),
                counters: self.counters.clone(),
            },
            self.config.debounce,
        );

        let mut inner = self.lock();
        inner.persisted = loaded;
        let queued = std::mem::take(&mut inner.queued);
        for patch in &queued {
            inner.persisted.apply(patch);
        }
        inner.ephemeral.initial_data_loaded = true;
        inner.phase = StorePhase::Ready;
        inner.writer = Some(writer);

        if upgraded || !queued.is_empty() {
            self.schedule_write(&inner);
        }
        event!(
            Level::DEBUG,
            queued_updates = queued.len(),
            upgraded,
            "settings store ready"
        );

        let combined = inner.combined();
        drop(inner);
        self.notifier.notify(&combined);
        combined.persisted
    }

    /// Fetches the stored record and brings it up to date.
    ///
    /// The flag is true when a migration ran and the record should be
    /// rewritten in the current shape.
    async fn read_persisted(&self) -> (PersistedState, bool) {
        let key = self.config.storage_key.as_str();

        let bytes = match self.backend.read(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                event!(Level::INFO, key, "no stored settings; using defaults");
                return (PersistedState::default(), false);
            }
            Err(err) => {
                event!(Level::WARN, key, error = %err, "settings read failed; using defaults");
                return (PersistedState::default(), false);
            }
        };

        let raw = match self.codec.decode(&bytes) {
            Ok(raw) => raw,
            Err(err) => {
                event!(
                    Level::WARN,
                    key,
                    codec = self.codec.name(),
                    error = %err,
                    "discarding unreadable settings; using defaults"
                );
                return (PersistedState::default(), false);
            }
        };

        match self.chain.run(raw) {
            Ok(outcome) => {
                if outcome.migrated() {
                    event!(
                        Level::INFO,
                        key,
                        from_version = outcome.from_version,
                        to_version = outcome.to_version,
                        steps = ?outcome.applied,
                        "settings migrated"
                    );
                }
                let upgraded = outcome.migrated();
                (outcome.state, upgraded)
            }
            Err(err) => {
                event!(
                    Level::WARN,
                    key,
                    field = %err.field,
                    error = %err,
                    "discarding settings with a corrupt field; using defaults"
                );
                (PersistedState::default(), false)
            }
        }
    }

    fn schedule_write(&self, inner: &StoreInner) {
        let Some(writer) = inner.writer.as_ref() else {
            return;
        };
        match writer.schedule(inner.persisted.clone()) {
            Ok(()) => {
                self.counters.scheduled.fetch_add(1, Ordering::SeqCst);
            }
            Err(err) => {
                event!(Level::WARN, error = %err, "settings write could not be scheduled");
            }
        }
    }

    /// Merges `patch` into the canonical state and returns the new snapshot.
    ///
    /// Before `load` has finished the patch is queued instead, and the
    /// returned value is a provisional view: defaults plus every queued patch.
    ///
    /// An empty patch changes nothing: no write is scheduled and no listener
    /// is called.
    pub fn update(&self, patch: StatePatch) -> PersistedState {
        let mut inner = self.lock();

        if patch.is_empty() {
            return if inner.phase == StorePhase::Ready {
                inner.persisted.clone()
            } else {
                inner.provisional()
            };
        }

        if inner.phase != StorePhase::Ready {
            inner.queued.push(patch);
            event!(
                Level::DEBUG,
                queued_updates = inner.queued.len(),
                "settings update queued until load completes"
            );
            return inner.provisional();
        }

        inner.persisted.apply(&patch);
        self.schedule_write(&inner);
        let combined = inner.combined();
        drop(inner);

        self.notifier.notify(&combined);
        combined.persisted
    }

    /// Current persisted preferences.
    pub fn get(&self) -> PersistedState {
        self.lock().persisted.clone()
    }

    /// Current persisted preferences together with the session fields.
    pub fn snapshot(&self) -> CombinedState {
        self.lock().combined()
    }

    /// Registers `listener` for every committed change.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&CombinedState) + Send + Sync + 'static,
    {
        self.notifier.subscribe(listener)
    }

    /// Writes any pending state without waiting for the quiet window.
    pub async fn flush(&self) -> Result<()> {
        let writer = {
            let inner = self.lock();
            match inner.writer.as_ref() {
                Some(writer) => writer.clone(),
                None => return Ok(()),
            }
        };
        writer.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::{Duration, sleep};

    /// Memory backend whose reads take a while, like a real disk.
    struct SlowBackend {
        inner: MemoryBackend,
        delay: Duration,
    }

    #[async_trait]
    impl StateBackend for SlowBackend {
        async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
            sleep(self.delay).await;
            self.inner.read(key).await
        }

        async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
            self.inner.write(key, bytes).await
        }
    }

    fn counting(store: &SettingsStore) -> (Arc<AtomicUsize>, Subscription) {
        let calls = Arc::new(AtomicUsize::new(0));
        let subscription = store.subscribe({
            let calls = calls.clone();
            move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            }
        });
        (calls, subscription)
    }

    fn store(backend: Arc<MemoryBackend>) -> SettingsStore {
        SettingsStore::new(StoreConfig::default(), backend, HostEnvironment::default()).unwrap()
    }

    #[tokio::test]
    async fn test_phases() {
        let store = store(Arc::new(MemoryBackend::new()));
        assert_eq!(store.phase(), StorePhase::Uninitialized);
        store.load().await;
        assert_eq!(store.phase(), StorePhase::Ready);
        assert!(store.snapshot().ephemeral.initial_data_loaded);
    }

    #[tokio::test]
    async fn test_second_load_keeps_state() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store(backend.clone());
        store.load().await;
        store.update(StatePatch::new().show_stats(true));

        let again = store.load().await;
        assert!(again.show_stats);
    }

    #[tokio::test]
    async fn test_flush_before_load_is_noop() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store(backend.clone());
        store.flush().await.unwrap();
        assert_eq!(backend.write_count(), 0);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = SettingsStore::new(
            StoreConfig::new().storage_key(""),
            Arc::new(MemoryBackend::new()),
            HostEnvironment::default(),
        );
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_loads_share_the_stored_record() {
        let backend = Arc::new(SlowBackend {
            inner: MemoryBackend::with_entry(
                DEFAULT_STORAGE_KEY,
                r#"{"schemaVersion": 5, "showStats": true}"#,
            ),
            delay: Duration::from_millis(20),
        });
        let store =
            SettingsStore::new(StoreConfig::default(), backend, HostEnvironment::default())
                .unwrap();
        let (calls, _subscription) = counting(&store);

        let (first, second) = tokio::join!(store.load(), store.load());
        assert!(first.show_stats);
        assert!(second.show_stats);
        assert_eq!(store.phase(), StorePhase::Ready);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_patch_is_a_noop() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store(backend.clone());
        let (calls, _subscription) = counting(&store);

        let provisional = store.update(StatePatch::new().show_clock(true));
        assert_eq!(store.update(StatePatch::new()), provisional);

        store.load().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.stats().scheduled_writes, 1);

        let before = store.get();
        assert_eq!(store.update(StatePatch::new()), before);
        store.flush().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.stats().scheduled_writes, 1);
        assert_eq!(backend.write_count(), 1);
    }
}
