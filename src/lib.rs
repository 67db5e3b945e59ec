// ============================================================================
// New Tab Page settings store
// ============================================================================

pub mod codec;
pub mod core;
pub mod migration;
pub mod state;
pub mod storage;
pub mod store;

// Re-export main types for convenience
pub use core::{CorruptStateError, DecodeError, RawState, Result, StoreError, ValueKind};
pub use codec::{CodecKind, JsonCodec, MessagePackCodec, StateCodec};
pub use migration::{
    CURRENT_VERSION, MigrationChain, MigrationOutcome, MigrationStep, new_tab_chain,
};
pub use state::{
    ClockFormat, CombinedState, EphemeralState, HostEnvironment, PersistedState, StackWidget,
    StatePatch, Stats, TextDirection,
};
pub use storage::{FileBackend, MemoryBackend, StateBackend};
pub use store::{
    ChangeNotifier, SettingsStore, StoreConfig, StorePhase, StoreStats, Subscription,
};

use std::path::Path;
use std::sync::Arc;

/// Opens a store over a directory of settings files and loads it.
///
/// # Examples
///
/// ```no_run
/// use newtab_state::{HostEnvironment, StatePatch, StoreConfig};
///
/// # #[tokio::main]
/// # async fn main() -> newtab_state::Result<()> {
/// let store = newtab_state::open_dir("./profile", StoreConfig::default(), HostEnvironment::default()).await?;
/// store.update(StatePatch::new().show_clock(true));
/// store.flush().await?;
/// # Ok(())
/// # }
/// ```
pub async fn open_dir<P: AsRef<Path>>(
    dir: P,
    config: StoreConfig,
    host: HostEnvironment,
) -> Result<SettingsStore> {
    let backend = Arc::new(FileBackend::new(dir));
    let store = SettingsStore::new(config, backend, host)?;
    store.load().await;
    Ok(store)
}
