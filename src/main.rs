use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use newtab_state::{
    CodecKind, FileBackend, HostEnvironment, RawState, SettingsStore, StatePatch, StoreConfig,
    TextDirection,
};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "newtab-state")]
#[command(about = "Inspect and edit a New Tab Page settings record")]
struct Cli {
    /// Directory holding the settings files
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Storage key (overrides NEWTAB_STATE_KEY)
    #[arg(long)]
    key: Option<String>,

    /// Record encoding: json or msgpack (overrides NEWTAB_STATE_CODEC)
    #[arg(long)]
    codec: Option<CodecKind>,

    /// Treat the session as a private window
    #[arg(long)]
    incognito: bool,

    /// Private window routed through Tor
    #[arg(long)]
    tor: bool,

    /// Right-to-left page layout
    #[arg(long)]
    rtl: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the loaded settings and session fields as JSON
    Show,
    /// Update settings, e.g. `set showClock=true clockFormat=24`
    Set {
        #[arg(required = true)]
        assignments: Vec<String>,
    },
    /// Rewrite the stored record in the current shape
    Migrate,
    /// Print the file the settings are stored in
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = StoreConfig::from_env().context("Invalid NEWTAB_STATE_* environment")?;
    if let Some(key) = &cli.key {
        config = config.storage_key(key);
    }
    if let Some(codec) = cli.codec {
        config = config.codec(codec);
    }

    let host = HostEnvironment::new()
        .incognito(cli.incognito || cli.tor)
        .tor(cli.tor)
        .text_direction(if cli.rtl {
            TextDirection::Rtl
        } else {
            TextDirection::Ltr
        });

    let backend = FileBackend::new(&cli.dir);
    if let Command::Path = cli.command {
        println!("{}", backend.path_for(&config.storage_key).display());
        return Ok(());
    }

    let store = SettingsStore::new(config, Arc::new(backend), host)
        .context("Failed to create settings store")?;
    store.load().await;

    match cli.command {
        Command::Show => show(&store),
        Command::Set { assignments } => set(&store, &assignments).await,
        Command::Migrate => migrate(&store).await,
        Command::Path => Ok(()),
    }
}

fn show(store: &SettingsStore) -> Result<()> {
    let rendered = serde_json::to_string_pretty(&store.snapshot())
        .context("Failed to render settings")?;
    println!("{}", rendered);
    Ok(())
}

async fn set(store: &SettingsStore, assignments: &[String]) -> Result<()> {
    let raw = parse_assignments(assignments)?;
    let patch = StatePatch::from_raw(&raw).context("Rejected settings update")?;
    store.update(patch);
    store.flush().await.context("Failed to write settings")?;

    let stats = store.stats();
    if stats.failed_writes > 0 {
        return Err(anyhow!(
            "Settings were not saved; see the log for the backend error"
        ));
    }
    show(store)
}

async fn migrate(store: &SettingsStore) -> Result<()> {
    store.flush().await.context("Failed to write settings")?;
    let stats = store.stats();
    let version = store.chain().current_version();

    if stats.failed_writes > 0 {
        Err(anyhow!("Migrated record could not be written"))
    } else if stats.completed_writes > 0 {
        println!("Rewrote settings at version {}", version);
        Ok(())
    } else {
        println!("Settings already at version {}", version);
        Ok(())
    }
}

/// Parses `name=value` pairs. Values are read as JSON, falling back to a
/// plain string, so `clockFormat=24` and `clockFormat="24"` both work.
fn parse_assignments(assignments: &[String]) -> Result<RawState> {
    let mut raw = RawState::new();

    for assignment in assignments {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid assignment '{}'. Expected format: name=value", assignment))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(anyhow!("Missing field name in '{}'", assignment));
        }

        let value = value.trim();
        let parsed = match serde_json::from_str::<Value>(value) {
            Ok(Value::Number(_)) => Value::String(value.to_string()),
            Ok(parsed) => parsed,
            Err(_) => Value::String(value.to_string()),
        };
        raw.insert(name.to_string(), parsed);
    }

    Ok(raw)
}
