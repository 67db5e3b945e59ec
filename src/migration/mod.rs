//! Versioned upgrades of persisted settings records.
//!
//! A [`MigrationChain`] owns an ordered list of steps. Each step carries the
//! shape version it produces and, optionally, a probe that recognises records
//! already in that shape. Records the store writes are stamped with
//! `schemaVersion`; older records are dated by walking the probes.

mod new_tab;

pub use new_tab::{
    BASE_VERSION, CURRENT_VERSION, LEGACY_CURRENT_STACK_WIDGET, new_tab_chain,
};

use crate::core::{CorruptStateError, RawState, Result, StoreError, ValueKind, present};
use crate::state::{PersistedState, keys};
use std::fmt;
use std::sync::Arc;
use tracing::{Level, event};

/// A function that upgrades a record in place to one shape version.
pub type MigrationFn =
    Arc<dyn Fn(&mut RawState) -> std::result::Result<(), CorruptStateError> + Send + Sync>;

/// Recognises records that already have a step's shape.
pub type ShapeProbe = fn(&RawState) -> bool;

#[derive(Clone)]
pub struct MigrationStep {
    version: u32,
    name: &'static str,
    probe: Option<ShapeProbe>,
    transform: MigrationFn,
}

impl fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("version", &self.version)
            .field("name", &self.name)
            .field("has_probe", &self.probe.is_some())
            .finish()
    }
}

impl MigrationStep {
    /// Creates a step that upgrades records to `version`.
    pub fn new<F>(version: u32, name: &'static str, transform: F) -> Self
    where
        F: Fn(&mut RawState) -> std::result::Result<(), CorruptStateError> + Send + Sync + 'static,
    {
        Self {
            version,
            name,
            probe: None,
            transform: Arc::new(transform),
        }
    }

    /// Attaches a probe used to date records that carry no version stamp.
    pub fn with_probe(mut self, probe: ShapeProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True when the probe recognises `raw` as already having this shape.
    /// Steps without a probe never match.
    pub fn matches(&self, raw: &RawState) -> bool {
        self.probe.is_some_and(|probe| probe(raw))
    }

    pub fn apply(&self, raw: &mut RawState) -> std::result::Result<(), CorruptStateError> {
        (self.transform)(raw)
    }
}

/// Result of bringing one record up to date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOutcome {
    pub state: PersistedState,
    pub from_version: u32,
    pub to_version: u32,
    /// Names of the steps that ran, oldest first.
    pub applied: Vec<&'static str>,
}

impl MigrationOutcome {
    pub fn migrated(&self) -> bool {
        !self.applied.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct MigrationChain {
    base_version: u32,
    steps: Vec<MigrationStep>,
}

impl MigrationChain {
    /// Creates an empty chain whose oldest known shape is `base_version`.
    pub fn new(base_version: u32) -> Self {
        Self {
            base_version,
            steps: Vec::new(),
        }
    }

    pub fn base_version(&self) -> u32 {
        self.base_version
    }

    /// The shape version every record leaves the chain at.
    pub fn current_version(&self) -> u32 {
        self.steps
            .last()
            .map_or(self.base_version, MigrationStep::version)
    }

    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    /// Appends a step. Its version must exceed every version already present.
    pub fn add_step(&mut self, step: MigrationStep) -> Result<()> {
        let floor = self.current_version();
        if step.version <= floor {
            return Err(StoreError::InvalidMigration(format!(
                "step '{}' targets version {} which does not exceed {}",
                step.name, step.version, floor
            )));
        }
        self.steps.push(step);
        Ok(())
    }

    /// Fluent builder method to add a step.
    pub fn with_step(mut self, step: MigrationStep) -> Result<Self> {
        self.add_step(step)?;
        Ok(self)
    }

    /// Works out which shape version `raw` is at.
    pub fn detect_version(&self, raw: &RawState) -> std::result::Result<u32, CorruptStateError> {
        if let Some(stamp) = present(raw, keys::SCHEMA_VERSION) {
            return stamp
                .as_u64()
                .and_then(|version| u32::try_from(version).ok())
                .ok_or_else(|| {
                    CorruptStateError::new(
                        keys::SCHEMA_VERSION,
                        "a non-negative integer",
                        ValueKind::of(stamp),
                    )
                });
        }

        let mut version = self.base_version;
        for step in &self.steps {
            if !step.matches(raw) {
                break;
            }
            version = step.version;
        }
        Ok(version)
    }

    /// Applies every step newer than the record, then types the result.
    ///
    /// Missing fields are filled from defaults and unknown keys are dropped.
    pub fn run(&self, mut raw: RawState) -> std::result::Result<MigrationOutcome, CorruptStateError> {
        let from_version = self.detect_version(&raw)?;
        let to_version = self.current_version();
        if from_version > to_version {
            event!(
                Level::DEBUG,
                from_version,
                to_version,
                "settings record is newer than this build; unknown keys will be dropped"
            );
        }

        let mut applied = Vec::new();
        for step in self.steps.iter().filter(|step| step.version > from_version) {
            event!(Level::DEBUG, step = step.name, version = step.version, "applying settings migration");
            step.apply(&mut raw)?;
            applied.push(step.name);
        }

        raw.remove(keys::SCHEMA_VERSION);
        let state = PersistedState::from_raw(&raw)?;
        Ok(MigrationOutcome {
            state,
            from_version,
            to_version,
            applied,
        })
    }

    /// The record to persist for `state`, stamped with the current version.
    pub fn seal(&self, state: &PersistedState) -> RawState {
        state.to_record(self.current_version())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn raw(value: Value) -> RawState {
        value.as_object().cloned().unwrap()
    }

    fn rename_clock(raw: &mut RawState) -> std::result::Result<(), CorruptStateError> {
        if let Some(value) = raw.remove("clock") {
            raw.insert(keys::SHOW_CLOCK.to_string(), value);
        }
        Ok(())
    }

    fn has_no_legacy_clock(raw: &RawState) -> bool {
        !raw.contains_key("clock")
    }

    #[test]
    fn test_steps_must_increase() {
        let chain = MigrationChain::new(1)
            .with_step(MigrationStep::new(2, "two", |_| Ok(())))
            .unwrap();
        assert_eq!(chain.current_version(), 2);

        let mut chain = chain;
        assert!(matches!(
            chain.add_step(MigrationStep::new(2, "again", |_| Ok(()))),
            Err(StoreError::InvalidMigration(_))
        ));
        assert!(MigrationChain::new(3)
            .with_step(MigrationStep::new(1, "old", |_| Ok(())))
            .is_err());
    }

    #[test]
    fn test_empty_chain_only_types() {
        let chain = MigrationChain::new(1);
        let outcome = chain.run(raw(json!({"showStats": true}))).unwrap();
        assert!(outcome.state.show_stats);
        assert!(!outcome.migrated());
        assert_eq!(outcome.to_version, 1);
    }

    #[test]
    fn test_probe_dates_unstamped_records() {
        let chain = MigrationChain::new(1)
            .with_step(MigrationStep::new(2, "rename-clock", rename_clock).with_probe(has_no_legacy_clock))
            .unwrap();

        assert_eq!(chain.detect_version(&raw(json!({"clock": true}))).unwrap(), 1);
        assert_eq!(chain.detect_version(&raw(json!({"showClock": true}))).unwrap(), 2);

        let outcome = chain.run(raw(json!({"clock": true}))).unwrap();
        assert!(outcome.state.show_clock);
        assert_eq!(outcome.applied, vec!["rename-clock"]);
    }

    #[test]
    fn test_stamp_wins_over_probes() {
        let chain = MigrationChain::new(1)
            .with_step(MigrationStep::new(2, "rename-clock", rename_clock).with_probe(has_no_legacy_clock))
            .unwrap();
        let record = raw(json!({"schemaVersion": 1, "showClock": true}));
        assert_eq!(chain.detect_version(&record).unwrap(), 1);
    }

    #[test]
    fn test_bad_stamp_is_corrupt() {
        let chain = MigrationChain::new(1);
        let err = chain
            .detect_version(&raw(json!({"schemaVersion": "five"})))
            .unwrap_err();
        assert_eq!(err.field, keys::SCHEMA_VERSION);
        assert!(chain.detect_version(&raw(json!({"schemaVersion": -1}))).is_err());
    }

    #[test]
    fn test_newer_records_skip_every_step() {
        let chain = MigrationChain::new(1)
            .with_step(MigrationStep::new(2, "explode", |_| {
                Err(CorruptStateError::new("x", "nothing", ValueKind::Null))
            }))
            .unwrap();
        let outcome = chain
            .run(raw(json!({"schemaVersion": 9, "showTopSites": true, "futureKey": 1})))
            .unwrap();
        assert!(outcome.state.show_top_sites);
        assert_eq!(outcome.from_version, 9);
        assert!(!outcome.migrated());
    }

    #[test]
    fn test_seal_stamps_current_version() {
        let chain = MigrationChain::new(1)
            .with_step(MigrationStep::new(3, "three", |_| Ok(())))
            .unwrap();
        let sealed = chain.seal(&PersistedState::default());
        assert_eq!(sealed.get(keys::SCHEMA_VERSION), Some(&json!(3)));
        assert_eq!(chain.detect_version(&sealed).unwrap(), 3);
    }
}
