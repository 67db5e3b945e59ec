use serde::{Deserialize, Serialize};

use super::persisted::PersistedState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextDirection {
    #[default]
    Ltr,
    Rtl,
}

impl TextDirection {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "ltr" => Some(Self::Ltr),
            "rtl" => Some(Self::Rtl),
            _ => None,
        }
    }
}

/// Values supplied by the host browser when the page starts.
///
/// Read once per session and never written back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostEnvironment {
    pub text_direction: TextDirection,
    pub is_incognito: bool,
    pub is_tor: bool,
    pub is_qwant: bool,
}

impl HostEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text_direction(mut self, direction: TextDirection) -> Self {
        self.text_direction = direction;
        self
    }

    pub fn incognito(mut self, is_incognito: bool) -> Self {
        self.is_incognito = is_incognito;
        self
    }

    pub fn tor(mut self, is_tor: bool) -> Self {
        self.is_tor = is_tor;
        self
    }

    pub fn qwant(mut self, is_qwant: bool) -> Self {
        self.is_qwant = is_qwant;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub ads_blocked_stat: u64,
    pub javascript_blocked_stat: u64,
    pub bandwidth_saved_stat: u64,
    pub fingerprinting_blocked_stat: u64,
}

/// Runtime-only fields, recomputed every session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EphemeralState {
    pub initial_data_loaded: bool,
    pub text_direction: TextDirection,
    pub is_incognito: bool,
    pub use_alternative_private_search_engine: bool,
    pub tor_circuit_established: bool,
    pub tor_init_progress: String,
    pub is_tor: bool,
    pub is_qwant: bool,
    pub stats: Stats,
}

impl EphemeralState {
    pub fn from_host(host: &HostEnvironment) -> Self {
        // Tor and Qwant windows only exist inside private contexts.
        let private = host.is_incognito;
        Self {
            text_direction: host.text_direction,
            is_incognito: private,
            is_tor: private && host.is_tor,
            is_qwant: private && host.is_qwant,
            ..Self::default()
        }
    }
}

/// What consumers observe: persisted preferences plus session fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombinedState {
    #[serde(flatten)]
    pub persisted: PersistedState,
    #[serde(flatten)]
    pub ephemeral: EphemeralState,
}
