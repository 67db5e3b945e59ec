//! Typed settings shapes: what is persisted, what lives only for a session,
//! and the partial updates consumers send.

pub mod ephemeral;
pub mod patch;
pub mod persisted;

pub use ephemeral::{CombinedState, EphemeralState, HostEnvironment, Stats, TextDirection};
pub use patch::StatePatch;
pub use persisted::{
    ClockFormat, PersistedState, StackWidget, keys, read_widget_list, widget_list_value,
};
