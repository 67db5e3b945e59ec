//! Where settings bytes live between sessions.

pub mod backend;
pub mod file;
pub mod memory;

pub use backend::StateBackend;
pub use file::FileBackend;
pub use memory::MemoryBackend;
