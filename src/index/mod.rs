//! Index lifecycle management

pub mod lifecycle;

pub use lifecycle::{ensure_directories, IndexLifecycleManager, IndexState, LifecycleOutcome};
