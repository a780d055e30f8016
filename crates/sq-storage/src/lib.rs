//! Working storage for transient request artifacts, and deferred removal.
//!
//! The engine never builds paths itself: it hands keys to a
//! [`WorkingStorage`] and asks a [`Scheduler`] to remove them later.

pub mod local;
pub mod memory;
pub mod scheduler;
pub mod traits;

pub use local::LocalWorkingStorage;
pub use memory::MemoryWorkingStorage;
pub use scheduler::{DeletionScheduler, ScheduledTask, Scheduler};
pub use traits::{validate_key, ArtifactHandle, WorkingStorage};
