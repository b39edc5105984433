//! Sync orchestration: pull cycles, outbound pushes and the auto-sync timer

pub mod orchestrator;
pub mod push;
pub mod scheduler;

pub use orchestrator::{SyncOrchestrator, SyncTarget};
pub use push::PushPipeline;
pub use scheduler::{AutoSyncScheduler, SchedulerState, SchedulerStatus};
