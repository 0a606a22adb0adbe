pub mod archive;
pub mod catalog;
pub mod naming;
pub mod restore;
pub mod retention;
pub mod scheduler;

pub use scheduler::{BackupJob, BackupOutcome, BackupScheduler, SkipReason};
