pub mod backup;
pub mod cli;
pub mod clock;
pub mod collection;
pub mod config;
pub mod disk;
pub mod error;
pub mod repair;
pub mod types;
pub mod util;
pub mod vault;

pub use backup::{BackupJob, BackupOutcome, BackupScheduler, SkipReason};
pub use collection::{CollectionHandle, CollectionPath};
pub use error::{ColvaultError, Result};
pub use repair::{QuarantineManager, RepairCoordinator};
pub use vault::Vault;
