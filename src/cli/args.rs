use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "colvault", version, about = "Backups and recovery for a collection file")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Back up the collection if it is due.
    Backup(BackupArgs),
    /// List backups, oldest first.
    List(CollectionArgs),
    /// Delete all but the newest backups.
    Prune(PruneArgs),
    /// Rebuild a damaged collection with sqlite3.
    Repair(CollectionArgs),
    /// Move the collection into the broken folder.
    Quarantine(QuarantineArgs),
    /// Replace the collection with the contents of a backup.
    Restore(RestoreArgs),
    /// Report whether a safety backup is needed.
    SafetyCheck(SafetyArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CollectionArgs {
    pub collection: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct BackupArgs {
    pub collection: PathBuf,
    /// Hours between backups; defaults to the configured interval.
    #[arg(long)]
    pub interval: Option<u32>,
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PruneArgs {
    pub collection: PathBuf,
    /// Defaults to the configured backup count.
    #[arg(long)]
    pub keep: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct QuarantineArgs {
    pub collection: PathBuf,
    /// Also move files sharing the collection's name, such as journals.
    #[arg(long)]
    pub siblings: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RestoreArgs {
    pub collection: PathBuf,
    pub backup: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct SafetyArgs {
    pub collection: PathBuf,
    #[arg(long, default_value_t = 3)]
    pub days: u32,
}

impl Command {
    pub fn collection(&self) -> &Path {
        match self {
            Command::Backup(args) => &args.collection,
            Command::List(args) | Command::Repair(args) => &args.collection,
            Command::Prune(args) => &args.collection,
            Command::Quarantine(args) => &args.collection,
            Command::Restore(args) => &args.collection,
            Command::SafetyCheck(args) => &args.collection,
        }
    }
}
