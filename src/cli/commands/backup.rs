use crate::backup::BackupOutcome;
use crate::cli::args::BackupArgs;
use crate::collection::CollectionPath;
use crate::error::Result;
use crate::vault::Vault;

pub fn run_backup(vault: &Vault, args: BackupArgs) -> Result<()> {
    let scheduler = vault.scheduler();
    let interval = match args.interval {
        Some(hours) => hours,
        None => scheduler.settings().settings()?.interval_hours,
    };
    let collection = CollectionPath::new(&args.collection);
    match scheduler.perform_backup(&collection, interval, args.force) {
        BackupOutcome::Started(job) => {
            let entry = job.wait()?;
            println!("{}", entry.path.display());
        }
        BackupOutcome::Skipped(reason) => println!("backup skipped: {}", reason),
        BackupOutcome::Failed(err) => return Err(err),
    }
    Ok(())
}
