use crate::backup::{catalog, retention};
use crate::cli::args::PruneArgs;
use crate::error::{ColvaultError, Result};
use crate::vault::Vault;

pub fn run_prune(vault: &Vault, args: PruneArgs) -> Result<()> {
    let keep = match args.keep {
        Some(keep) => keep,
        None => vault.scheduler().settings().settings()?.retention_count,
    };
    let backups = catalog::list_for_collection(&args.collection)?;
    let deleted = retention::prune(&backups, keep);
    for entry in &deleted {
        println!("deleted {}", entry.path.display());
    }
    let failed = backups.len().saturating_sub(keep) - deleted.len();
    if failed > 0 {
        return Err(ColvaultError::message(format!(
            "{} backup(s) could not be deleted",
            failed
        )));
    }
    Ok(())
}
