use crate::cli::args::RestoreArgs;
use crate::error::Result;
use crate::vault::Vault;

pub fn run_restore(vault: &Vault, args: RestoreArgs) -> Result<()> {
    let restored = vault.restore_backup(&args.collection, &args.backup)?;
    println!("restored {} from {}", restored.display(), args.backup.display());
    Ok(())
}
