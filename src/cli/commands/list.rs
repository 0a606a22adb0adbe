use crate::backup::naming::describe_backup;
use crate::cli::args::CollectionArgs;
use crate::error::Result;
use crate::vault::Vault;

pub fn run_list(vault: &Vault, args: CollectionArgs) -> Result<()> {
    let backups = vault.list_backups(&args.collection);
    if backups.is_empty() {
        println!("no backups");
        return Ok(());
    }
    for entry in &backups {
        let name = entry.file_name();
        println!("{:<20} {}", describe_backup(&name), entry.path.display());
    }
    Ok(())
}
