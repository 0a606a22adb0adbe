use std::path::Path;

use crate::cli::args::{CollectionArgs, QuarantineArgs};
use crate::collection::CollectionPath;
use crate::error::Result;
use crate::vault::Vault;

pub fn run_repair(vault: &Vault, args: CollectionArgs) -> Result<()> {
    let mut collection = CollectionPath::new(&args.collection);
    let moved = vault.repair_coordinator().repair(&mut collection)?;
    println!("{}", repair_report(&args.collection, &moved));
    Ok(())
}

fn repair_report(collection: &Path, moved: &Path) -> String {
    format!(
        "repaired {}\nmoved corrupt file to {}",
        collection.display(),
        moved.display()
    )
}

pub fn run_quarantine(vault: &Vault, args: QuarantineArgs) -> Result<()> {
    let moved = vault
        .quarantine_manager()
        .quarantine(&args.collection, args.siblings)?;
    println!("moved to {}", moved.display());
    Ok(())
}
