use crate::cli::args::SafetyArgs;
use crate::error::Result;
use crate::vault::Vault;

pub fn run_safety_check(vault: &Vault, args: SafetyArgs) -> Result<()> {
    let needed = vault
        .scheduler()
        .safety_backup_needed(&args.collection, args.days)?;
    if needed {
        println!("safety backup needed");
    } else {
        println!("no safety backup needed");
    }
    Ok(())
}
