use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::args::{Cli, Command};
use crate::cli::commands::{backup, exit_for_error, list, prune, repair, restore, safety};
use crate::config::load::load_config;
use crate::config::YamlSettings;
use crate::util::paths::data_root;
use crate::vault::Vault;

const CONFIG_FILE: &str = "colvault.yaml";

pub mod args;
pub mod commands;

pub fn run() -> Result<()> {
    let cli = parse_cli();
    init_tracing(cli.verbose);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| default_config_path(cli.command.collection()));
    if let Err(err) = load_config(&config_path) {
        exit_for_error(&err);
    }
    let vault = Vault::new(Arc::new(YamlSettings::new(config_path)));

    let result = match cli.command {
        Command::Backup(args) => backup::run_backup(&vault, args),
        Command::List(args) => list::run_list(&vault, args),
        Command::Prune(args) => prune::run_prune(&vault, args),
        Command::Repair(args) => repair::run_repair(&vault, args),
        Command::Quarantine(args) => repair::run_quarantine(&vault, args),
        Command::Restore(args) => restore::run_restore(&vault, args),
        Command::SafetyCheck(args) => safety::run_safety_check(&vault, args),
    };
    if let Err(err) = result {
        exit_for_error(&err);
    }
    Ok(())
}

fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                let _ = err.print();
                std::process::exit(0);
            }
            let _ = err.print();
            std::process::exit(2);
        }
    }
}

fn default_config_path(collection: &Path) -> PathBuf {
    data_root(collection).join(CONFIG_FILE)
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
