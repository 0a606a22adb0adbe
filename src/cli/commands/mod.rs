pub mod backup;
pub mod list;
pub mod prune;
pub mod repair;
pub mod restore;
pub mod safety;

use crate::error::ColvaultError;

pub fn exit_for_error(err: &ColvaultError) -> ! {
    let code = match err {
        ColvaultError::Config(_) => 2,
        _ => 1,
    };
    eprintln!("{}", err);
    std::process::exit(code);
}
