pub mod command;
pub mod paths;
