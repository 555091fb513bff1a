//! Application wiring and lifecycle management.

mod check;
mod commands;
mod error;
mod init;

pub use check::check_config;
pub use init::run_herald;
