//! CLI subcommands.

pub mod cache;
pub mod common;
pub mod pick;
pub mod resolve;
pub mod watch;
