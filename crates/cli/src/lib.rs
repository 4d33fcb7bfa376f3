//! The `flash` command-line interface.

pub mod cli;
pub mod commands;
pub mod format;
pub mod update_checker;
