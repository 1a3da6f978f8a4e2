//! Subcommand implementations

pub mod audit;
pub mod nodes;
pub mod pods;
pub mod windows;
