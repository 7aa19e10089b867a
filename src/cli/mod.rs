//! CLI module for asset-prep
//!
//! This module is only available when the "cli" feature is enabled.

mod config;
#[path = "main.rs"]
mod main_impl;
mod output;

pub use main_impl::{main, run, Cli, CliPolicy, Command, NormalizeMeshArgs, RemoveBgArgs};
pub use output::CommandResponse;
