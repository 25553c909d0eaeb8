//! CLI module for podstore - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
