//! Command line interface

pub mod apply;
pub mod commands;
pub mod display;
pub mod retry;

pub use commands::{CliArgs, Commands};
