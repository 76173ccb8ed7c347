//! portkeep CLI library
//!
//! Command implementations and output helpers for the `portkeep` binary.

pub mod commands;
pub mod output;
