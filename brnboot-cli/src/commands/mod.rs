//! Command implementations.
//!
//! Each subcommand is implemented in its own module.

pub(crate) mod completions;
pub(crate) mod dump;
pub(crate) mod ports;
pub(crate) mod upload;
pub(crate) mod write;
