//! Command line access to a moca database.

pub mod args;
pub mod commands;
pub mod format;
