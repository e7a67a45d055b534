//! Command implementations for the `rcache` binary.

pub mod commands;
