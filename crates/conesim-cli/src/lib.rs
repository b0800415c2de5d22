//! Shared code for the `simulated-perception` and `integrity-check` binaries.

pub mod args;
pub mod config;
