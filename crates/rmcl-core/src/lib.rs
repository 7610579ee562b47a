//! rmcl-core - Domain types and config shared by the rmcl crates
//!
//! Contains the pieces that have no business talking to the network or a
//! filesystem driver: the remote metadata wire shape, the small enums for
//! file type and display mode, the on-disk config, and RFC3339 helpers.

pub mod config;
pub mod domain;
pub mod time;
