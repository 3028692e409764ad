//! Gated configuration deployment engine.
//!
//! Consumes a staged manifest of file changes, validates it against a path
//! whitelist and per-role content checks, rate-limits applies, snapshots
//! every destination, deploys atomically, restarts the affected services,
//! and verifies the host's declared health checks, rolling back when they
//! fail. Every step lands in an append-only JSONL audit log.

#![cfg_attr(test, allow(clippy::expect_used))]

pub mod application;
pub mod cli;
pub mod command_runner;
pub mod commands;
pub mod domain;
pub mod infra;
pub mod output;
