//! Domain layer — pure types and validators.
//!
//! No I/O, no async, no imports from `crate::infra`, `crate::commands`,
//! or `crate::output`.

pub mod config;
pub mod error;
pub mod manifest;
pub mod whitelist;

pub use config::{EngineConfig, ServiceKind, ServiceTarget};
pub use error::EngineError;
pub use manifest::{ApprovalToken, Change, HealthCheck, Manifest, MAX_SOURCE_BYTES};
pub use whitelist::PathWhitelist;
