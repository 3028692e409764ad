//! Infrastructure layer — filesystem, processes, network, persistence.

pub mod audit;
pub mod backup;
pub mod fs;
pub mod health;
pub mod rate_limit;
pub mod services;
pub mod staging;
pub mod validators;
