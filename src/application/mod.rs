//! Application layer — ports and use-case services.

pub mod ports;
pub mod services;
