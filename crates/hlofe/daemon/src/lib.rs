//! HLO-FE Daemon library
//!
//! This module provides the core components for the HLO-FE daemon:
//! - REST API handlers for the service lifecycle
//! - Configuration loading
//! - Wiring of the entity store, domain lookup and notifier

pub mod api;
pub mod config;
pub mod error;
pub mod server;

pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError};
pub use server::Server;
