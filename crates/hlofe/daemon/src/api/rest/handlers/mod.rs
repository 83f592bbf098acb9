//! API request handlers

pub mod health;
pub mod services;

pub use health::*;
pub use services::*;
