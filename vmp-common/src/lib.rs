//! # VMP Common Library
//!
//! Shared code for the VMP mastering pipeline:
//! - Event types (MasterEvent enum) and the broadcast EventBus
//! - Configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
