//! Batch voice/music mastering pipeline
//!
//! Analysis -> decision -> graph assembly -> two-phase execution against an
//! external ffmpeg engine. The pipeline core is headless; callers drive it
//! through [`services::orchestrator::MasteringOrchestrator`] and observe it
//! through the event bus.

pub mod config;
pub mod error;
pub mod policy;
pub mod services;
pub mod types;

pub use error::{MasterError, Result};
pub use policy::MasteringPolicy;
