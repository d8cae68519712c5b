//! Error types for the mastering pipeline

use std::path::PathBuf;
use thiserror::Error;
use vmp_common::events::RunStage;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, MasterError>;

/// Errors raised by a single file run.
///
/// Every variant maps to the stage that originated it (see [`MasterError::stage`]);
/// the run transitions to `Failed` carrying that stage, and the batch moves on.
#[derive(Error, Debug)]
pub enum MasterError {
    /// Input file does not exist or is not readable
    #[error("input file not found: {0}")]
    InputMissing(PathBuf),

    /// An engine invocation exited non-zero, timed out, or failed to spawn
    #[error("engine invocation failed during {stage}: {message}")]
    EngineFailed { stage: RunStage, message: String },

    /// A produced artifact is missing or smaller than its size floor
    #[error("artifact invalid after {stage}: {path} ({size} bytes, floor {floor})")]
    ArtifactInvalid {
        stage: RunStage,
        path: PathBuf,
        size: u64,
        floor: u64,
    },

    /// The assembled filter graph violates its structural contract
    #[error("filter graph contract violation: {0}")]
    GraphContract(String),

    /// I/O error outside engine invocations (artifact checks, cleanup)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MasterError {
    /// The stage a failed run is attributed to.
    ///
    /// Artifact floor violations are attributed to the engine pass that
    /// produced the artifact, not to the validation step that caught them.
    pub fn stage(&self) -> RunStage {
        match self {
            MasterError::InputMissing(_) => RunStage::Analyzing,
            MasterError::EngineFailed { stage, .. } => *stage,
            MasterError::ArtifactInvalid { stage, .. } => *stage,
            MasterError::GraphContract(_) => RunStage::Assembling,
            MasterError::Io(_) => RunStage::Failed,
        }
    }
}
