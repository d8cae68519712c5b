//! Event types for the VMP event system
//!
//! The pipeline worker publishes `MasterEvent`s on an `EventBus`; the caller
//! (CLI or any other front end) subscribes and renders them. Events are the
//! only channel between the pipeline core and its callers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Pipeline stage for a single file run.
///
/// Transitions are one-directional; no stage is revisited. `Done` and
/// `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RunStage {
    /// Queued, not yet started
    Pending,
    /// Measurement passes against the audio engine
    Analyzing,
    /// Deriving stage parameters from measurements + intent
    Deciding,
    /// Building and validating the filter graph
    Assembling,
    /// First engine pass: filter graph -> lossless intermediate
    Preprocessing,
    /// Intermediate artifact existence/size check
    ValidatingIntermediate,
    /// Second engine pass: intermediate -> final container/codec
    Encoding,
    /// Final artifact existence/size check
    ValidatingOutput,
    /// Run finished successfully
    Done,
    /// Run failed (stage recorded in the event payload)
    Failed,
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStage::Pending => "Pending",
            RunStage::Analyzing => "Analyzing",
            RunStage::Deciding => "Deciding",
            RunStage::Assembling => "Assembling",
            RunStage::Preprocessing => "Preprocessing",
            RunStage::ValidatingIntermediate => "ValidatingIntermediate",
            RunStage::Encoding => "Encoding",
            RunStage::ValidatingOutput => "ValidatingOutput",
            RunStage::Done => "Done",
            RunStage::Failed => "Failed",
        };
        write!(f, "{}", s)
    }
}

/// Coarse energy classification of an input, derived from its peak level.
///
/// Advisory only: surfaced in quality reports, never used to branch
/// processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyProfile {
    /// Peak above -6 dBFS
    Loud,
    /// Peak below -12 dBFS
    Quiet,
    /// Everything in between
    Balanced,
}

impl std::fmt::Display for EnergyProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EnergyProfile::Loud => "loud",
            EnergyProfile::Quiet => "quiet",
            EnergyProfile::Balanced => "balanced",
        };
        write!(f, "{}", s)
    }
}

/// How a batch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchOutcome {
    /// All queued files were attempted
    Completed,
    /// Cancellation observed between files; remaining files not attempted
    Cancelled,
}

/// VMP event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MasterEvent {
    /// Batch processing started
    BatchStarted {
        batch_id: Uuid,
        total_files: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A file was dequeued and its run created
    FileStarted {
        batch_id: Uuid,
        input_path: String,
        file_index: usize,
        total_files: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A run moved to a new stage
    StageChanged {
        input_path: String,
        stage: RunStage,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Per-file progress (0-100) plus overall batch fraction
    FileProgress {
        input_path: String,
        percent: u8,
        batch_completed: usize,
        batch_total: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Free-text log line (UI concern; content is not machine-parsed)
    LogLine {
        line: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Analysis-derived quality report for a file (reporting only)
    QualityReport {
        input_path: String,
        score: f64,
        integrated_loudness_lufs: f64,
        dynamic_range_db: f64,
        noise_floor_dbfs: f64,
        energy_profile: EnergyProfile,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A file finished successfully
    FileCompleted {
        input_path: String,
        output_path: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A file failed; the batch continues with the next file
    FileFailed {
        input_path: String,
        stage: RunStage,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Batch finished (all files attempted, or cancelled between files)
    BatchCompleted {
        batch_id: Uuid,
        outcome: BatchOutcome,
        processed: usize,
        failed: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl MasterEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            MasterEvent::BatchStarted { .. } => "BatchStarted",
            MasterEvent::FileStarted { .. } => "FileStarted",
            MasterEvent::StageChanged { .. } => "StageChanged",
            MasterEvent::FileProgress { .. } => "FileProgress",
            MasterEvent::LogLine { .. } => "LogLine",
            MasterEvent::QualityReport { .. } => "QualityReport",
            MasterEvent::FileCompleted { .. } => "FileCompleted",
            MasterEvent::FileFailed { .. } => "FileFailed",
            MasterEvent::BatchCompleted { .. } => "BatchCompleted",
        }
    }
}

/// Broadcast event bus shared between the pipeline worker and its callers.
///
/// Uses tokio::broadcast internally: non-blocking publish, multiple
/// concurrent subscribers, automatic cleanup when subscribers drop.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MasterEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events.
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<MasterEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns `Ok(subscriber_count)`, or `Err` if no subscriber is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: MasterEvent,
    ) -> Result<usize, broadcast::error::SendError<MasterEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the case where no subscriber is listening.
    ///
    /// Progress and log events are emitted lossy: it is acceptable for a
    /// caller to not be attached yet.
    pub fn emit_lossy(&self, event: MasterEvent) {
        let _ = self.tx.send(event);
    }

    /// Configured channel capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
