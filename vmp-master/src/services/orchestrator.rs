//! Batch orchestration: the per-file state machine and the sequential batch loop
//!
//! Files are processed strictly one at a time. A failed file is reported and
//! the batch moves on; cancellation is observed between files, never
//! mid-file. The lossless intermediate is removed after every run, success or
//! not.

use crate::error::{MasterError, Result};
use crate::policy::MasteringPolicy;
use crate::services::analyzer::FeatureExtractor;
use crate::services::decision::decide;
use crate::services::engine::AudioEngine;
use crate::services::graph::{assemble, TERMINAL_OUTPUT};
use crate::services::output_format::{self, OutputFormat, OutputKind};
use crate::services::quality;
use crate::types::UserIntent;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;
use vmp_common::events::{BatchOutcome, EventBus, MasterEvent, RunStage};

/// Diagnostic excerpts in events are capped at this many characters.
const DIAGNOSTIC_EXCERPT_CHARS: usize = 200;

/// Outcome of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub outcome: BatchOutcome,
    pub processed: usize,
    pub failed: usize,
}

/// State for one file run.
struct PipelineRun {
    input: PathBuf,
    stage: RunStage,
    intermediate: PathBuf,
}

impl PipelineRun {
    fn new(input: &Path) -> Self {
        // the full file name (extension included) keeps scratch paths
        // distinct for inputs that share a stem
        let name = input
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("input");
        Self {
            input: input.to_path_buf(),
            stage: RunStage::Pending,
            intermediate: input.with_file_name(format!(".{}.mastering.wav", name)),
        }
    }
}

/// Position of the current file within its batch, for progress events.
#[derive(Debug, Clone, Copy)]
struct BatchPosition {
    completed: usize,
    total: usize,
}

pub struct MasteringOrchestrator {
    engine: Arc<dyn AudioEngine>,
    events: EventBus,
    policy: MasteringPolicy,
    analysis_timeout: Duration,
    process_timeout: Duration,
}

impl MasteringOrchestrator {
    pub fn new(
        engine: Arc<dyn AudioEngine>,
        events: EventBus,
        policy: MasteringPolicy,
        analysis_timeout: Duration,
        process_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            events,
            policy,
            analysis_timeout,
            process_timeout,
        }
    }

    /// Process a batch of files sequentially.
    ///
    /// Duplicate paths are dropped at enqueue time. The cancellation token is
    /// checked before each file; a file that has started always runs to its
    /// own completion or failure.
    pub async fn process_batch(
        &self,
        inputs: &[PathBuf],
        intent: &UserIntent,
        cancel: &CancellationToken,
    ) -> BatchSummary {
        let batch_id = Uuid::new_v4();
        let files = dedupe(inputs, &self.events);
        let total = files.len();

        info!(batch_id = %batch_id, total_files = total, "batch started");
        self.events.emit_lossy(MasterEvent::BatchStarted {
            batch_id,
            total_files: total,
            timestamp: Utc::now(),
        });

        let mut processed = 0usize;
        let mut failed = 0usize;
        let mut outcome = BatchOutcome::Completed;

        for (index, input) in files.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(remaining = total - index, "cancellation observed; stopping batch");
                outcome = BatchOutcome::Cancelled;
                break;
            }

            self.events.emit_lossy(MasterEvent::FileStarted {
                batch_id,
                input_path: input.display().to_string(),
                file_index: index,
                total_files: total,
                timestamp: Utc::now(),
            });

            let position = BatchPosition {
                completed: processed + failed,
                total,
            };
            match self.process_file(input, intent, position).await {
                Ok(output) => {
                    processed += 1;
                    info!(input = %input.display(), output = %output.display(), "file mastered");
                    self.events.emit_lossy(MasterEvent::FileCompleted {
                        input_path: input.display().to_string(),
                        output_path: output.display().to_string(),
                        timestamp: Utc::now(),
                    });
                }
                Err(e) => {
                    failed += 1;
                    let stage = e.stage();
                    warn!(input = %input.display(), stage = %stage, error = %e, "file failed");
                    self.events.emit_lossy(MasterEvent::FileFailed {
                        input_path: input.display().to_string(),
                        stage,
                        message: excerpt(&e.to_string()),
                        timestamp: Utc::now(),
                    });
                }
            }
        }

        info!(
            batch_id = %batch_id,
            processed,
            failed,
            outcome = ?outcome,
            "batch finished"
        );
        self.events.emit_lossy(MasterEvent::BatchCompleted {
            batch_id,
            outcome,
            processed,
            failed,
            timestamp: Utc::now(),
        });

        BatchSummary {
            outcome,
            processed,
            failed,
        }
    }

    /// Run one file through the full pipeline, removing the intermediate
    /// artifact regardless of outcome.
    async fn process_file(
        &self,
        input: &Path,
        intent: &UserIntent,
        position: BatchPosition,
    ) -> Result<PathBuf> {
        let mut run = PipelineRun::new(input);
        let result = self.run_stages(&mut run, intent, position).await;
        if run.intermediate.exists() {
            if let Err(e) = std::fs::remove_file(&run.intermediate) {
                warn!(path = %run.intermediate.display(), error = %e, "intermediate cleanup failed");
            }
        }
        result
    }

    async fn run_stages(
        &self,
        run: &mut PipelineRun,
        intent: &UserIntent,
        position: BatchPosition,
    ) -> Result<PathBuf> {
        self.enter(run, RunStage::Analyzing, 10, position);
        let extractor = FeatureExtractor::new(self.analysis_timeout);
        let features = extractor.extract(self.engine.as_ref(), &run.input).await?;
        self.events.emit_lossy(MasterEvent::QualityReport {
            input_path: run.input.display().to_string(),
            score: quality::score(&features),
            integrated_loudness_lufs: features.integrated_loudness_lufs,
            dynamic_range_db: features.dynamic_range_db,
            noise_floor_dbfs: features.noise_floor_dbfs,
            energy_profile: features.energy_profile,
            timestamp: Utc::now(),
        });

        self.enter(run, RunStage::Deciding, 20, position);
        let params = decide(&features, intent, &self.policy);

        self.enter(run, RunStage::Assembling, 25, position);
        let graph = assemble(&params)?;
        let filter_text = graph.serialize()?;

        self.enter(run, RunStage::Preprocessing, 30, position);
        let _ = std::fs::remove_file(&run.intermediate);
        let args = self.preprocess_args(&run.input, &filter_text, &run.intermediate);
        let out = self.engine.run(&args, self.process_timeout).await;
        if !out.success {
            return Err(MasterError::EngineFailed {
                stage: RunStage::Preprocessing,
                message: excerpt(&out.stderr),
            });
        }

        self.enter(run, RunStage::ValidatingIntermediate, 70, position);
        check_artifact(
            &run.intermediate,
            self.policy.intermediate_size_floor,
            RunStage::Preprocessing,
        )?;

        self.enter(run, RunStage::Encoding, 75, position);
        let format = output_format::select(&features, &run.input);
        let output = output_format::output_path(&run.input, &format);
        let args = self.encode_args(&run.input, &run.intermediate, &output, &format);
        let out = self.engine.run(&args, self.process_timeout).await;
        if !out.success {
            return Err(MasterError::EngineFailed {
                stage: RunStage::Encoding,
                message: excerpt(&out.stderr),
            });
        }

        self.enter(run, RunStage::ValidatingOutput, 95, position);
        check_artifact(&output, self.policy.output_size_floor, RunStage::Encoding)?;

        self.enter(run, RunStage::Done, 100, position);
        Ok(output)
    }

    fn enter(&self, run: &mut PipelineRun, stage: RunStage, percent: u8, position: BatchPosition) {
        debug!(input = %run.input.display(), from = %run.stage, to = %stage, "stage transition");
        run.stage = stage;
        let input_path = run.input.display().to_string();
        self.events.emit_lossy(MasterEvent::StageChanged {
            input_path: input_path.clone(),
            stage,
            timestamp: Utc::now(),
        });
        self.events.emit_lossy(MasterEvent::FileProgress {
            input_path,
            percent,
            batch_completed: position.completed,
            batch_total: position.total,
            timestamp: Utc::now(),
        });
    }

    /// First pass: filter graph into a lossless PCM intermediate.
    fn preprocess_args(&self, input: &Path, filter_text: &str, intermediate: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-i".to_string(),
            input.display().to_string(),
            "-filter_complex".to_string(),
            filter_text.to_string(),
            "-map".to_string(),
            format!("[{}]", TERMINAL_OUTPUT),
            "-c:a".to_string(),
            "pcm_s16le".to_string(),
            "-ar".to_string(),
            self.policy.sample_rate_hz.to_string(),
            "-ac".to_string(),
            self.policy.channels.to_string(),
            "-vn".to_string(),
            "-avoid_negative_ts".to_string(),
            "make_zero".to_string(),
            intermediate.display().to_string(),
        ]
    }

    /// Second pass: intermediate into the final container/codec.
    fn encode_args(
        &self,
        input: &Path,
        intermediate: &Path,
        output: &Path,
        format: &OutputFormat,
    ) -> Vec<String> {
        let mut args = vec!["-y".to_string(), "-hide_banner".to_string()];
        match format.kind {
            OutputKind::VideoRemux => {
                args.extend([
                    "-i".to_string(),
                    input.display().to_string(),
                    "-i".to_string(),
                    intermediate.display().to_string(),
                    "-map".to_string(),
                    "0:v".to_string(),
                    "-map".to_string(),
                    "1:a".to_string(),
                    "-c:v".to_string(),
                    "copy".to_string(),
                ]);
                args.extend(format.codec_args.iter().cloned());
                args.extend([
                    "-ar".to_string(),
                    self.policy.sample_rate_hz.to_string(),
                    "-ac".to_string(),
                    self.policy.channels.to_string(),
                    "-movflags".to_string(),
                    "+faststart".to_string(),
                    "-shortest".to_string(),
                ]);
            }
            OutputKind::AudioOnly => {
                args.extend(["-i".to_string(), intermediate.display().to_string()]);
                args.extend(format.codec_args.iter().cloned());
                args.extend([
                    "-ar".to_string(),
                    self.policy.sample_rate_hz.to_string(),
                    "-ac".to_string(),
                    self.policy.channels.to_string(),
                ]);
            }
        }
        args.push(output.display().to_string());
        args
    }
}

/// Drop duplicate paths, preserving first-seen order.
fn dedupe(inputs: &[PathBuf], events: &EventBus) -> Vec<PathBuf> {
    let mut seen: Vec<&PathBuf> = Vec::new();
    let mut out: Vec<PathBuf> = Vec::new();
    for input in inputs {
        if seen.contains(&input) {
            warn!(input = %input.display(), "duplicate input dropped");
            events.emit_lossy(MasterEvent::LogLine {
                line: format!("duplicate input dropped: {}", input.display()),
                timestamp: Utc::now(),
            });
            continue;
        }
        seen.push(input);
        out.push(input.clone());
    }
    out
}

/// Reject artifacts below the size floor, attributing the failure to the
/// pass that produced the artifact.
fn check_artifact(path: &Path, floor: u64, origin: RunStage) -> Result<()> {
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    if size < floor {
        return Err(MasterError::ArtifactInvalid {
            stage: origin,
            path: path.to_path_buf(),
            size,
            floor,
        });
    }
    Ok(())
}

/// Flatten and cap a diagnostic for event payloads.
fn excerpt(diagnostic: &str) -> String {
    let flat = diagnostic.replace(['\n', '\r'], " ");
    flat.chars()
        .take(DIAGNOSTIC_EXCERPT_CHARS)
        .collect::<String>()
        .trim()
        .to_string()
}
