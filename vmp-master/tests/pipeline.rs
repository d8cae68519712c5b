//! End-to-end pipeline tests against a scripted engine double
//!
//! The double answers measurement passes with canned diagnostic text and
//! materializes artifacts for processing passes, so the full orchestration
//! path runs without a real ffmpeg binary.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vmp_common::events::{BatchOutcome, EnergyProfile, EventBus, MasterEvent, RunStage};
use vmp_master::policy::MasteringPolicy;
use vmp_master::services::engine::{AudioEngine, EngineOutput};
use vmp_master::services::orchestrator::MasteringOrchestrator;
use vmp_master::types::UserIntent;

fn probe_stderr() -> String {
    "Input #0, mp3, from 'voice.mp3':\n  Duration: 00:02:00.00, start: 0.000000, bitrate: 192 kb/s\n  Stream #0:0: Audio: mp3, 44100 Hz, stereo, fltp, 192 kb/s\n".to_string()
}

fn loudnorm_stderr(lufs: f64) -> String {
    format!(
        "[Parsed_loudnorm_0 @ 0x1]\nInput Integrated Loudness:   {:.1} LUFS\nInput True Peak:   -3.0 dBTP\nInput Loudness Range:   9.0 LU\n",
        lufs
    )
}

fn volumedetect_stderr() -> String {
    "[Parsed_volumedetect_0 @ 0x1] mean_volume: -19.0 dB\n[Parsed_volumedetect_0 @ 0x1] max_volume: -3.0 dB\n[Parsed_volumedetect_0 @ 0x1] min_volume: -52.0 dB\n".to_string()
}

fn astats_stderr() -> String {
    "lavfi.astats.Overall.PeakFactor=4.0\nlavfi.astats.Overall.PeakFactor=7.5\n".to_string()
}

/// Scripted stand-in for the external engine.
struct ScriptedEngine {
    measured_lufs: f64,
    intermediate_bytes: usize,
    output_bytes: usize,
    fail_preprocess: Option<String>,
    /// Cancel this token when an encode pass runs (simulates a user pressing
    /// cancel while a file is mid-flight)
    cancel_on_encode: Option<CancellationToken>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedEngine {
    fn healthy() -> Self {
        Self {
            measured_lufs: -20.0,
            intermediate_bytes: 400_000,
            output_bytes: 150_000,
            fail_preprocess: None,
            cancel_on_encode: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn recorded_calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AudioEngine for ScriptedEngine {
    async fn run(&self, args: &[String], _timeout: Duration) -> EngineOutput {
        self.calls.lock().unwrap().push(args.to_vec());

        let ok = |stderr: String| EngineOutput {
            success: true,
            stderr,
        };

        if let Some(pos) = args.iter().position(|a| a == "-af") {
            let filter = &args[pos + 1];
            if filter.contains("loudnorm") {
                return ok(loudnorm_stderr(self.measured_lufs));
            }
            if filter.contains("astats") {
                return ok(astats_stderr());
            }
            // full-band and high-band volumedetect share the fixture
            return ok(volumedetect_stderr());
        }

        if args.iter().any(|a| a == "-filter_complex") {
            if let Some(message) = &self.fail_preprocess {
                return EngineOutput {
                    success: false,
                    stderr: message.clone(),
                };
            }
            let target = args.last().unwrap();
            std::fs::write(target, vec![0u8; self.intermediate_bytes]).unwrap();
            return ok(String::new());
        }

        if args.len() == 3 && args[0] == "-i" {
            // stream probe: exit status is irrelevant, diagnostics carry data
            return ok(probe_stderr());
        }

        // encode pass
        if let Some(token) = &self.cancel_on_encode {
            token.cancel();
        }
        let target = args.last().unwrap();
        std::fs::write(target, vec![0u8; self.output_bytes]).unwrap();
        ok(String::new())
    }
}

fn orchestrator(engine: Arc<ScriptedEngine>) -> (MasteringOrchestrator, EventBus) {
    let events = EventBus::new(1024);
    let orch = MasteringOrchestrator::new(
        engine,
        events.clone(),
        MasteringPolicy::default(),
        Duration::from_secs(5),
        Duration::from_secs(5),
    );
    (orch, events)
}

fn make_input(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"not really audio").unwrap();
    path
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<MasterEvent>) -> Vec<MasterEvent> {
    let mut events = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        events.push(ev);
    }
    events
}

#[tokio::test]
async fn test_single_file_masters_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_input(dir.path(), "voice.mp3");
    let engine = Arc::new(ScriptedEngine::healthy());
    let (orch, events) = orchestrator(engine.clone());
    let mut rx = events.subscribe();

    let summary = orch
        .process_batch(&[input.clone()], &UserIntent::default(), &CancellationToken::new())
        .await;

    assert_eq!(summary.outcome, BatchOutcome::Completed);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 0);

    // 192 kbit/s mp3 input stays mp3
    let output = dir.path().join("voice_mastered.mp3");
    assert!(output.exists());
    // intermediate is removed after the run
    assert!(!dir.path().join(".voice.mp3.mastering.wav").exists());

    let collected = drain(&mut rx);
    assert_eq!(collected.first().unwrap().event_type(), "BatchStarted");
    assert!(collected.iter().any(|e| e.event_type() == "FileCompleted"));
    assert_eq!(collected.last().unwrap().event_type(), "BatchCompleted");

    // the quality report carries the advisory energy tag (-3 dBFS peak)
    let energy = collected
        .iter()
        .find_map(|e| match e {
            MasterEvent::QualityReport { energy_profile, .. } => Some(*energy_profile),
            _ => None,
        })
        .expect("QualityReport event");
    assert_eq!(energy, EnergyProfile::Loud);
}

#[tokio::test]
async fn test_stage_sequence_is_monotonic() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_input(dir.path(), "voice.mp3");
    let engine = Arc::new(ScriptedEngine::healthy());
    let (orch, events) = orchestrator(engine);
    let mut rx = events.subscribe();

    orch.process_batch(&[input], &UserIntent::default(), &CancellationToken::new())
        .await;

    let stages: Vec<RunStage> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            MasterEvent::StageChanged { stage, .. } => Some(stage),
            _ => None,
        })
        .collect();

    assert_eq!(
        stages,
        vec![
            RunStage::Analyzing,
            RunStage::Deciding,
            RunStage::Assembling,
            RunStage::Preprocessing,
            RunStage::ValidatingIntermediate,
            RunStage::Encoding,
            RunStage::ValidatingOutput,
            RunStage::Done,
        ]
    );
}

#[tokio::test]
async fn test_filter_graph_argument_is_whitespace_free() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_input(dir.path(), "voice.mp3");
    let engine = Arc::new(ScriptedEngine::healthy());
    let (orch, _events) = orchestrator(engine.clone());

    orch.process_batch(&[input], &UserIntent::default(), &CancellationToken::new())
        .await;

    let calls = engine.recorded_calls();
    let preprocess = calls
        .iter()
        .find(|c| c.iter().any(|a| a == "-filter_complex"))
        .expect("preprocess invocation");

    let pos = preprocess.iter().position(|a| a == "-filter_complex").unwrap();
    let graph = &preprocess[pos + 1];
    assert!(!graph.chars().any(char::is_whitespace));
    assert!(graph.starts_with("[0:a]"));
    assert!(graph.ends_with("[out]"));
    // terminal pin is mapped into the output
    let map_pos = preprocess.iter().position(|a| a == "-map").unwrap();
    assert_eq!(preprocess[map_pos + 1], "[out]");
}

#[tokio::test]
async fn test_quiet_input_raises_target_capped() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_input(dir.path(), "voice.mp3");
    let mut engine = ScriptedEngine::healthy();
    engine.measured_lufs = -30.0;
    let engine = Arc::new(engine);
    let (orch, _events) = orchestrator(engine.clone());

    orch.process_batch(&[input], &UserIntent::default(), &CancellationToken::new())
        .await;

    let calls = engine.recorded_calls();
    let preprocess = calls
        .iter()
        .find(|c| c.iter().any(|a| a == "-filter_complex"))
        .unwrap();
    let pos = preprocess.iter().position(|a| a == "-filter_complex").unwrap();
    // -30 LUFS input: boosted by at most 8 dB, so the target becomes -22
    assert!(preprocess[pos + 1].contains("loudnorm=I=-22:"));
    assert!(preprocess[pos + 1].contains("measured_I=-30"));
}

#[tokio::test]
async fn test_missing_input_fails_and_batch_continues() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("ghost.mp3");
    let present = make_input(dir.path(), "voice.mp3");
    let engine = Arc::new(ScriptedEngine::healthy());
    let (orch, events) = orchestrator(engine);
    let mut rx = events.subscribe();

    let summary = orch
        .process_batch(
            &[missing, present],
            &UserIntent::default(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.outcome, BatchOutcome::Completed);

    let failures: Vec<RunStage> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            MasterEvent::FileFailed { stage, .. } => Some(stage),
            _ => None,
        })
        .collect();
    assert_eq!(failures, vec![RunStage::Analyzing]);
}

#[tokio::test]
async fn test_undersized_intermediate_attributed_to_preprocessing() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_input(dir.path(), "voice.mp3");
    let mut engine = ScriptedEngine::healthy();
    engine.intermediate_bytes = 12; // below the 1024-byte floor
    let engine = Arc::new(engine);
    let (orch, events) = orchestrator(engine);
    let mut rx = events.subscribe();

    let summary = orch
        .process_batch(&[input], &UserIntent::default(), &CancellationToken::new())
        .await;

    assert_eq!(summary.failed, 1);
    let failed = drain(&mut rx)
        .into_iter()
        .find_map(|e| match e {
            MasterEvent::FileFailed { stage, message, .. } => Some((stage, message)),
            _ => None,
        })
        .expect("FileFailed event");
    assert_eq!(failed.0, RunStage::Preprocessing);
    assert!(failed.1.contains("floor 1024"));

    // failed run still cleans up its intermediate
    assert!(!dir.path().join(".voice.mp3.mastering.wav").exists());
}

#[tokio::test]
async fn test_engine_failure_diagnostic_is_capped() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_input(dir.path(), "voice.mp3");
    let mut engine = ScriptedEngine::healthy();
    engine.fail_preprocess = Some(format!("Error demuxing\n{}", "y".repeat(1000)));
    let engine = Arc::new(engine);
    let (orch, events) = orchestrator(engine);
    let mut rx = events.subscribe();

    orch.process_batch(&[input], &UserIntent::default(), &CancellationToken::new())
        .await;

    let message = drain(&mut rx)
        .into_iter()
        .find_map(|e| match e {
            MasterEvent::FileFailed { stage, message, .. } => {
                assert_eq!(stage, RunStage::Preprocessing);
                Some(message)
            }
            _ => None,
        })
        .unwrap();
    assert!(message.chars().count() <= 200);
    assert!(!message.contains('\n'));
}

#[tokio::test]
async fn test_cancellation_between_files() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = vec![
        make_input(dir.path(), "one.mp3"),
        make_input(dir.path(), "two.mp3"),
        make_input(dir.path(), "three.mp3"),
    ];
    let cancel = CancellationToken::new();
    let mut engine = ScriptedEngine::healthy();
    engine.cancel_on_encode = Some(cancel.clone());
    let engine = Arc::new(engine);
    let (orch, events) = orchestrator(engine);
    let mut rx = events.subscribe();

    let summary = orch
        .process_batch(&inputs, &UserIntent::default(), &cancel)
        .await;

    // the in-flight file finishes; the rest are never started
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.outcome, BatchOutcome::Cancelled);

    let started = drain(&mut rx)
        .iter()
        .filter(|e| e.event_type() == "FileStarted")
        .count();
    assert_eq!(started, 1);
    assert!(dir.path().join("one_mastered.mp3").exists());
    assert!(!dir.path().join("two_mastered.mp3").exists());
}

#[tokio::test]
async fn test_duplicate_inputs_dropped_at_enqueue() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_input(dir.path(), "voice.mp3");
    let engine = Arc::new(ScriptedEngine::healthy());
    let (orch, events) = orchestrator(engine);
    let mut rx = events.subscribe();

    let summary = orch
        .process_batch(
            &[input.clone(), input.clone()],
            &UserIntent::default(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(summary.processed, 1);
    let total = drain(&mut rx)
        .into_iter()
        .find_map(|e| match e {
            MasterEvent::BatchStarted { total_files, .. } => Some(total_files),
            _ => None,
        })
        .unwrap();
    assert_eq!(total, 1);
}

#[tokio::test]
async fn test_degraded_analysis_still_masters() {
    // engine whose measurement passes fail: every feature falls back to its
    // default and the file still processes
    struct DeafEngine {
        inner: ScriptedEngine,
    }

    #[async_trait::async_trait]
    impl AudioEngine for DeafEngine {
        async fn run(&self, args: &[String], timeout: Duration) -> EngineOutput {
            if args.iter().any(|a| a == "-af") {
                return EngineOutput {
                    success: false,
                    stderr: "timed out after 5s".to_string(),
                };
            }
            self.inner.run(args, timeout).await
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let input = make_input(dir.path(), "voice.mp3");
    let engine = Arc::new(DeafEngine {
        inner: ScriptedEngine::healthy(),
    });
    let events = EventBus::new(1024);
    let orch = MasteringOrchestrator::new(
        engine,
        events.clone(),
        MasteringPolicy::default(),
        Duration::from_secs(5),
        Duration::from_secs(5),
    );

    let summary = orch
        .process_batch(&[input], &UserIntent::default(), &CancellationToken::new())
        .await;

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 0);
}
