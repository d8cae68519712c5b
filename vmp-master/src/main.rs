//! vmp-master: batch voice/music mastering CLI

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vmp_common::events::{BatchOutcome, EventBus, MasterEvent};
use vmp_master::config::MasterConfig;
use vmp_master::services::engine::FfmpegEngine;
use vmp_master::services::orchestrator::MasteringOrchestrator;
use vmp_master::types::{NoiseTier, ScenePreset, StereoFieldPreset, UserIntent};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PresetArg {
    General,
    News,
    Documentary,
    Advertisement,
    Narration,
}

impl From<PresetArg> for ScenePreset {
    fn from(value: PresetArg) -> Self {
        match value {
            PresetArg::General => ScenePreset::General,
            PresetArg::News => ScenePreset::News,
            PresetArg::Documentary => ScenePreset::Documentary,
            PresetArg::Advertisement => ScenePreset::Advertisement,
            PresetArg::Narration => ScenePreset::Narration,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum NoiseArg {
    Low,
    Medium,
    High,
}

impl From<NoiseArg> for NoiseTier {
    fn from(value: NoiseArg) -> Self {
        match value {
            NoiseArg::Low => NoiseTier::Low,
            NoiseArg::Medium => NoiseTier::Medium,
            NoiseArg::High => NoiseTier::High,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StereoArg {
    Original,
    MildWiden,
    Broadcast,
}

impl From<StereoArg> for StereoFieldPreset {
    fn from(value: StereoArg) -> Self {
        match value {
            StereoArg::Original => StereoFieldPreset::Original,
            StereoArg::MildWiden => StereoFieldPreset::MildWiden,
            StereoArg::Broadcast => StereoFieldPreset::Broadcast,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "vmp-master", version, about = "Batch voice/music mastering pipeline")]
struct Cli {
    /// Input audio/video files, processed in order
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Scene preset selecting the base EQ curve
    #[arg(long, value_enum, default_value_t = PresetArg::General)]
    preset: PresetArg,

    /// Upper-mid clarity, 1-5
    #[arg(long, default_value_t = 3)]
    clarity: u8,

    /// Low-mid warmth, 1-5
    #[arg(long, default_value_t = 3)]
    warmth: u8,

    /// Presence-band emphasis, 1-5
    #[arg(long, default_value_t = 3)]
    voice_presence: u8,

    /// Room ambience, 0 (off) to 5
    #[arg(long, default_value_t = 2)]
    reverb: u8,

    /// Noise suppression strength tier
    #[arg(long, value_enum, default_value_t = NoiseArg::Medium)]
    noise: NoiseArg,

    /// Disable sibilance reduction
    #[arg(long)]
    no_de_esser: bool,

    /// Disable equalization
    #[arg(long)]
    no_eq: bool,

    /// Disable multi-band compression
    #[arg(long)]
    no_compression: bool,

    /// Carve out the vocal band (background-music material)
    #[arg(long)]
    avoid_vocal_band: bool,

    /// Stereo field treatment
    #[arg(long, value_enum, default_value_t = StereoArg::MildWiden)]
    stereo: StereoArg,

    /// Configuration file (falls back to $VMP_CONFIG, then ./vmp-master.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    /// Sliders are clamped here; the decision engine assumes valid ranges.
    fn intent(&self) -> UserIntent {
        UserIntent {
            preset: self.preset.into(),
            clarity: self.clarity.clamp(1, 5),
            warmth: self.warmth.clamp(1, 5),
            voice_presence: self.voice_presence.clamp(1, 5),
            reverb: self.reverb.min(5),
            noise_tier: self.noise.into(),
            de_esser: !self.no_de_esser,
            eq: !self.no_eq,
            compression: !self.no_compression,
            avoid_vocal_band: self.avoid_vocal_band,
            stereo_field: self.stereo.into(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = MasterConfig::load(cli.config.as_deref())?;

    let engine = FfmpegEngine::locate(config.engine.binary.as_deref())?;
    info!(binary = %engine.binary().display(), "audio engine ready");

    let events = EventBus::new(256);
    let mut rx = events.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            render(&event);
        }
    });

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("cancellation requested; finishing current file");
                cancel.cancel();
            }
        });
    }

    let orchestrator = MasteringOrchestrator::new(
        Arc::new(engine),
        events.clone(),
        config.policy.clone(),
        Duration::from_secs(config.engine.analysis_timeout_secs),
        Duration::from_secs(config.engine.process_timeout_secs),
    );

    let summary = orchestrator
        .process_batch(&cli.inputs, &cli.intent(), &cancel)
        .await;
    printer.abort();

    if summary.outcome == BatchOutcome::Cancelled || summary.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn render(event: &MasterEvent) {
    match event {
        MasterEvent::BatchStarted { total_files, .. } => {
            println!("processing {} file(s)", total_files);
        }
        MasterEvent::FileStarted {
            input_path,
            file_index,
            total_files,
            ..
        } => {
            println!("[{}/{}] {}", file_index + 1, total_files, input_path);
        }
        MasterEvent::StageChanged { stage, .. } => {
            println!("  {}", stage);
        }
        MasterEvent::QualityReport {
            score,
            integrated_loudness_lufs,
            noise_floor_dbfs,
            energy_profile,
            ..
        } => {
            println!(
                "  quality {:.0}/100 (loudness {:.1} LUFS, noise floor {:.1} dBFS, {})",
                score, integrated_loudness_lufs, noise_floor_dbfs, energy_profile
            );
        }
        MasterEvent::FileCompleted { output_path, .. } => {
            println!("  -> {}", output_path);
        }
        MasterEvent::FileFailed { stage, message, .. } => {
            println!("  FAILED during {}: {}", stage, message);
        }
        MasterEvent::BatchCompleted {
            outcome,
            processed,
            failed,
            ..
        } => {
            let label = match outcome {
                BatchOutcome::Completed => "completed",
                BatchOutcome::Cancelled => "cancelled",
            };
            println!("batch {}: {} mastered, {} failed", label, processed, failed);
        }
        MasterEvent::FileProgress { .. } | MasterEvent::LogLine { .. } => {}
    }
}
