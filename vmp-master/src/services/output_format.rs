//! Output container/codec selection for the encode pass

use crate::types::FeatureSet;
use std::path::{Path, PathBuf};

const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "mov", "mkv", "avi"];

/// How the encode pass treats the input container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Encode the mastered intermediate into an audio file
    AudioOnly,
    /// Copy the video stream from the original input and mux the mastered
    /// audio next to it
    VideoRemux,
}

#[derive(Debug, Clone)]
pub struct OutputFormat {
    pub kind: OutputKind,
    pub extension: &'static str,
    /// Audio codec arguments for the encode invocation
    pub codec_args: Vec<String>,
}

/// Pick the output format from the input's quality and container.
///
/// Lossless or high-bitrate sources keep a lossless output; video containers
/// are remuxed with their video stream untouched; otherwise the source family
/// (aac vs mp3) is kept at a fixed mastering bitrate.
pub fn select(features: &FeatureSet, input: &Path) -> OutputFormat {
    let ext = input
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        return OutputFormat {
            kind: OutputKind::VideoRemux,
            extension: "mp4",
            codec_args: args(&[
                "-c:a", "aac", "-b:a", "192k", "-profile:a", "aac_low",
            ]),
        };
    }

    if features.is_lossless || features.bitrate_kbps >= 320 {
        return OutputFormat {
            kind: OutputKind::AudioOnly,
            extension: "flac",
            codec_args: args(&["-c:a", "flac", "-compression_level", "6"]),
        };
    }

    if ext == "m4a" || ext == "aac" {
        return OutputFormat {
            kind: OutputKind::AudioOnly,
            extension: "m4a",
            codec_args: args(&[
                "-c:a", "aac", "-b:a", "192k", "-profile:a", "aac_low",
            ]),
        };
    }

    OutputFormat {
        kind: OutputKind::AudioOnly,
        extension: "mp3",
        codec_args: args(&[
            "-c:a", "libmp3lame", "-b:a", "192k", "-q:a", "2", "-write_xing", "0",
        ]),
    }
}

/// Output path next to the input: `<stem>_mastered.<ext>`.
pub fn output_path(input: &Path, format: &OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    input.with_file_name(format!("{}_mastered.{}", stem, format.extension))
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
