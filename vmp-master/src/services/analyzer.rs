//! Feature extraction: five read-only engine passes over the input
//!
//! Pass order: stream probe, loudness measurement, full-band volume stats,
//! high-band volume stats, per-frame peak-factor stats. Each pass parses the
//! engine's diagnostic stream with marker-line scanning; an absent marker or a
//! failed pass degrades the affected fields to their defaults instead of
//! failing the run.

use crate::error::{MasterError, Result};
use crate::services::engine::AudioEngine;
use crate::types::{EnergyProfile, FeatureSet};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Peak factor above this counts an analysis frame as a transient.
const TRANSIENT_PEAK_FACTOR: f64 = 6.0;

/// Lossless container/codec markers checked against the probe output and the
/// file extension.
const LOSSLESS_EXTENSIONS: [&str; 4] = ["flac", "wav", "aiff", "alac"];

pub struct FeatureExtractor {
    timeout: Duration,
}

impl FeatureExtractor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run all measurement passes and assemble a `FeatureSet`.
    ///
    /// Only a missing input file is an error; engine failures and unparsable
    /// output degrade to defaults.
    pub async fn extract(&self, engine: &dyn AudioEngine, input: &Path) -> Result<FeatureSet> {
        if !input.exists() {
            return Err(MasterError::InputMissing(input.to_path_buf()));
        }

        let mut features = FeatureSet::default();
        let input_arg = input.display().to_string();

        // Pass 1: stream probe. The engine exits non-zero when no output is
        // requested, so the exit status is ignored and only the diagnostic
        // text matters.
        let probe = engine
            .run(
                &["-i".to_string(), input_arg.clone(), "-hide_banner".to_string()],
                self.timeout,
            )
            .await;
        parse_probe(&probe.stderr, &mut features);
        if let Some(ext) = input.extension().and_then(|e| e.to_str()) {
            let ext = ext.to_ascii_lowercase();
            if LOSSLESS_EXTENSIONS.contains(&ext.as_str()) {
                features.is_lossless = true;
            }
        }

        // Pass 2: integrated loudness + loudness range.
        let loudnorm = self
            .measure(
                engine,
                &input_arg,
                "loudnorm=I=-16:LRA=8:TP=-1.0:print_format=summary",
            )
            .await;
        if let Some(stderr) = loudnorm {
            if let Some(lufs) = parse_marker_value(&stderr, "Input Integrated Loudness") {
                features.integrated_loudness_lufs = lufs;
            }
            if let Some(lra) = parse_marker_value(&stderr, "Input Loudness Range") {
                features.loudness_range_lu = lra;
            }
        }

        // Pass 3: full-band volume statistics.
        if let Some(stderr) = self.measure(engine, &input_arg, "volumedetect").await {
            if let Some(v) = parse_marker_value(&stderr, "max_volume") {
                features.max_volume_dbfs = v;
            }
            if let Some(v) = parse_marker_value(&stderr, "min_volume") {
                features.min_volume_dbfs = v;
            }
            if let Some(v) = parse_marker_value(&stderr, "mean_volume") {
                features.mean_volume_dbfs = v;
            }
        }

        // Pass 4: peak level of the sibilance band around 5 kHz.
        if let Some(stderr) = self
            .measure(engine, &input_arg, "bandpass=f=5000:w=2,volumedetect")
            .await
        {
            if let Some(v) = parse_marker_value(&stderr, "max_volume") {
                features.high_freq_energy_dbfs = v;
            }
        }

        // Pass 5: per-frame peak factor, for the transient ratio.
        if let Some(stderr) = self
            .measure(
                engine,
                &input_arg,
                "astats=metadata=1:reset=1,ametadata=print:key=lavfi.astats.Overall.PeakFactor:file=-",
            )
            .await
        {
            if let Some(ratio) = parse_transient_ratio(&stderr) {
                features.transient_ratio = ratio;
            }
        }

        features.noise_floor_dbfs = features.min_volume_dbfs;
        features.dynamic_range_db = (features.max_volume_dbfs - features.min_volume_dbfs).abs();
        features.energy_profile = classify_energy(features.max_volume_dbfs);

        debug!(
            input = %input.display(),
            loudness = features.integrated_loudness_lufs,
            noise_floor = features.noise_floor_dbfs,
            dynamic_range = features.dynamic_range_db,
            transient_ratio = features.transient_ratio,
            "analysis complete"
        );

        Ok(features)
    }

    /// Run one measurement filter pass, returning its diagnostic text.
    ///
    /// `None` means the pass failed or timed out; the caller keeps defaults.
    async fn measure(
        &self,
        engine: &dyn AudioEngine,
        input_arg: &str,
        filter: &str,
    ) -> Option<String> {
        let args = vec![
            "-i".to_string(),
            input_arg.to_string(),
            "-af".to_string(),
            filter.to_string(),
            "-vn".to_string(),
            "-f".to_string(),
            "null".to_string(),
            "-".to_string(),
            "-hide_banner".to_string(),
        ];
        let out = engine.run(&args, self.timeout).await;
        if out.success {
            Some(out.stderr)
        } else {
            warn!(filter = filter, "measurement pass failed; using defaults");
            None
        }
    }
}

/// Classify input energy from the peak level.
fn classify_energy(max_volume_dbfs: f64) -> EnergyProfile {
    if max_volume_dbfs > -6.0 {
        EnergyProfile::Loud
    } else if max_volume_dbfs < -12.0 {
        EnergyProfile::Quiet
    } else {
        EnergyProfile::Balanced
    }
}

/// Parse stream metadata out of the probe's diagnostic text.
pub(crate) fn parse_probe(stderr: &str, features: &mut FeatureSet) {
    for line in stderr.lines() {
        if let Some(rest) = line.split("Duration:").nth(1) {
            if let Some(stamp) = rest.split(',').next() {
                if let Some(secs) = parse_duration(stamp.trim()) {
                    features.duration_secs = secs;
                }
            }
            // overall bitrate on the same line; the audio stream line wins
            // when present
            if let Some(kbps) = parse_token_before(rest, "kb/s") {
                features.bitrate_kbps = kbps as u32;
            }
        }

        if line.contains("Audio:") {
            if line.contains("flac") || line.contains("pcm") || line.contains("alac") {
                features.is_lossless = true;
            }
            if let Some(kbps) = parse_token_before(line, "kb/s") {
                features.bitrate_kbps = kbps as u32;
            }
            if let Some(hz) = parse_token_before(line, "Hz") {
                features.sample_rate_hz = hz as u32;
            }
            if line.contains("mono") {
                features.channels = 1;
            } else if line.contains("stereo") {
                features.channels = 2;
            }
        }
    }
}

/// Parse `HH:MM:SS.cc` into seconds.
fn parse_duration(stamp: &str) -> Option<f64> {
    let mut parts = stamp.split(':');
    let hours: f64 = parts.next()?.trim().parse().ok()?;
    let minutes: f64 = parts.next()?.trim().parse().ok()?;
    let seconds: f64 = parts.next()?.trim().parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Find the numeric token immediately preceding `unit` in a line fragment.
fn parse_token_before(fragment: &str, unit: &str) -> Option<f64> {
    let tokens: Vec<&str> = fragment.split_whitespace().collect();
    let pos = tokens.iter().position(|t| t.starts_with(unit))?;
    if pos == 0 {
        return None;
    }
    tokens[pos - 1].parse().ok()
}

/// Scan for a marker line (`<marker>...: <value> <unit>`) and parse the value.
pub(crate) fn parse_marker_value(stderr: &str, marker: &str) -> Option<f64> {
    for line in stderr.lines() {
        if !line.contains(marker) {
            continue;
        }
        let after = line.rsplit(':').next()?;
        let token = after.split_whitespace().next()?;
        if let Ok(v) = token.parse::<f64>() {
            return Some(v);
        }
    }
    None
}

/// Fraction of peak-factor frames above the transient threshold.
///
/// `None` when no peak-factor lines are present, so the default ratio is kept
/// rather than reporting a misleading 0.0.
pub(crate) fn parse_transient_ratio(stderr: &str) -> Option<f64> {
    let mut frames = 0usize;
    let mut transients = 0usize;
    for line in stderr.lines() {
        if !line.contains("PeakFactor") {
            continue;
        }
        let Some(value) = line.rsplit('=').next() else {
            continue;
        };
        let Ok(factor) = value.trim().parse::<f64>() else {
            continue;
        };
        frames += 1;
        if factor > TRANSIENT_PEAK_FACTOR {
            transients += 1;
        }
    }
    if frames == 0 {
        None
    } else {
        Some(transients as f64 / frames as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE_FIXTURE: &str = "\
Input #0, mp3, from 'voice.mp3':
  Duration: 00:03:25.43, start: 0.025057, bitrate: 320 kb/s
  Stream #0:0: Audio: mp3, 44100 Hz, stereo, fltp, 320 kb/s
";

    const PROBE_FLAC_FIXTURE: &str = "\
Input #0, flac, from 'voice.flac':
  Duration: 00:01:02.50, start: 0.000000, bitrate: 1024 kb/s
  Stream #0:0: Audio: flac, 48000 Hz, mono, s16
";

    const LOUDNORM_FIXTURE: &str = "\
[Parsed_loudnorm_0 @ 0x55d]
Input Integrated Loudness:   -23.1 LUFS
Input True Peak:              -4.8 dBTP
Input Loudness Range:         12.5 LU
Input Threshold:             -33.5 LUFS
";

    const VOLUMEDETECT_FIXTURE: &str = "\
[Parsed_volumedetect_0 @ 0x55d] n_samples: 9072640
[Parsed_volumedetect_0 @ 0x55d] mean_volume: -18.3 dB
[Parsed_volumedetect_0 @ 0x55d] max_volume: -2.1 dB
[Parsed_volumedetect_0 @ 0x55d] min_volume: -58.7 dB
";

    const ASTATS_FIXTURE: &str = "\
frame:0    pts:0       pts_time:0
lavfi.astats.Overall.PeakFactor=5.200000
frame:1    pts:1024    pts_time:0.0232
lavfi.astats.Overall.PeakFactor=7.100000
frame:2    pts:2048    pts_time:0.0464
lavfi.astats.Overall.PeakFactor=6.000000
frame:3    pts:3072    pts_time:0.0696
lavfi.astats.Overall.PeakFactor=8.400000
";

    #[test]
    fn test_parse_probe_stereo_mp3() {
        let mut f = FeatureSet::default();
        parse_probe(PROBE_FIXTURE, &mut f);
        assert!((f.duration_secs - 205.43).abs() < 1e-6);
        assert_eq!(f.bitrate_kbps, 320);
        assert_eq!(f.sample_rate_hz, 44100);
        assert_eq!(f.channels, 2);
        assert!(!f.is_lossless);
    }

    #[test]
    fn test_parse_probe_mono_flac() {
        let mut f = FeatureSet::default();
        parse_probe(PROBE_FLAC_FIXTURE, &mut f);
        assert!(f.is_lossless);
        assert_eq!(f.sample_rate_hz, 48000);
        assert_eq!(f.channels, 1);
        assert!((f.duration_secs - 62.5).abs() < 1e-6);
    }

    #[test]
    fn test_parse_loudnorm_summary() {
        assert_eq!(
            parse_marker_value(LOUDNORM_FIXTURE, "Input Integrated Loudness"),
            Some(-23.1)
        );
        assert_eq!(
            parse_marker_value(LOUDNORM_FIXTURE, "Input Loudness Range"),
            Some(12.5)
        );
    }

    #[test]
    fn test_parse_volume_markers() {
        assert_eq!(parse_marker_value(VOLUMEDETECT_FIXTURE, "max_volume"), Some(-2.1));
        assert_eq!(parse_marker_value(VOLUMEDETECT_FIXTURE, "min_volume"), Some(-58.7));
        assert_eq!(parse_marker_value(VOLUMEDETECT_FIXTURE, "mean_volume"), Some(-18.3));
    }

    #[test]
    fn test_missing_marker_yields_none() {
        assert_eq!(parse_marker_value("no measurements here", "max_volume"), None);
    }

    #[test]
    fn test_transient_ratio() {
        // 2 of 4 frames above 6.0 (6.0 itself is not a transient)
        assert_eq!(parse_transient_ratio(ASTATS_FIXTURE), Some(0.5));
    }

    #[test]
    fn test_transient_ratio_empty_keeps_default() {
        assert_eq!(parse_transient_ratio("frame:0 pts:0"), None);
    }

    #[test]
    fn test_energy_classification() {
        assert_eq!(classify_energy(-3.0), EnergyProfile::Loud);
        assert_eq!(classify_energy(-20.0), EnergyProfile::Quiet);
        assert_eq!(classify_energy(-9.0), EnergyProfile::Balanced);
        // boundaries fall to Balanced
        assert_eq!(classify_energy(-6.0), EnergyProfile::Balanced);
        assert_eq!(classify_energy(-12.0), EnergyProfile::Balanced);
    }

    #[test]
    fn test_garbage_lines_are_ignored() {
        let mut f = FeatureSet::default();
        parse_probe("Duration: garbage, bitrate: ? kb/s\nAudio: ???", &mut f);
        assert_eq!(f.bitrate_kbps, 192);
        assert_eq!(f.duration_secs, 0.0);
    }
}
