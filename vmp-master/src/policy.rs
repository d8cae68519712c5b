//! Mastering policy: the numeric contract the decision engine works against
//!
//! Every threshold the pipeline branches on lives here so that configuration
//! can override it without touching decision code. Defaults reproduce the
//! broadcast-voice house curve.

use serde::{Deserialize, Serialize};

/// Tunable thresholds and targets for the decision engine and validators.
///
/// Loaded from the `[policy]` section of the config file; any field may be
/// omitted and falls back to its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasteringPolicy {
    /// Integrated loudness target (LUFS)
    pub target_lufs: f64,
    /// Loudness range target (LU)
    pub target_lra: f64,
    /// True-peak ceiling (dBTP)
    pub true_peak_db: f64,

    /// Intermediate/output sample rate (Hz)
    pub sample_rate_hz: u32,
    /// Output channel count
    pub channels: u8,

    /// Input this far below target triggers quiet-input protection (dB)
    pub quiet_input_gap_db: f64,
    /// Maximum single-pass loudness boost under quiet-input protection (dB)
    pub max_quiet_boost_db: f64,

    /// Noise floor above this is treated as noisy; suppression stays at full
    /// preset strength (dBFS)
    pub noise_floor_noisy_dbfs: f64,
    /// Noise floor below this is treated as clean; suppression is relaxed the
    /// most (dBFS)
    pub noise_floor_clean_dbfs: f64,

    /// Dynamic range above this selects the middle compression ratio (dB)
    pub dynamic_range_mid_db: f64,
    /// Dynamic range above this selects the strongest compression ratio (dB)
    pub dynamic_range_high_db: f64,

    /// Transient ratio above this selects fast compressor timing
    pub transient_ratio_threshold: f64,

    /// High-frequency band energy above this selects the stronger de-esser
    /// setting (dBFS)
    pub deesser_hf_threshold_dbfs: f64,

    /// Minimum plausible intermediate artifact size (bytes)
    pub intermediate_size_floor: u64,
    /// Minimum plausible output artifact size (bytes)
    pub output_size_floor: u64,
}

impl Default for MasteringPolicy {
    fn default() -> Self {
        Self {
            target_lufs: -16.0,
            target_lra: 8.0,
            true_peak_db: -1.0,
            sample_rate_hz: 44100,
            channels: 2,
            quiet_input_gap_db: 10.0,
            max_quiet_boost_db: 8.0,
            noise_floor_noisy_dbfs: -45.0,
            noise_floor_clean_dbfs: -55.0,
            dynamic_range_mid_db: 15.0,
            dynamic_range_high_db: 20.0,
            transient_ratio_threshold: 0.4,
            deesser_hf_threshold_dbfs: -15.0,
            intermediate_size_floor: 1024,
            output_size_floor: 8192,
        }
    }
}

impl MasteringPolicy {
    /// Effective loudness target for a given measured input loudness.
    ///
    /// A very quiet input is never boosted all the way to the configured
    /// target in one pass; the target is pulled down so the boost stays
    /// within `max_quiet_boost_db`.
    pub fn effective_target_lufs(&self, input_lufs: f64) -> f64 {
        if input_lufs < self.target_lufs - self.quiet_input_gap_db {
            (input_lufs + self.max_quiet_boost_db).min(self.target_lufs)
        } else {
            self.target_lufs
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_input_keeps_configured_target() {
        let p = MasteringPolicy::default();
        assert_eq!(p.effective_target_lufs(-20.0), -16.0);
    }

    #[test]
    fn test_quiet_input_target_is_capped() {
        let p = MasteringPolicy::default();
        // 14 dB below target: boost limited to 8 dB
        assert_eq!(p.effective_target_lufs(-30.0), -22.0);
    }

    #[test]
    fn test_boundary_gap_does_not_trigger_protection() {
        let p = MasteringPolicy::default();
        // exactly 10 dB below: strict less-than, no protection
        assert_eq!(p.effective_target_lufs(-26.0), -16.0);
    }

    #[test]
    fn test_toml_partial_override() {
        let p: MasteringPolicy = toml::from_str("target_lufs = -14.0\n").unwrap();
        assert_eq!(p.target_lufs, -14.0);
        assert_eq!(p.target_lra, 8.0);
        assert_eq!(p.output_size_floor, 8192);
    }
}
