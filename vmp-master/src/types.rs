//! Core data model: measured features, user intent, and derived stage parameters

use serde::{Deserialize, Serialize};

/// Scene preset selecting a base equalizer curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenePreset {
    General,
    News,
    Documentary,
    Advertisement,
    Narration,
}

impl Default for ScenePreset {
    fn default() -> Self {
        ScenePreset::General
    }
}

/// Noise suppression strength tier selected by the user.
///
/// The measured noise floor then relaxes the tier's base strength; it never
/// escalates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseTier {
    Low,
    Medium,
    High,
}

impl Default for NoiseTier {
    fn default() -> Self {
        NoiseTier::Medium
    }
}

/// Stereo field treatment for the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StereoFieldPreset {
    /// Pass channels through unchanged
    Original,
    /// Mild cross-feed widening
    MildWiden,
    /// Stronger cross-feed plus a 1 ms left-channel delay
    Broadcast,
}

impl Default for StereoFieldPreset {
    fn default() -> Self {
        StereoFieldPreset::MildWiden
    }
}

pub use vmp_common::events::EnergyProfile;

/// Measurements extracted from the input by the analysis passes.
///
/// Every field has a safe default; a failed or timed-out measurement pass
/// degrades to the default instead of failing the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    /// Audio stream bitrate (kbit/s)
    pub bitrate_kbps: u32,
    /// Sample rate (Hz)
    pub sample_rate_hz: u32,
    /// Channel count
    pub channels: u8,
    /// Duration (seconds)
    pub duration_secs: f64,
    /// Input uses a lossless codec/container
    pub is_lossless: bool,

    /// Integrated loudness (LUFS)
    pub integrated_loudness_lufs: f64,
    /// Loudness range (LU)
    pub loudness_range_lu: f64,

    /// Peak level (dBFS)
    pub max_volume_dbfs: f64,
    /// Minimum level, used as the noise floor estimate (dBFS)
    pub min_volume_dbfs: f64,
    /// Mean level (dBFS)
    pub mean_volume_dbfs: f64,

    /// Spread between peak and floor (dB)
    pub dynamic_range_db: f64,
    /// Noise floor estimate (dBFS)
    pub noise_floor_dbfs: f64,

    /// Peak level of the band around 5 kHz (dBFS), sibilance proxy
    pub high_freq_energy_dbfs: f64,
    /// Fraction of analysis frames with peak factor above the transient
    /// threshold (0.0-1.0)
    pub transient_ratio: f64,

    /// Coarse loud/quiet/balanced classification (advisory)
    pub energy_profile: EnergyProfile,
}

impl Default for FeatureSet {
    fn default() -> Self {
        Self {
            bitrate_kbps: 192,
            sample_rate_hz: 44100,
            channels: 2,
            duration_secs: 0.0,
            is_lossless: false,
            integrated_loudness_lufs: -20.0,
            loudness_range_lu: 8.0,
            max_volume_dbfs: -10.0,
            min_volume_dbfs: -60.0,
            mean_volume_dbfs: -20.0,
            dynamic_range_db: 12.0,
            noise_floor_dbfs: -60.0,
            high_freq_energy_dbfs: -20.0,
            transient_ratio: 0.3,
            energy_profile: EnergyProfile::Balanced,
        }
    }
}

/// Per-batch user choices. Sliders are already clamped to 1-5 by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserIntent {
    pub preset: ScenePreset,
    /// Upper-mid clarity emphasis, 1-5 (3 = neutral)
    pub clarity: u8,
    /// Low-mid warmth emphasis, 1-5 (3 = neutral)
    pub warmth: u8,
    /// Presence-band emphasis, 1-5 (3 = neutral)
    pub voice_presence: u8,
    /// Room ambience amount, 0 disables reverb, 1-5 selects a room size
    pub reverb: u8,
    pub noise_tier: NoiseTier,
    pub de_esser: bool,
    pub eq: bool,
    pub compression: bool,
    /// Carve out the vocal band for background-music material
    pub avoid_vocal_band: bool,
    pub stereo_field: StereoFieldPreset,
}

impl Default for UserIntent {
    fn default() -> Self {
        Self {
            preset: ScenePreset::default(),
            clarity: 3,
            warmth: 3,
            voice_presence: 3,
            reverb: 2,
            noise_tier: NoiseTier::default(),
            de_esser: true,
            eq: true,
            compression: true,
            avoid_vocal_band: false,
            stereo_field: StereoFieldPreset::default(),
        }
    }
}

/// One parametric equalizer band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqBand {
    pub frequency_hz: f64,
    pub gain_db: f64,
    pub width: f64,
}

impl EqBand {
    pub fn new(frequency_hz: f64, gain_db: f64, width: f64) -> Self {
        Self {
            frequency_hz,
            gain_db,
            width,
        }
    }
}

/// Noise suppression settings: spectral denoise strength plus a rumble filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseSuppression {
    /// Denoiser noise-floor parameter (dB, more negative = stronger)
    pub strength_db: f64,
    /// Rumble high-pass corner (Hz)
    pub highpass_hz: u32,
}

/// One band of the multi-band compressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressorBand {
    pub threshold_db: f64,
    pub ratio: f64,
    pub attack_ms: f64,
    pub release_ms: f64,
    pub knee_db: f64,
    pub makeup_db: f64,
    /// Post-compression level applied before the recombining mix
    pub mix_weight: f64,
}

/// Three-band compression split at fixed crossover points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultibandCompression {
    /// Low/mid crossover (Hz)
    pub crossover_low_hz: f64,
    /// Mid/high crossover (Hz)
    pub crossover_high_hz: f64,
    pub low: CompressorBand,
    pub mid: CompressorBand,
    pub high: CompressorBand,
}

/// Sibilance reduction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeEsser {
    pub intensity: f64,
    pub amount: f64,
    /// Normalized detector frequency
    pub frequency: f64,
}

/// Parallel room ambience: a filtered echo branch mixed under the dry signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reverb {
    /// Echo tap delays (ms)
    pub delays_ms: Vec<u32>,
    /// Echo tap decay factors, parallel to `delays_ms`
    pub decays: Vec<f64>,
    /// Wet branch level (linear)
    pub wet_level: f64,
    /// Wet branch band limits (Hz)
    pub highpass_hz: u32,
    pub lowpass_hz: u32,
}

/// 2x2 channel mix matrix plus an optional left-channel delay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StereoMatrix {
    pub ll: f64,
    pub lr: f64,
    pub rl: f64,
    pub rr: f64,
    /// Left channel delay (ms); 0 = none
    pub left_delay_ms: u32,
}

impl StereoMatrix {
    /// True when the matrix passes channels through unchanged.
    pub fn is_identity(&self) -> bool {
        self.ll == 1.0
            && self.lr == 0.0
            && self.rl == 0.0
            && self.rr == 1.0
            && self.left_delay_ms == 0
    }
}

/// Single-pass loudness normalization with measured input values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoudnessNormalization {
    /// Effective target after quiet-input protection (LUFS)
    pub target_lufs: f64,
    pub target_lra: f64,
    pub true_peak_db: f64,
    /// Measured values from analysis, fed back so the engine can use linear
    /// gain where possible
    pub measured_lufs: f64,
    pub measured_lra: f64,
    pub measured_true_peak_db: f64,
}

/// Final safety limiter. Always present, always last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Limiter {
    /// Output ceiling (linear)
    pub limit: f64,
    pub attack_ms: f64,
    pub release_ms: f64,
}

/// Complete, concrete parameter set for one file run.
///
/// Produced by the decision engine from a `FeatureSet` and a `UserIntent`;
/// consumed by the graph assembler. Optional stages are `None` when the
/// corresponding intent toggle is off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageParameters {
    pub noise: NoiseSuppression,
    pub eq: Option<Vec<EqBand>>,
    pub compression: Option<MultibandCompression>,
    /// Gentle fixed tone touch-up applied after compression
    pub touchup: EqBand,
    pub de_esser: Option<DeEsser>,
    pub reverb: Option<Reverb>,
    pub stereo: StereoMatrix,
    pub loudnorm: LoudnessNormalization,
    pub limiter: Limiter,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_set_defaults_are_safe() {
        let f = FeatureSet::default();
        assert_eq!(f.bitrate_kbps, 192);
        assert_eq!(f.sample_rate_hz, 44100);
        assert_eq!(f.integrated_loudness_lufs, -20.0);
        assert_eq!(f.noise_floor_dbfs, -60.0);
        assert!(!f.is_lossless);
    }

    #[test]
    fn test_user_intent_defaults() {
        let i = UserIntent::default();
        assert_eq!(i.preset, ScenePreset::General);
        assert_eq!(i.clarity, 3);
        assert_eq!(i.reverb, 2);
        assert!(i.eq && i.compression && i.de_esser);
        assert!(!i.avoid_vocal_band);
        assert_eq!(i.stereo_field, StereoFieldPreset::MildWiden);
    }

    #[test]
    fn test_stereo_identity() {
        let m = StereoMatrix {
            ll: 1.0,
            lr: 0.0,
            rl: 0.0,
            rr: 1.0,
            left_delay_ms: 0,
        };
        assert!(m.is_identity());
        let m2 = StereoMatrix {
            ll: 0.8,
            lr: 0.2,
            rl: 0.2,
            rr: 0.8,
            left_delay_ms: 0,
        };
        assert!(!m2.is_identity());
    }

    #[test]
    fn test_intent_toml_round_trip() {
        let i = UserIntent {
            preset: ScenePreset::News,
            reverb: 0,
            ..UserIntent::default()
        };
        let s = toml::to_string(&i).unwrap();
        let back: UserIntent = toml::from_str(&s).unwrap();
        assert_eq!(back, i);
    }
}
