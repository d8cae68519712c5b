//! Decision engine: measurements + intent -> concrete stage parameters
//!
//! Pure and total: no I/O, no randomness, defined output for any input.
//! Identical inputs always produce identical parameters.

use crate::policy::MasteringPolicy;
use crate::types::{
    CompressorBand, DeEsser, EqBand, FeatureSet, Limiter, LoudnessNormalization,
    MultibandCompression, NoiseSuppression, NoiseTier, Reverb, ScenePreset, StageParameters,
    StereoFieldPreset, StereoMatrix, UserIntent,
};

/// Derive the full parameter set for one file.
pub fn decide(
    features: &FeatureSet,
    intent: &UserIntent,
    policy: &MasteringPolicy,
) -> StageParameters {
    StageParameters {
        noise: decide_noise(features, intent, policy),
        eq: intent.eq.then(|| decide_eq(intent)),
        compression: intent.compression.then(|| decide_compression(features, policy)),
        touchup: EqBand::new(2000.0, 0.5, 2.0),
        de_esser: intent.de_esser.then(|| decide_de_esser(features, policy)),
        reverb: (intent.reverb > 0).then(|| decide_reverb(intent.reverb)),
        stereo: decide_stereo(intent.stereo_field),
        loudnorm: decide_loudnorm(features, policy),
        limiter: Limiter {
            limit: 0.9,
            attack_ms: 0.1,
            release_ms: 5.0,
        },
    }
}

/// Noise suppression: user tier sets the base strength; a clean measured
/// floor relaxes it. Measurement never escalates beyond the chosen tier.
fn decide_noise(
    features: &FeatureSet,
    intent: &UserIntent,
    policy: &MasteringPolicy,
) -> NoiseSuppression {
    let base = match intent.noise_tier {
        NoiseTier::Low => -20.0,
        NoiseTier::Medium => -30.0,
        NoiseTier::High => -40.0,
    };

    let strength_db = if features.noise_floor_dbfs > policy.noise_floor_noisy_dbfs {
        base
    } else if features.noise_floor_dbfs < policy.noise_floor_clean_dbfs {
        base + 10.0
    } else {
        base + 5.0
    };

    NoiseSuppression {
        strength_db,
        highpass_hz: 80,
    }
}

/// Base curve per scene, then slider bands, then the optional vocal-band
/// carve-out for background-music material.
fn decide_eq(intent: &UserIntent) -> Vec<EqBand> {
    let mut bands: Vec<EqBand> = match intent.preset {
        ScenePreset::News => vec![
            EqBand::new(100.0, 1.5, 0.707),
            EqBand::new(300.0, -1.0, 1.0),
            EqBand::new(1000.0, 2.0, 1.0),
            EqBand::new(3000.0, 1.5, 1.0),
            EqBand::new(6000.0, 0.5, 2.0),
        ],
        ScenePreset::Documentary => vec![
            EqBand::new(80.0, 2.0, 0.707),
            EqBand::new(250.0, 1.0, 1.0),
            EqBand::new(800.0, 1.5, 1.0),
            EqBand::new(2000.0, 1.0, 1.0),
            EqBand::new(4000.0, 0.5, 1.0),
        ],
        ScenePreset::Advertisement => vec![
            EqBand::new(120.0, 1.5, 0.707),
            EqBand::new(400.0, 1.0, 1.0),
            EqBand::new(1500.0, 2.0, 1.0),
            EqBand::new(4000.0, 2.0, 1.0),
            EqBand::new(8000.0, 1.0, 2.0),
        ],
        ScenePreset::Narration => vec![
            EqBand::new(160.0, 2.0, 1.6),
            EqBand::new(1200.0, 2.0, 1.0),
            EqBand::new(8000.0, 1.5, 2.0),
        ],
        ScenePreset::General => vec![
            EqBand::new(100.0, 1.5, 0.707),
            EqBand::new(300.0, -0.5, 1.0),
            EqBand::new(1000.0, 1.5, 1.0),
            EqBand::new(3000.0, 1.0, 1.0),
            EqBand::new(6000.0, 0.5, 2.0),
        ],
    };

    // Slider bands: 3 is neutral, each step moves the gain linearly.
    bands.push(EqBand::new(
        2500.0,
        1.5 + (intent.clarity as f64 - 3.0) * 0.6,
        1.2,
    ));
    bands.push(EqBand::new(
        200.0,
        1.0 + (intent.warmth as f64 - 3.0) * 0.5,
        1.4,
    ));
    bands.push(EqBand::new(
        3500.0,
        2.0 + (intent.voice_presence as f64 - 3.0) * 0.5,
        1.0,
    ));

    if intent.avoid_vocal_band {
        bands.push(EqBand::new(1500.0, -4.0, 2.0));
        bands.push(EqBand::new(300.0, 1.5, 1.0));
        bands.push(EqBand::new(8000.0, 1.5, 2.0));
    }

    bands
}

/// Three-band compression split at 300 Hz / 3 kHz.
///
/// Timing follows the transient ratio (fast for percussive material); the
/// mid-band ratio follows measured dynamic range. Per-band offsets keep the
/// low band slower and the high band faster than the mid.
fn decide_compression(features: &FeatureSet, policy: &MasteringPolicy) -> MultibandCompression {
    let (attack_ms, release_ms): (f64, f64) = if features.transient_ratio
        > policy.transient_ratio_threshold
    {
        (5.0, 200.0)
    } else {
        (30.0, 500.0)
    };

    let mid_ratio = if features.dynamic_range_db > policy.dynamic_range_high_db {
        3.0
    } else if features.dynamic_range_db > policy.dynamic_range_mid_db {
        2.5
    } else {
        2.0
    };

    MultibandCompression {
        crossover_low_hz: 300.0,
        crossover_high_hz: 3000.0,
        low: CompressorBand {
            threshold_db: -24.0,
            ratio: 3.5,
            attack_ms,
            release_ms: (release_ms + 500.0).min(1000.0),
            knee_db: 12.0,
            makeup_db: 4.0,
            mix_weight: 1.1,
        },
        mid: CompressorBand {
            threshold_db: -22.0,
            ratio: mid_ratio,
            attack_ms: (attack_ms + 20.0).min(50.0),
            release_ms: (release_ms + 300.0).min(800.0),
            knee_db: 8.0,
            makeup_db: 3.0,
            mix_weight: 1.0,
        },
        high: CompressorBand {
            threshold_db: -20.0,
            ratio: 2.0,
            attack_ms: (attack_ms - 2.0).max(3.0),
            release_ms: (release_ms + 100.0).min(500.0),
            knee_db: 6.0,
            makeup_db: 2.0,
            mix_weight: 0.9,
        },
    }
}

/// Sibilant material gets the stronger setting; the detector band is fixed.
fn decide_de_esser(features: &FeatureSet, policy: &MasteringPolicy) -> DeEsser {
    let (intensity, amount) = if features.high_freq_energy_dbfs > policy.deesser_hf_threshold_dbfs {
        (0.6, 0.6)
    } else {
        (0.4, 0.4)
    };
    DeEsser {
        intensity,
        amount,
        frequency: 0.5,
    }
}

/// Room presets 1-5, small to large. Amounts above 5 clamp to the largest.
fn decide_reverb(amount: u8) -> Reverb {
    let (delays_ms, decays, wet_level): (Vec<u32>, Vec<f64>, f64) = match amount.min(5) {
        1 => (
            vec![30, 55, 80, 110],
            vec![0.20, 0.16, 0.13, 0.10],
            0.12,
        ),
        2 => (
            vec![25, 50, 75, 100, 130],
            vec![0.24, 0.20, 0.16, 0.13, 0.10],
            0.16,
        ),
        3 => (
            vec![20, 40, 60, 85, 110, 140],
            vec![0.28, 0.24, 0.20, 0.16, 0.13, 0.10],
            0.20,
        ),
        4 => (
            vec![18, 36, 54, 76, 98, 122, 150],
            vec![0.32, 0.28, 0.24, 0.20, 0.16, 0.13, 0.10],
            0.24,
        ),
        _ => (
            vec![16, 32, 48, 68, 88, 110, 135, 165],
            vec![0.36, 0.32, 0.28, 0.24, 0.20, 0.16, 0.13, 0.10],
            0.28,
        ),
    };
    Reverb {
        delays_ms,
        decays,
        wet_level,
        highpass_hz: 180,
        lowpass_hz: 8000,
    }
}

fn decide_stereo(preset: StereoFieldPreset) -> StereoMatrix {
    match preset {
        StereoFieldPreset::Original => StereoMatrix {
            ll: 1.0,
            lr: 0.0,
            rl: 0.0,
            rr: 1.0,
            left_delay_ms: 0,
        },
        StereoFieldPreset::MildWiden => StereoMatrix {
            ll: 0.8,
            lr: 0.2,
            rl: 0.2,
            rr: 0.8,
            left_delay_ms: 0,
        },
        StereoFieldPreset::Broadcast => StereoMatrix {
            ll: 0.7,
            lr: 0.3,
            rl: 0.3,
            rr: 0.7,
            left_delay_ms: 1,
        },
    }
}

/// Single-pass normalization seeded with the measured input values.
fn decide_loudnorm(features: &FeatureSet, policy: &MasteringPolicy) -> LoudnessNormalization {
    LoudnessNormalization {
        target_lufs: policy.effective_target_lufs(features.integrated_loudness_lufs),
        target_lra: policy.target_lra,
        true_peak_db: policy.true_peak_db,
        measured_lufs: features.integrated_loudness_lufs,
        measured_lra: features.loudness_range_lu,
        measured_true_peak_db: policy.true_peak_db,
    }
}
