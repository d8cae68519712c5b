//! Input quality score (0-100), reporting only
//!
//! Additive scoring from a baseline of 50: format, sample rate, loudness
//! proximity to the broadcast target, dynamic range, and noise floor each
//! contribute a bonus. Never used to branch processing.

use crate::types::FeatureSet;

pub fn score(features: &FeatureSet) -> f64 {
    let mut score: f64 = 50.0;

    if features.is_lossless {
        score += 15.0;
    } else if features.bitrate_kbps >= 320 {
        score += 10.0;
    } else if features.bitrate_kbps >= 192 {
        score += 5.0;
    }

    if features.sample_rate_hz >= 48000 {
        score += 5.0;
    }

    let loudness_offset = (features.integrated_loudness_lufs + 16.0).abs();
    if loudness_offset <= 2.0 {
        score += 10.0;
    } else if loudness_offset <= 4.0 {
        score += 5.0;
    }

    if features.dynamic_range_db >= 15.0 {
        score += 10.0;
    } else if features.dynamic_range_db >= 12.0 {
        score += 5.0;
    }

    if features.noise_floor_dbfs <= -55.0 {
        score += 10.0;
    } else if features.noise_floor_dbfs <= -45.0 {
        score += 5.0;
    }

    score.min(100.0)
}
