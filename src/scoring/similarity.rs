use thiserror::Error;

use crate::embedding::Embedding;
use crate::scoring::ScoreCalibration;

#[derive(Debug, Error)]
pub enum SimilarityError {
    #[error("embedding dimensionality mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },
}

fn check_dimensions(a: &[f32], b: &[f32]) -> Result<(), SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(())
}

/// Cosine similarity between two embeddings, clamped to [-1, 1]. Returns 0.0
/// when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, SimilarityError> {
    check_dimensions(a, b)?;

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += f64::from(x) * f64::from(y);
        norm_a += f64::from(x) * f64::from(x);
        norm_b += f64::from(y) * f64::from(y);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0))
}

/// Straight-line (L2) distance between two embeddings.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Result<f64, SimilarityError> {
    check_dimensions(a, b)?;

    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let diff = f64::from(x) - f64::from(y);
            diff * diff
        })
        .sum();

    Ok(sum.sqrt())
}

/// Map a euclidean distance to a 0-100 score via a four-band piecewise-linear
/// curve tuned to the embedding space's empirical range.
fn distance_score(distance: f64) -> f64 {
    if distance < 0.5 {
        // 0.0..0.5 maps to 100..90
        100.0 - (distance / 0.5) * 10.0
    } else if distance < 1.5 {
        // 0.5..1.5 maps to 90..60
        90.0 - (distance - 0.5) * 30.0
    } else if distance < 3.0 {
        // 1.5..3.0 maps to 60..30
        60.0 - (distance - 1.5) * 20.0
    } else {
        // >=3.0 falls from 30 to the floor at 0
        (30.0 - (distance - 3.0) * 10.0).max(0.0)
    }
}

/// Map a cosine similarity to a 0-100 score, suppressing moderate
/// similarities so only near-certain matches score high.
fn cosine_score(similarity: f64, calibration: &ScoreCalibration) -> f64 {
    let raw = ((similarity + 1.0) / 2.0) * 100.0;
    if raw > calibration.high_confidence_cutoff {
        raw
    } else {
        raw * calibration.cosine_damping
    }
}

/// Fuse cosine similarity and euclidean distance between two embeddings into
/// one 0-100 combined score. Fails if the embeddings have different
/// dimensionality. Pure and deterministic.
pub fn combined_score(
    a: &Embedding,
    b: &Embedding,
    calibration: &ScoreCalibration,
) -> Result<i64, SimilarityError> {
    let cosine = cosine_similarity(a.as_slice(), b.as_slice())?;
    let distance = euclidean_distance(a.as_slice(), b.as_slice())?;

    let fused = cosine_score(cosine, calibration) * calibration.cosine_weight
        + distance_score(distance) * calibration.distance_weight;

    Ok((fused.round() as i64).clamp(0, 100))
}
