// Visual similarity scoring and contextual adjustment.
//
// Two tiers of scoring live in this crate: the visual pipeline here (embedding
// similarity plus small contextual bonuses, used by the candidate ranker) and
// the metadata-only heuristic in `alerts::heuristic` (larger bonus scales, no
// embedding calls, used by the client-side alert scan). The scales are
// deliberately distinct and must not be unified.

pub mod context;
pub mod similarity;

pub use context::adjust_score;
pub use similarity::{combined_score, cosine_similarity, euclidean_distance, SimilarityError};

/// Default damping applied to cosine-derived scores below the high-confidence
/// cutoff. Calibration, not a derived identity; override via `COSINE_DAMPING`.
pub const DEFAULT_COSINE_DAMPING: f64 = 0.85;

/// Cosine scores above this cutoff are kept undamped.
pub const DEFAULT_HIGH_CONFIDENCE_CUTOFF: f64 = 95.0;

/// Tunable constants for fusing cosine and euclidean metrics into a single
/// 0-100 combined score.
#[derive(Debug, Clone, Copy)]
pub struct ScoreCalibration {
    /// Multiplier for cosine scores at or below `high_confidence_cutoff`.
    pub cosine_damping: f64,
    /// Cosine scores strictly above this value are not damped.
    pub high_confidence_cutoff: f64,
    /// Weight of the cosine component in the fusion.
    pub cosine_weight: f64,
    /// Weight of the euclidean-distance component in the fusion. Distance is
    /// weighted more heavily because it is empirically more discriminating
    /// for this embedding space.
    pub distance_weight: f64,
}

impl Default for ScoreCalibration {
    fn default() -> Self {
        Self {
            cosine_damping: DEFAULT_COSINE_DAMPING,
            high_confidence_cutoff: DEFAULT_HIGH_CONFIDENCE_CUTOFF,
            cosine_weight: 0.3,
            distance_weight: 0.7,
        }
    }
}

impl ScoreCalibration {
    /// Build a calibration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let mut calibration = Self::default();
        calibration.cosine_damping =
            crate::environment::env_parse_or("COSINE_DAMPING", calibration.cosine_damping);
        calibration
    }
}
