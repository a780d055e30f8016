use sq_core::config::EvaluatorConfig;

const BASIS_POINTS: u128 = 10_000;

/// The single effectiveness rule: a candidate is accepted iff
/// `candidate < original * (1 - margin)`.
///
/// The margin is resolved to basis points once, so the comparison itself is
/// exact integer arithmetic and a candidate sitting exactly on the boundary
/// is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluator {
    keep_bp: u128,
}

impl Evaluator {
    /// `margin` is clamped to `[0, 1]`; NaN is treated as 0.
    pub fn new(margin: f64) -> Self {
        let margin = if margin.is_nan() { 0.0 } else { margin.clamp(0.0, 1.0) };
        let keep_bp = ((1.0 - margin) * BASIS_POINTS as f64).round() as u128;
        Self { keep_bp }
    }

    pub fn from_config(config: &EvaluatorConfig) -> Self {
        Self::new(config.margin)
    }

    pub fn margin(&self) -> f64 {
        (BASIS_POINTS - self.keep_bp) as f64 / BASIS_POINTS as f64
    }

    pub fn accept(&self, original_size: u64, candidate_size: u64) -> bool {
        if original_size == 0 {
            return false;
        }
        (candidate_size as u128) * BASIS_POINTS < (original_size as u128) * self.keep_bp
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::from_config(&EvaluatorConfig::default())
    }
}

/// Percentage saved, negative when the result grew.
pub fn reduction_pct(original_size: u64, final_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    (1.0 - final_size as f64 / original_size as f64) * 100.0
}
