//! Plan step materialization from rule templates.

use crate::types::{ParamSource, PolicyConfig, StepTemplate};
use sq_core::{PlanStep, QualityLevel, StrategyParams};
use std::time::Duration;

pub fn resolve_params(source: &ParamSource, level: QualityLevel, config: &PolicyConfig) -> StrategyParams {
    let tier = config.tier(level);
    match source {
        ParamSource::Level { preset } => StrategyParams::new(tier.resolution_dpi, tier.image_quality, *preset),
        ParamSource::LevelQuality { resolution_dpi, preset } => {
            StrategyParams::new(*resolution_dpi, tier.image_quality, *preset)
        }
        ParamSource::Fixed(params) => *params,
    }
}

pub fn select_step(template: &StepTemplate, level: QualityLevel, config: &PolicyConfig) -> PlanStep {
    PlanStep {
        strategy: template.strategy,
        params: resolve_params(&template.params, level, config),
        timeout: Duration::from_secs(template.timeout_secs.max(1)),
    }
}

/// Materialize a full chain: primary first, fallbacks in order.
pub fn select_chain(templates: &[StepTemplate], level: QualityLevel, config: &PolicyConfig) -> Vec<PlanStep> {
    templates.iter().map(|t| select_step(t, level, config)).collect()
}
