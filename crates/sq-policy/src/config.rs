//! Default policy configuration.

use crate::types::*;
use sq_core::{Preset, QualityLevel, StrategyId, StrategyParams};
use std::collections::HashMap;

const MB: f64 = 1024.0 * 1024.0;

fn mb(value: f64) -> u64 {
    (value * MB) as u64
}

fn step(strategy: StrategyId, params: ParamSource, timeout_secs: u64) -> StepTemplate {
    StepTemplate { strategy, params, timeout_secs }
}

pub fn default_thresholds() -> Thresholds {
    Thresholds {
        small_bytes: mb(1.2),
        medium_bytes: mb(2.5),
        hard_ceiling_bytes: mb(12.0),
        image_heavy_count: 6,
        image_heavy_pixels: 4_000_000,
    }
}

pub fn default_levels() -> HashMap<QualityLevel, LevelTier> {
    HashMap::from([
        (QualityLevel::High, LevelTier { resolution_dpi: 60, image_quality: 35 }),
        (QualityLevel::Medium, LevelTier { resolution_dpi: 72, image_quality: 45 }),
        (QualityLevel::Low, LevelTier { resolution_dpi: 95, image_quality: 60 }),
    ])
}

fn fast_path() -> Vec<StepTemplate> {
    vec![
        step(StrategyId::FastCodec, ParamSource::Level { preset: Preset::Ebook }, 120),
        step(StrategyId::StreamOptimizer, ParamSource::Fixed(stream_params()), 60),
    ]
}

fn stream_params() -> StrategyParams {
    StrategyParams::new(0, 100, Preset::Default)
}

/// Build the ordered rule table for the given thresholds.
pub fn rule_table(t: &Thresholds) -> Vec<PolicyRule> {
    vec![
        PolicyRule {
            name: "oversize".into(),
            when: Condition::SizeAbove(t.hard_ceiling_bytes),
            action: RuleAction::Reject,
        },
        PolicyRule {
            name: "no-image-content".into(),
            when: Condition::NoImageContent,
            action: RuleAction::Compress(fast_path()),
        },
        PolicyRule {
            name: "small".into(),
            when: Condition::SizeAtMost(t.small_bytes),
            action: RuleAction::Compress(fast_path()),
        },
        PolicyRule {
            name: "large-or-image-heavy".into(),
            when: Condition::AnyOf(vec![
                Condition::SizeAbove(t.medium_bytes),
                Condition::ImageHeavy {
                    min_images: t.image_heavy_count,
                    min_pixels: t.image_heavy_pixels,
                },
            ]),
            action: RuleAction::Compress(vec![
                step(StrategyId::StreamOptimizer, ParamSource::Fixed(stream_params()), 90),
                step(
                    StrategyId::AggressiveCodec,
                    ParamSource::Fixed(StrategyParams::new(50, 35, Preset::Screen)),
                    200,
                ),
                step(
                    StrategyId::ImageRecode,
                    ParamSource::LevelQuality { resolution_dpi: 72, preset: Preset::Default },
                    240,
                ),
            ]),
        },
        PolicyRule {
            name: "medium".into(),
            when: Condition::Always,
            action: RuleAction::Compress(vec![step(
                StrategyId::AggressiveCodec,
                ParamSource::Fixed(StrategyParams::new(60, 40, Preset::Screen)),
                180,
            )]),
        },
    ]
}

/// Default policy configuration.
pub fn default_policy_config() -> PolicyConfig {
    let thresholds = default_thresholds();
    PolicyConfig {
        rules: rule_table(&thresholds),
        thresholds,
        levels: default_levels(),
        fallback_step: step(StrategyId::FastCodec, ParamSource::Level { preset: Preset::Ebook }, 120),
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        default_policy_config()
    }
}

/// The default config instance.
pub static POLICY_CONFIG: std::sync::LazyLock<PolicyConfig> = std::sync::LazyLock::new(default_policy_config);
