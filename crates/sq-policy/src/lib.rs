//! Squeeze Policy: maps a document profile and requested level to an
//! ordered compression plan through a declarative rule table.

pub mod config;
pub mod rules;
pub mod selector;
pub mod types;

pub use config::{default_policy_config, POLICY_CONFIG};
pub use rules::first_match;
pub use selector::*;
pub use types::*;

use sq_core::{CompressionPlan, DocumentProfile, QualityLevel, Result, SqError, StrategyId};

/// Plan the compression of a profiled document.
///
/// Returns `SqError::SizeExceeded` when the matching rule rejects the
/// document; otherwise always a non-empty, finite plan.
pub fn plan(profile: &DocumentProfile, level: QualityLevel, config: &PolicyConfig) -> Result<CompressionPlan> {
    let Some(rule) = first_match(&config.rules, profile) else {
        tracing::debug!(size = profile.size_bytes, "no policy rule matched, using fallback step");
        return Ok(fallback_plan("fallback", level, config));
    };

    let templates = match &rule.action {
        RuleAction::Reject => {
            tracing::info!(rule = %rule.name, size = profile.size_bytes, "document rejected by policy");
            return Err(SqError::SizeExceeded {
                size: profile.size_bytes,
                limit: config.hard_ceiling(),
            });
        }
        RuleAction::Compress(templates) => templates,
    };

    let plan = CompressionPlan::new(rule.name.clone(), select_chain(templates, level, config))
        .unwrap_or_else(|| fallback_plan(&rule.name, level, config));

    tracing::debug!(
        rule = %plan.rule,
        level = %level,
        size_mb = profile.size_mb(),
        pages = profile.page_count,
        images = profile.image_count,
        steps = ?plan.strategy_names(),
        "compression plan selected"
    );
    Ok(plan)
}

/// A one-step plan running exactly `strategy`, with level-derived params.
pub fn plan_single(strategy: StrategyId, level: QualityLevel, config: &PolicyConfig) -> CompressionPlan {
    let template = config
        .rules
        .iter()
        .filter_map(|rule| match &rule.action {
            RuleAction::Compress(templates) => Some(templates),
            RuleAction::Reject => None,
        })
        .flatten()
        .find(|t| t.strategy == strategy);

    let step = match template {
        Some(t) => select_step(t, level, config),
        None => select_step(
            &StepTemplate {
                strategy,
                params: ParamSource::Level { preset: sq_core::Preset::Default },
                timeout_secs: config.fallback_step.timeout_secs,
            },
            level,
            config,
        ),
    };
    tracing::debug!(strategy = %strategy, quality = step.params.image_quality, "single-strategy plan");
    CompressionPlan::single(format!("forced:{strategy}"), step)
}

fn fallback_plan(rule: &str, level: QualityLevel, config: &PolicyConfig) -> CompressionPlan {
    CompressionPlan::single(rule, select_step(&config.fallback_step, level, config))
}
