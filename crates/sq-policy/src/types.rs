use serde::{Deserialize, Serialize};
use sq_core::{Preset, QualityLevel, StrategyId, StrategyParams};
use std::collections::HashMap;

/// Predicate over a document profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Always,
    SizeAbove(u64),
    SizeAtMost(u64),
    /// Zero pages or zero images: nothing for image strategies to improve.
    NoImageContent,
    ImageHeavy { min_images: u32, min_pixels: u64 },
    AnyOf(Vec<Condition>),
}

/// Where a step's parameters come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamSource {
    /// dpi and quality from the requested level's tier.
    Level { preset: Preset },
    /// Quality from the level tier, fixed dpi.
    LevelQuality { resolution_dpi: u32, preset: Preset },
    /// Level-independent.
    Fixed(StrategyParams),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTemplate {
    pub strategy: StrategyId,
    pub params: ParamSource,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Reject,
    Compress(Vec<StepTemplate>),
}

/// One row of the decision table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub name: String,
    pub when: Condition,
    pub action: RuleAction,
}

/// dpi / JPEG quality for one quality level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelTier {
    pub resolution_dpi: u32,
    pub image_quality: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub small_bytes: u64,
    pub medium_bytes: u64,
    pub hard_ceiling_bytes: u64,
    pub image_heavy_count: u32,
    pub image_heavy_pixels: u64,
}

/// Full policy configuration: thresholds, level tiers and the ordered rule
/// table. The first matching rule wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub thresholds: Thresholds,
    pub levels: HashMap<QualityLevel, LevelTier>,
    pub rules: Vec<PolicyRule>,
    /// Used when no rule matches or a matching rule has no steps.
    pub fallback_step: StepTemplate,
}

impl PolicyConfig {
    pub fn hard_ceiling(&self) -> u64 {
        self.thresholds.hard_ceiling_bytes
    }

    pub fn tier(&self, level: QualityLevel) -> LevelTier {
        self.levels
            .get(&level)
            .or_else(|| self.levels.get(&QualityLevel::Medium))
            .copied()
            .unwrap_or(LevelTier { resolution_dpi: 72, image_quality: 45 })
    }
}

impl PolicyConfig {
    /// Load a full policy (thresholds, tiers and rule table) from JSON.
    pub fn from_json(raw: &str) -> sq_core::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
