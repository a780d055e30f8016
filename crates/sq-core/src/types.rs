use crate::document::Document;
use crate::error::StrategyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// User-facing compression intent. `High` asks for the strongest reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    High,
    #[default]
    Medium,
    Low,
}

impl QualityLevel {
    /// Normalize a raw request value. Names are matched case-insensitively;
    /// a number in `0..=100` is read as compression strength. Anything else
    /// is `Medium`.
    pub fn parse(raw: &str) -> Self {
        let value = raw.trim().to_lowercase();
        match value.as_str() {
            "high" => return Self::High,
            "medium" => return Self::Medium,
            "low" => return Self::Low,
            _ => {}
        }
        match value.parse::<u32>() {
            Ok(n) if n > 100 => Self::Medium,
            Ok(n) if n >= 67 => Self::High,
            Ok(n) if n >= 34 => Self::Medium,
            Ok(_) => Self::Low,
            Err(_) => Self::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Codec preset, rendered as a pdfwrite `PDFSETTINGS` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Screen,
    Ebook,
    Printer,
    Prepress,
    Default,
}

impl Preset {
    pub fn pdf_settings(&self) -> &'static str {
        match self {
            Self::Screen => "/screen",
            Self::Ebook => "/ebook",
            Self::Printer => "/printer",
            Self::Prepress => "/prepress",
            Self::Default => "/default",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyParams {
    pub resolution_dpi: u32,
    /// JPEG quality, 0-100.
    pub image_quality: u8,
    pub preset: Preset,
}

impl StrategyParams {
    pub fn new(resolution_dpi: u32, image_quality: u8, preset: Preset) -> Self {
        Self {
            resolution_dpi,
            image_quality: image_quality.min(100),
            preset,
        }
    }
}

/// Resource cost class a strategy declares to the policy engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostClass {
    Cheap,
    Expensive,
}

/// The fixed set of named strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyId {
    FastCodec,
    AggressiveCodec,
    StreamOptimizer,
    ImageRecode,
}

impl StrategyId {
    pub const ALL: [StrategyId; 4] = [
        StrategyId::FastCodec,
        StrategyId::AggressiveCodec,
        StrategyId::StreamOptimizer,
        StrategyId::ImageRecode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FastCodec => "fast-codec",
            Self::AggressiveCodec => "aggressive-codec",
            Self::StreamOptimizer => "stream-optimizer",
            Self::ImageRecode => "image-recode",
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attempt in a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub strategy: StrategyId,
    pub params: StrategyParams,
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

/// Ordered, non-empty list of attempts. Falling off the end means
/// "return the original", which is not itself a step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressionPlan {
    steps: Vec<PlanStep>,
    /// Name of the policy rule that produced this plan.
    pub rule: String,
}

impl CompressionPlan {
    /// Returns `None` for an empty step list.
    pub fn new(rule: impl Into<String>, steps: Vec<PlanStep>) -> Option<Self> {
        if steps.is_empty() {
            return None;
        }
        Some(Self { steps, rule: rule.into() })
    }

    pub fn single(rule: impl Into<String>, step: PlanStep) -> Self {
        Self { steps: vec![step], rule: rule.into() }
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn primary(&self) -> &PlanStep {
        &self.steps[0]
    }

    pub fn fallbacks(&self) -> &[PlanStep] {
        &self.steps[1..]
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.strategy.as_str()).collect()
    }
}

/// Outcome of one strategy invocation. An output and an error are never
/// both present.
#[derive(Debug, Clone)]
pub enum StrategyResult {
    Success(Document),
    Failure(StrategyError),
    Timeout(Duration),
}

impl StrategyResult {
    pub fn status(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Failure(_) => "failure",
            Self::Timeout(_) => "timeout",
        }
    }

    pub fn output(&self) -> Option<&Document> {
        match self {
            Self::Success(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&StrategyError> {
        match self {
            Self::Failure(err) => Some(err),
            _ => None,
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::try_from_secs_f64(secs).unwrap_or_default())
    }
}
