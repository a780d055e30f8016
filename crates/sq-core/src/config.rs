use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqueezeConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub evaluator: EvaluatorConfig,
    pub profiler: ProfilerConfig,
    pub strategies: StrategyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    /// Grace period before working artifacts are deleted.
    pub cleanup_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Minimum fractional reduction a candidate must achieve.
    pub margin: f64,
    /// On plan exhaustion, hand back the smallest below-margin candidate
    /// instead of the original.
    pub return_best_below_margin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilerConfig {
    /// Images inspected per page before sampling stops.
    pub image_sample_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub ghostscript_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".into(), port: 5000 }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { upload_dir: PathBuf::from("uploads"), cleanup_delay_secs: 180 }
    }
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self { margin: 0.02, return_best_below_margin: false }
    }
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self { image_sample_limit: 100 }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self { ghostscript_path: "gs".into() }
    }
}

impl SqueezeConfig {
    /// Build from `SQUEEZE_*` environment variables. Missing or unparsable
    /// values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server: ServerConfig {
                host: env::var("SQUEEZE_HOST").unwrap_or(defaults.server.host),
                port: parsed("SQUEEZE_PORT").unwrap_or(defaults.server.port),
            },
            storage: StorageConfig {
                upload_dir: env::var("SQUEEZE_UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.upload_dir),
                cleanup_delay_secs: parsed("SQUEEZE_CLEANUP_DELAY_SECS")
                    .unwrap_or(defaults.storage.cleanup_delay_secs),
            },
            evaluator: EvaluatorConfig {
                margin: parsed::<f64>("SQUEEZE_MARGIN")
                    .filter(|m| (0.0..1.0).contains(m))
                    .unwrap_or(defaults.evaluator.margin),
                return_best_below_margin: parsed("SQUEEZE_RETURN_BEST_BELOW_MARGIN")
                    .unwrap_or(defaults.evaluator.return_best_below_margin),
            },
            profiler: ProfilerConfig {
                image_sample_limit: parsed("SQUEEZE_IMAGE_SAMPLE_LIMIT")
                    .unwrap_or(defaults.profiler.image_sample_limit),
            },
            strategies: StrategyConfig {
                ghostscript_path: env::var("SQUEEZE_GHOSTSCRIPT")
                    .unwrap_or(defaults.strategies.ghostscript_path),
            },
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
