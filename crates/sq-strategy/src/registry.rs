use crate::ghostscript::GhostscriptStrategy;
use crate::image_recode::ImageRecoder;
use crate::stream_optimize::StreamOptimizer;
use crate::traits::Strategy;
use sq_core::config::StrategyConfig;
use sq_core::{CostClass, StrategyId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Strategy id -> implementation. Cloning shares the implementations.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    entries: HashMap<StrategyId, Arc<dyn Strategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in strategy.
    pub fn with_defaults(config: &StrategyConfig) -> Self {
        let gs = config.ghostscript_path.clone();
        let mut registry = Self::new();
        registry.register(
            StrategyId::FastCodec,
            Arc::new(GhostscriptStrategy::new(gs.clone(), CostClass::Cheap, Duration::from_secs(150))),
        );
        registry.register(
            StrategyId::AggressiveCodec,
            Arc::new(GhostscriptStrategy::new(gs, CostClass::Expensive, Duration::from_secs(240))),
        );
        registry.register(StrategyId::StreamOptimizer, Arc::new(StreamOptimizer::default()));
        registry.register(StrategyId::ImageRecode, Arc::new(ImageRecoder::default()));
        registry
    }

    /// Replaces any previous entry for `id`.
    pub fn register(&mut self, id: StrategyId, strategy: Arc<dyn Strategy>) {
        self.entries.insert(id, strategy);
    }

    pub fn get(&self, id: StrategyId) -> Option<Arc<dyn Strategy>> {
        self.entries.get(&id).cloned()
    }

    pub fn contains(&self, id: StrategyId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn ids(&self) -> Vec<StrategyId> {
        StrategyId::ALL.iter().copied().filter(|id| self.contains(*id)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry").field("ids", &self.ids()).finish()
    }
}
