//! Per-screen preload rules.

use std::collections::HashMap;
use std::sync::Arc;

use duat_shared::QualityLevel;

use super::asset_type::{AssetType, LoadPriority};
use super::cache::AssetCache;
use super::key::AssetKey;
use super::loader::{BackgroundLoader, LoadRequest, Submission};
use super::source::{processed_load, AssetSource};

/// One asset a screen wants warm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadRule {
    /// Asset key.
    pub key: AssetKey,
    /// Kind of asset.
    pub asset_type: AssetType,
    /// Queue priority.
    pub priority: LoadPriority,
}

/// Screen name → assets to request when the screen is entered.
#[derive(Debug, Clone, Default)]
pub struct PreloadPlan {
    rules: HashMap<String, Vec<PreloadRule>>,
}

impl PreloadPlan {
    /// Empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule for `screen`.
    pub fn add_rule(
        &mut self,
        screen: impl Into<String>,
        key: impl Into<AssetKey>,
        asset_type: AssetType,
        priority: LoadPriority,
    ) -> &mut Self {
        self.rules.entry(screen.into()).or_default().push(PreloadRule {
            key: key.into(),
            asset_type,
            priority,
        });
        self
    }

    /// Rules for `screen`, in insertion order.
    #[must_use]
    pub fn rules_for(&self, screen: &str) -> &[PreloadRule] {
        self.rules.get(screen).map_or(&[], Vec::as_slice)
    }

    /// Screens with at least one rule.
    pub fn screens(&self) -> impl Iterator<Item = &str> + '_ {
        self.rules.keys().map(String::as_str)
    }

    /// Requests every rule for `screen` that is neither cached nor already in
    /// flight. Returns the number of loads queued.
    pub fn schedule(
        &self,
        screen: &str,
        cache: &AssetCache,
        loader: &mut BackgroundLoader,
        source: &Arc<dyn AssetSource>,
        level: QualityLevel,
    ) -> usize {
        let mut queued = 0;
        for rule in self.rules_for(screen) {
            if cache.contains(&rule.key) || loader.is_pending(&rule.key) {
                continue;
            }
            let request = LoadRequest::new(rule.key.clone(), rule.asset_type)
                .with_priority(rule.priority)
                .on_screen(screen);
            let load = processed_load(Arc::clone(source), rule.key.clone(), rule.asset_type, level);
            if loader.request_async(request, load, None) == Submission::Submitted {
                queued += 1;
            }
        }
        if queued > 0 {
            tracing::debug!(screen, queued, "Scheduled preloads");
        }
        queued
    }
}
