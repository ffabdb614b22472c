//! Static pricing table for supported providers and models
//!
//! Rates are USD per one million tokens, maintained by hand as a snapshot.
//! The table is an immutable configuration value injected into the
//! [`CostCalculator`](crate::cost_calculator::CostCalculator) at
//! construction; nothing mutates it at runtime.
//!
//! The `zhipuai` and `zai` providers route to the same backing models, so
//! they reference one shared model map under two keys rather than carrying
//! duplicated entries that could drift apart.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Per-model rates in USD per 1,000,000 tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingEntry {
    /// Rate for fresh input tokens
    pub input: f64,
    /// Rate for output tokens
    pub output: f64,
    /// Rate for tokens served from the prompt cache
    pub cache_read: f64,
    /// Rate for tokens written into the prompt cache
    pub cache_write: f64,
}

impl PricingEntry {
    const fn new(input: f64, output: f64, cache_read: f64, cache_write: f64) -> Self {
        Self {
            input,
            output,
            cache_read,
            cache_write,
        }
    }
}

/// Model name → rates for one provider
pub type ModelRates = HashMap<String, PricingEntry>;

/// Provider → model → rates
///
/// Cloning a `PricingTable` is cheap: provider entries share their model
/// maps through `Arc`.
#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    providers: HashMap<String, Arc<ModelRates>>,
}

impl PricingTable {
    /// Build an empty table (every lookup misses)
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in rate snapshot
    pub fn builtin() -> Self {
        DEFAULT_TABLE.clone()
    }

    /// Register a provider's model map
    pub fn insert_provider(&mut self, provider: impl Into<String>, rates: Arc<ModelRates>) {
        self.providers.insert(provider.into(), rates);
    }

    /// Look up the rates for a (provider, normalized model) pair
    pub fn get(&self, provider: &str, model: &str) -> Option<&PricingEntry> {
        self.providers.get(provider)?.get(model)
    }

    /// Known provider names, sorted
    pub fn providers(&self) -> Vec<String> {
        let mut names: Vec<_> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}

fn glm_rates() -> ModelRates {
    let glm = PricingEntry::new(0.5, 2.5, 0.05, 0.25);
    let mut rates = ModelRates::new();
    rates.insert("glm-4".to_string(), glm);
    rates.insert("glm-4.6".to_string(), glm);
    rates.insert("glm-4-custom".to_string(), glm);
    rates
}

fn openai_rates() -> ModelRates {
    let mut rates = ModelRates::new();
    rates.insert("gpt-4o".to_string(), PricingEntry::new(2.5, 10.0, 0.125, 2.5));
    rates.insert(
        "gpt-4o-mini".to_string(),
        PricingEntry::new(0.15, 0.6, 0.075, 0.3),
    );
    rates.insert(
        "gpt-5-codex".to_string(),
        PricingEntry::new(5.0, 15.0, 0.25, 2.5),
    );
    rates.insert(
        "gpt-5-2025-08-07".to_string(),
        PricingEntry::new(7.5, 22.5, 0.375, 3.75),
    );
    rates
}

static DEFAULT_TABLE: Lazy<PricingTable> = Lazy::new(|| {
    let mut table = PricingTable::empty();

    let mut anthropic = ModelRates::new();
    anthropic.insert(
        "claude-3-5-sonnet-20241022".to_string(),
        PricingEntry::new(3.0, 15.0, 0.3, 3.75),
    );
    anthropic.insert(
        "claude-3-5-haiku-20241022".to_string(),
        PricingEntry::new(0.8, 4.0, 0.08, 1.0),
    );
    table.insert_provider("anthropic", Arc::new(anthropic));

    table.insert_provider("openai", Arc::new(openai_rates()));

    // zhipuai and zai are the same backing models under different account
    // routing: one canonical map, referenced under both keys. The generic
    // chat-completion route serves the same GLM catalog.
    let glm = Arc::new(glm_rates());
    table.insert_provider("zhipuai", Arc::clone(&glm));
    table.insert_provider("zai", Arc::clone(&glm));
    table.insert_provider("generic-chat-completion-api", Arc::clone(&glm));

    // Fireworks proxies both the GLM catalog and the larger GPT models.
    let mut fireworks = glm_rates();
    for (model, entry) in openai_rates() {
        if model != "gpt-4o-mini" {
            fireworks.insert(model, entry);
        }
    }
    table.insert_provider("fireworks", Arc::new(fireworks));

    table
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_hit_and_miss() {
        let table = PricingTable::builtin();
        let entry = table.get("zhipuai", "glm-4.6").unwrap();
        assert_eq!(entry.input, 0.5);
        assert_eq!(entry.output, 2.5);

        assert!(table.get("zhipuai", "gpt-4o").is_none());
        assert!(table.get("nonexistent", "glm-4.6").is_none());
    }

    #[test]
    fn test_zhipuai_zai_share_one_map() {
        let table = PricingTable::builtin();
        let zhipuai = table.providers.get("zhipuai").unwrap();
        let zai = table.providers.get("zai").unwrap();
        assert!(Arc::ptr_eq(zhipuai, zai));
    }

    #[test]
    fn test_fireworks_carries_glm_and_gpt() {
        let table = PricingTable::builtin();
        assert!(table.get("fireworks", "glm-4.6").is_some());
        assert!(table.get("fireworks", "gpt-5-codex").is_some());
        assert!(table.get("fireworks", "gpt-4o-mini").is_none());
    }

    #[test]
    fn test_providers_sorted() {
        let providers = PricingTable::builtin().providers();
        let mut sorted = providers.clone();
        sorted.sort();
        assert_eq!(providers, sorted);
        assert!(providers.contains(&"anthropic".to_string()));
        assert!(providers.contains(&"zai".to_string()));
    }
}
