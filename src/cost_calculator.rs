//! Cost calculator module for computing usage costs

use crate::pricing::{PricingEntry, PricingTable};
use crate::types::{Session, TokenCounts};
use tracing::debug;

/// Calculates costs based on token usage and the injected pricing table
///
/// An unknown provider or model prices to exactly zero. New and custom
/// models routinely appear before the rate snapshot catches up, so a miss
/// is an expected steady-state case, not an error.
pub struct CostCalculator {
    pricing: PricingTable,
}

impl CostCalculator {
    /// Create a new CostCalculator around a pricing table
    pub fn new(pricing: PricingTable) -> Self {
        Self { pricing }
    }

    /// Calculate the USD cost of a session
    pub fn calculate(&self, session: &Session) -> f64 {
        self.calculate_tokens(&session.provider, &session.model, &session.tokens)
    }

    /// Calculate the USD cost for raw token counts under a provider/model pair
    ///
    /// No rounding happens here; rounding is a presentation concern.
    /// Negative token counts flow through the formula unchanged.
    pub fn calculate_tokens(&self, provider: &str, model: &str, tokens: &TokenCounts) -> f64 {
        let Some(rates) = self.pricing.get(provider, model) else {
            return 0.0;
        };

        let cost = Self::calculate_from_rates(tokens, rates);
        debug!(
            provider,
            model,
            cost,
            total_tokens = tokens.total(),
            "calculated session cost"
        );
        cost
    }

    /// Pure rate application: tokens/1M × per-million rate, per token kind
    pub fn calculate_from_rates(tokens: &TokenCounts, rates: &PricingEntry) -> f64 {
        let per_million = 1_000_000.0;
        tokens.input_tokens as f64 / per_million * rates.input
            + tokens.output_tokens as f64 / per_million * rates.output
            + tokens.cache_read_tokens as f64 / per_million * rates.cache_read
            + tokens.cache_creation_tokens as f64 / per_million * rates.cache_write
    }

    /// The pricing table backing this calculator
    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: i64, output: i64, cache_read: i64, cache_creation: i64) -> TokenCounts {
        TokenCounts::new(input, output, cache_creation, cache_read, 0)
    }

    #[test]
    fn test_glm_worked_example() {
        let calc = CostCalculator::new(PricingTable::builtin());
        let cost = calc.calculate_tokens(
            "zhipuai",
            "glm-4.6",
            &tokens(1_000_000, 500_000, 100_000, 50_000),
        );
        // 0.5 + 1.25 + 0.005 + 0.0125
        assert!((cost - 1.7675).abs() < 1e-9, "cost was {cost}");
    }

    #[test]
    fn test_gpt_worked_example() {
        let calc = CostCalculator::new(PricingTable::builtin());
        let cost = calc.calculate_tokens(
            "openai",
            "gpt-5-codex",
            &tokens(2_000_000, 1_000_000, 200_000, 100_000),
        );
        // 10.0 + 15.0 + 0.05 + 0.25
        assert!((cost - 25.30).abs() < 1e-9, "cost was {cost}");
    }

    #[test]
    fn test_unknown_provider_or_model_is_zero() {
        let calc = CostCalculator::new(PricingTable::builtin());
        let t = tokens(1_000_000, 1_000_000, 0, 0);
        assert_eq!(calc.calculate_tokens("unknown", "glm-4.6", &t), 0.0);
        assert_eq!(calc.calculate_tokens("zhipuai", "made-up-model", &t), 0.0);
    }

    #[test]
    fn test_cost_linear_in_each_field() {
        let calc = CostCalculator::new(PricingTable::builtin());
        let base = calc.calculate_tokens("zhipuai", "glm-4.6", &tokens(1_000_000, 0, 0, 0));
        let doubled = calc.calculate_tokens("zhipuai", "glm-4.6", &tokens(2_000_000, 0, 0, 0));
        assert!((doubled - 2.0 * base).abs() < 1e-9);

        let out = calc.calculate_tokens("zhipuai", "glm-4.6", &tokens(0, 500_000, 0, 0));
        let combined = calc.calculate_tokens("zhipuai", "glm-4.6", &tokens(1_000_000, 500_000, 0, 0));
        assert!((combined - (base + out)).abs() < 1e-9);
    }

    #[test]
    fn test_negative_tokens_flow_through() {
        let calc = CostCalculator::new(PricingTable::builtin());
        let cost = calc.calculate_tokens("zhipuai", "glm-4", &tokens(-1_000_000, 0, 0, 0));
        assert!((cost + 0.5).abs() < 1e-9);
    }
}
