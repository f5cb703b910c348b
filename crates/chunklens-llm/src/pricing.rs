//! Token pricing and per-call cost computation.

use serde::{Deserialize, Serialize};

use crate::provider::Completion;

const TOKENS_PER_UNIT: f64 = 1_000_000.0;

/// USD price per million input and output tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl ModelPricing {
    pub const FREE: Self = Self {
        input_per_million: 0.0,
        output_per_million: 0.0,
    };

    #[must_use]
    pub fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    /// Price a call from its token counts.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> CallCost {
        let input_cost = self.input_per_million * input_tokens as f64 / TOKENS_PER_UNIT;
        let output_cost = self.output_per_million * output_tokens as f64 / TOKENS_PER_UNIT;
        CallCost {
            input_tokens,
            output_tokens,
            input_cost,
            output_cost,
            total_cost: input_cost + output_cost,
        }
    }

    #[must_use]
    pub fn cost_of(&self, completion: &Completion) -> CallCost {
        self.cost(completion.input_tokens, completion.output_tokens)
    }

    /// Published pricing for well-known models, matched by longest model-name prefix.
    ///
    /// Unknown models are priced as [`ModelPricing::FREE`].
    #[must_use]
    pub fn for_model(model: &str) -> Self {
        const KNOWN: &[(&str, f64, f64)] = &[
            ("gpt-4o-mini", 0.15, 0.60),
            ("gpt-4o", 2.50, 10.00),
            ("gpt-4.1-nano", 0.10, 0.40),
            ("gpt-4.1-mini", 0.40, 1.60),
            ("gpt-4.1", 2.00, 8.00),
            ("gpt-3.5-turbo", 0.50, 1.50),
        ];
        KNOWN
            .iter()
            .filter(|(prefix, _, _)| model.starts_with(prefix))
            .max_by_key(|(prefix, _, _)| prefix.len())
            .map_or_else(
                || {
                    tracing::debug!(model, "no pricing entry, treating calls as free");
                    Self::FREE
                },
                |&(_, input, output)| Self::new(input, output),
            )
    }
}

/// Token usage and monetary cost of one LLM call.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CallCost {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

impl CallCost {
    /// Sum of several calls.
    #[must_use]
    pub fn sum<'a>(costs: impl IntoIterator<Item = &'a CallCost>) -> Self {
        costs.into_iter().fold(Self::default(), |acc, c| Self {
            input_tokens: acc.input_tokens + c.input_tokens,
            output_tokens: acc.output_tokens + c.output_tokens,
            input_cost: acc.input_cost + c.input_cost,
            output_cost: acc.output_cost + c.output_cost,
            total_cost: acc.total_cost + c.total_cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn cost_splits_input_and_output() {
        let pricing = ModelPricing::new(0.15, 0.60);
        let cost = pricing.cost(1500, 250);
        assert!((cost.input_cost - 0.000_225).abs() < EPS);
        assert!((cost.output_cost - 0.000_15).abs() < EPS);
        assert!((cost.total_cost - 0.000_375).abs() < EPS);
    }

    #[test]
    fn free_pricing_costs_nothing() {
        let cost = ModelPricing::FREE.cost(10_000, 10_000);
        assert!(cost.total_cost.abs() < EPS);
        assert_eq!(cost.input_tokens, 10_000);
    }

    #[test]
    fn for_model_prefers_longest_prefix() {
        assert_eq!(ModelPricing::for_model("gpt-4o-mini-2024-07-18"), ModelPricing::new(0.15, 0.60));
        assert_eq!(ModelPricing::for_model("gpt-4o-2024-08-06"), ModelPricing::new(2.50, 10.00));
    }

    #[test]
    fn for_model_unknown_is_free() {
        assert_eq!(ModelPricing::for_model("llama3.2"), ModelPricing::FREE);
    }

    #[test]
    fn sum_accumulates_every_field() {
        let pricing = ModelPricing::new(0.15, 0.60);
        let costs = [pricing.cost(1500, 250), pricing.cost(2000, 333)];
        let total = CallCost::sum(&costs);
        assert_eq!(total.input_tokens, 3500);
        assert_eq!(total.output_tokens, 583);
        assert!((total.total_cost - (costs[0].total_cost + costs[1].total_cost)).abs() < EPS);
    }

    #[test]
    fn cost_of_uses_completion_usage() {
        let completion = Completion {
            content: "x".into(),
            input_tokens: 1000,
            output_tokens: 0,
        };
        let cost = ModelPricing::new(1.0, 1.0).cost_of(&completion);
        assert!((cost.total_cost - 0.001).abs() < EPS);
    }
}
