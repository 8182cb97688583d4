//! Token usage and cost accounting.
use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use tracing::debug;

use crate::config::ConfigError;
use crate::model::Model;

/// Token counts reported for a single buffered completion.
///
/// `total_tokens` always equals `prompt_tokens + completion_tokens`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageRecord {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl UsageRecord {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Usage object as sent by the API. Every field may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl From<ApiUsage> for UsageRecord {
    fn from(usage: ApiUsage) -> Self {
        let record = UsageRecord::new(usage.prompt_tokens, usage.completion_tokens);
        if usage.total_tokens != record.total_tokens {
            debug!(
                reported = usage.total_tokens,
                computed = record.total_tokens,
                "API total_tokens differs from prompt + completion"
            );
        }
        record
    }
}

/// USD price per thousand tokens for one model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelRate {
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64,
}

impl ModelRate {
    pub const fn new(prompt_per_1k: f64, completion_per_1k: f64) -> Self {
        Self {
            prompt_per_1k,
            completion_per_1k,
        }
    }
}

/// An estimated cost in USD.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct CostEstimate {
    pub usd: f64,
}

impl fmt::Display for CostEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.3}", self.usd)
    }
}

/// Per-model rates keyed by API model id.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingTable {
    rates: HashMap<String, ModelRate>,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::new()
            .with_rate(Model::Grok3Beta.as_str(), ModelRate::new(0.005, 0.015))
            .with_rate(Model::Grok3MiniBeta.as_str(), ModelRate::new(0.002, 0.006))
    }
}

impl PricingTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            rates: HashMap::new(),
        }
    }

    pub fn with_rate(mut self, model_id: &str, rate: ModelRate) -> Self {
        self.set_rate(model_id, rate);
        self
    }

    pub fn set_rate(&mut self, model_id: &str, rate: ModelRate) {
        self.rates.insert(model_id.to_string(), rate);
    }

    pub fn rate(&self, model_id: &str) -> Result<ModelRate, ConfigError> {
        self.rates
            .get(model_id)
            .copied()
            .ok_or_else(|| ConfigError::UnknownModelRate(model_id.to_string()))
    }

    /// Estimates the cost of `usage` on `model_id`.
    ///
    /// Fails for models without a rate instead of guessing one.
    pub fn estimate(&self, usage: &UsageRecord, model_id: &str) -> Result<CostEstimate, ConfigError> {
        let rate = self.rate(model_id)?;
        let prompt_cost = usage.prompt_tokens as f64 / 1000.0 * rate.prompt_per_1k;
        let completion_cost = usage.completion_tokens as f64 / 1000.0 * rate.completion_per_1k;
        Ok(CostEstimate {
            usd: prompt_cost + completion_cost,
        })
    }
}
