//! Judge token usage and cost accounting

use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Token and cost totals for one or more judge calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

impl JudgeUsage {
    /// Price a single call from token counts and per-million-token rates
    pub fn priced(
        prompt_tokens: u64,
        completion_tokens: u64,
        input_cost_per_mtok: f64,
        output_cost_per_mtok: f64,
    ) -> Self {
        let input_cost = prompt_tokens as f64 * input_cost_per_mtok / 1_000_000.0;
        let output_cost = completion_tokens as f64 * output_cost_per_mtok / 1_000_000.0;
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            input_cost,
            output_cost,
            total_cost: input_cost + output_cost,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_tokens == 0 && self.total_cost == 0.0
    }
}

impl Add for JudgeUsage {
    type Output = JudgeUsage;

    fn add(mut self, rhs: JudgeUsage) -> JudgeUsage {
        self += rhs;
        self
    }
}

impl AddAssign for JudgeUsage {
    fn add_assign(&mut self, rhs: JudgeUsage) {
        self.prompt_tokens += rhs.prompt_tokens;
        self.completion_tokens += rhs.completion_tokens;
        self.total_tokens += rhs.total_tokens;
        self.input_cost += rhs.input_cost;
        self.output_cost += rhs.output_cost;
        self.total_cost += rhs.total_cost;
    }
}

impl Sum for JudgeUsage {
    fn sum<I: Iterator<Item = JudgeUsage>>(iter: I) -> Self {
        iter.fold(JudgeUsage::default(), Add::add)
    }
}

impl<'a> Sum<&'a JudgeUsage> for JudgeUsage {
    fn sum<I: Iterator<Item = &'a JudgeUsage>>(iter: I) -> Self {
        iter.copied().sum()
    }
}
