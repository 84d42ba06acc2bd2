//! Token usage reported by providers.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

/// Token counts for a single request/response pair.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt (messages + tool definitions).
    pub input_tokens: u64,
    /// Tokens produced by the model.
    pub output_tokens: u64,
    /// Tokens spent on hidden reasoning, when the provider reports them.
    pub reasoning_tokens: Option<u64>,
}

impl AddAssign<&Usage> for Usage {
    /// Field-wise saturating addition; an optional field stays `None`
    /// only when both sides are `None`.
    fn add_assign(&mut self, rhs: &Self) {
        self.input_tokens = self.input_tokens.saturating_add(rhs.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(rhs.output_tokens);
        self.reasoning_tokens = match (self.reasoning_tokens, rhs.reasoning_tokens) {
            (Some(a), Some(b)) => Some(a.saturating_add(b)),
            (a, b) => a.or(b),
        };
    }
}
