//! Token estimation for context-window budgeting
//!
//! Character heuristic: 1 token ≈ 4 characters, rounded up, with a 10%
//! safety margin when checking a budget.

/// Characters per token for the estimate
pub const CHARS_PER_TOKEN: usize = 4;

/// Token counter with heuristic-based estimation
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCounter;

impl TokenCounter {
    /// Create new token counter
    pub fn new() -> Self {
        Self
    }

    /// Estimate token count for text (⌈chars / 4⌉)
    pub fn estimate(&self, text: &str) -> usize {
        let char_count = text.chars().count();
        (char_count + CHARS_PER_TOKEN - 1) / CHARS_PER_TOKEN
    }

    /// Conservative estimate (110%, rounded up)
    pub fn upper_bound(&self, text: &str) -> usize {
        let base = self.estimate(text);
        base + (base + 9) / 10
    }

    /// Whether `text` fits into `budget` tokens using the conservative estimate
    pub fn fits(&self, text: &str, budget: usize) -> bool {
        self.upper_bound(text) <= budget
    }

    /// Character length that corresponds to `tokens`
    pub fn chars_for(&self, tokens: usize) -> usize {
        tokens * CHARS_PER_TOKEN
    }
}
