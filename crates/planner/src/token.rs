//! Token estimation for prompt budgets, and the per-call completion limit.
//!
//! Character heuristic: 1 token ≈ 4 characters, rounded up. Close enough
//! for BPE tokenizers on English text, and deterministic in tests.

use skein_core::CompletionSettings;

/// Estimate the token count for a string.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Completion tokens for one planner call: the planner budget, capped by
/// the base settings' own limit when they carry one.
pub fn call_budget(settings: &CompletionSettings, max_completion_tokens: u32) -> u32 {
    settings
        .max_tokens
        .map_or(max_completion_tokens, |limit| limit.min(max_completion_tokens))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn rounds_up() {
        assert_eq!(estimate_tokens("test"), 1);
        assert_eq!(estimate_tokens("tests"), 2);
        assert_eq!(estimate_tokens(&"a".repeat(400)), 100);
    }

    #[test]
    fn settings_limit_caps_call_budget() {
        let settings = CompletionSettings::default();
        assert_eq!(call_budget(&settings, 500), 500);
        assert_eq!(call_budget(&settings.clone().with_max_tokens(200), 500), 200);
        assert_eq!(call_budget(&settings.with_max_tokens(900), 500), 500);
    }
}
