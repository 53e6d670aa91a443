use crate::protocol::UsageInfo;

/// Usage reported on a single choice's finish chunk: only that choice's
/// completion tokens. Full mode sums every choice instead; the two modes
/// intentionally disagree for `n > 1`.
pub fn streaming_usage(prompt_tokens: usize, choice_completion_tokens: usize) -> UsageInfo {
    UsageInfo::new(prompt_tokens, choice_completion_tokens)
}

/// Aggregate usage for a non-streaming response: completion tokens summed
/// across all choices, each choice counting its own tokens.
pub fn full_usage(
    prompt_tokens: usize,
    per_choice_tokens: impl IntoIterator<Item = usize>,
) -> UsageInfo {
    UsageInfo::new(prompt_tokens, per_choice_tokens.into_iter().sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_is_always_prompt_plus_completion() {
        let streaming = streaming_usage(100, 7);
        assert_eq!(streaming.total_tokens, 107);

        let full = full_usage(100, [7, 5, 3]);
        assert_eq!(full.completion_tokens, 15);
        assert_eq!(full.total_tokens, 115);
    }

    #[test]
    fn modes_disagree_for_multi_choice_requests() {
        // Per-choice streaming usage reports one choice; full mode sums all.
        let per_choice = [4usize, 6];
        let finish_frame = streaming_usage(10, per_choice[1]);
        let aggregate = full_usage(10, per_choice);
        assert_eq!(finish_frame.completion_tokens, 6);
        assert_eq!(aggregate.completion_tokens, 10);
    }
}
