use crate::types::UsageMetadata;

/// Token usage accumulated from `usageMetadata` frames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    prompt_tokens: i64,
    response_tokens: i64,
    total_tokens: i64,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn update_usage(&mut self, usage: &UsageMetadata) {
        self.prompt_tokens += usage.prompt_token_count.unwrap_or(0);
        self.response_tokens += usage.response_token_count.unwrap_or(0);
        self.total_tokens += usage.total_token_count.unwrap_or(0);
    }

    pub fn prompt_tokens(&self) -> i64 {
        self.prompt_tokens
    }

    pub fn response_tokens(&self) -> i64 {
        self.response_tokens
    }

    pub fn total_tokens(&self) -> i64 {
        self.total_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_usage_accumulates_and_ignores_missing_counts() {
        let mut stats = Stats::new();
        stats.update_usage(&UsageMetadata {
            prompt_token_count: Some(10),
            response_token_count: Some(4),
            total_token_count: Some(14),
        });
        stats.update_usage(&UsageMetadata {
            prompt_token_count: None,
            response_token_count: Some(6),
            total_token_count: Some(6),
        });

        assert_eq!(stats.prompt_tokens(), 10);
        assert_eq!(stats.response_tokens(), 10);
        assert_eq!(stats.total_tokens(), 20);
    }
}
