use crate::generic_types::Speaker;
use std::fmt;

/// One finalized turn of one speaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    pub speaker: Speaker,
    pub text: String,
}

impl fmt::Display for TranscriptLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.speaker, self.text)
    }
}

/// Builds transcript lines out of incremental transcription fragments.
///
/// Fragments accumulate per speaker until the model signals the end of a
/// turn; both buffers are flushed and cleared together at that point.
#[derive(Debug, Default)]
pub struct TurnAggregator {
    user: String,
    assistant: String,
    lines: Vec<TranscriptLine>,
}

impl TurnAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_fragment(&mut self, speaker: Speaker, delta: &str) {
        match speaker {
            Speaker::User => self.user.push_str(delta),
            Speaker::Assistant => self.assistant.push_str(delta),
        }
    }

    /// Finalizes the current turn. User text is emitted before assistant text.
    pub fn on_turn_complete(&mut self) -> Vec<TranscriptLine> {
        let mut finalized = Vec::new();
        for (speaker, buffer) in [
            (Speaker::User, &mut self.user),
            (Speaker::Assistant, &mut self.assistant),
        ] {
            let text = buffer.trim();
            if !text.is_empty() {
                finalized.push(TranscriptLine {
                    speaker,
                    text: text.to_string(),
                });
            }
            buffer.clear();
        }
        self.lines.extend(finalized.iter().cloned());
        finalized
    }

    /// Barge-in only affects playback; partial text stays for the next flush.
    pub fn on_interrupted(&mut self) {}

    pub fn pending(&self, speaker: Speaker) -> &str {
        match speaker {
            Speaker::User => &self.user,
            Speaker::Assistant => &self.assistant,
        }
    }

    pub fn lines(&self) -> &[TranscriptLine] {
        &self.lines
    }

    pub fn reset(&mut self) {
        self.user.clear();
        self.assistant.clear();
        self.lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleaved_fragments_flush_once_per_speaker() {
        // --- Arrange ---
        let mut aggregator = TurnAggregator::new();
        aggregator.on_fragment(Speaker::User, "What is ");
        aggregator.on_fragment(Speaker::Assistant, "Sure, ");
        aggregator.on_fragment(Speaker::User, "a closure?");
        aggregator.on_fragment(Speaker::Assistant, "a closure captures its environment. ");

        // --- Act ---
        let lines = aggregator.on_turn_complete();

        // --- Assert ---
        assert_eq!(
            lines,
            vec![
                TranscriptLine {
                    speaker: Speaker::User,
                    text: "What is a closure?".to_string()
                },
                TranscriptLine {
                    speaker: Speaker::Assistant,
                    text: "Sure, a closure captures its environment.".to_string()
                },
            ]
        );
        assert_eq!(lines[0].to_string(), "You: What is a closure?");
        assert_eq!(aggregator.pending(Speaker::User), "");
        assert_eq!(aggregator.pending(Speaker::Assistant), "");
        assert_eq!(aggregator.lines().len(), 2);
    }

    #[test]
    fn test_blank_buffers_produce_no_line_but_are_cleared() {
        let mut aggregator = TurnAggregator::new();
        aggregator.on_fragment(Speaker::User, "   ");
        aggregator.on_fragment(Speaker::Assistant, "Hello!");

        let lines = aggregator.on_turn_complete();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].to_string(), "AI: Hello!");
        assert_eq!(aggregator.pending(Speaker::User), "");
        assert!(aggregator.on_turn_complete().is_empty());
    }

    #[test]
    fn test_interrupt_keeps_partial_text() {
        let mut aggregator = TurnAggregator::new();
        aggregator.on_fragment(Speaker::Assistant, "I was say");

        aggregator.on_interrupted();

        assert_eq!(aggregator.pending(Speaker::Assistant), "I was say");
        assert!(aggregator.lines().is_empty());
    }

    #[test]
    fn test_reset_clears_history() {
        let mut aggregator = TurnAggregator::new();
        aggregator.on_fragment(Speaker::User, "hi");
        aggregator.on_turn_complete();
        aggregator.on_fragment(Speaker::User, "again");

        aggregator.reset();

        assert!(aggregator.lines().is_empty());
        assert_eq!(aggregator.pending(Speaker::User), "");
    }
}
