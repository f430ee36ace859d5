//! Transcript summarization through the completion gateway.
//!
//! Short transcripts go out in a single request. Long ones are summarized
//! window by window and the partial summaries folded together until one
//! request fits, so no request ever carries an unbounded transcript.

use std::sync::Arc;

use colloquy_core::config::AnalysisConfig;
use colloquy_core::error::{ColloquyError, Result};
use colloquy_core::types::{transcript_text, Message};
use colloquy_gateway::{CompletionRequest, CompletionResponse, TextCompletionGateway};
use tracing::debug;

/// Upper bound on reduce passes. Each pass shrinks text through
/// re-summarization, so three passes cover any realistic transcript.
const MAX_REDUCE_PASSES: usize = 3;

/// Produces conversation summaries, chunking when the transcript exceeds
/// the configured window.
pub struct Summarizer<G> {
    gateway: Arc<G>,
    config: AnalysisConfig,
}

impl<G: TextCompletionGateway> Summarizer<G> {
    pub fn new(gateway: Arc<G>, config: AnalysisConfig) -> Self {
        Self { gateway, config }
    }

    /// Summarize a message history.
    ///
    /// A history that fits one window (by message count or by transcript
    /// length) is summarized in exactly one gateway call, so chunking never
    /// changes the result for short conversations.
    pub async fn summarize(&self, messages: &[Message]) -> Result<CompletionResponse> {
        let transcript = transcript_text(messages);
        if messages.len() <= self.config.chunk_size
            || transcript.chars().count() <= self.config.chunk_threshold_chars
        {
            return self.request_summary(&transcript).await;
        }

        debug!(
            messages = messages.len(),
            chars = transcript.chars().count(),
            "Transcript exceeds one window, summarizing in chunks"
        );
        let mut pieces = Vec::with_capacity(messages.len() / self.config.chunk_size + 1);
        for window in messages.chunks(self.config.chunk_size) {
            let piece = self.request_summary(&transcript_text(window)).await?;
            pieces.push(piece.text);
        }
        self.reduce(pieces).await
    }

    /// Fold window summaries into a single summary. Each pass groups pieces
    /// under the size threshold and re-summarizes every group.
    async fn reduce(&self, mut pieces: Vec<String>) -> Result<CompletionResponse> {
        let mut passes = 0;
        loop {
            let joined = pieces.join("\n");
            if pieces.len() == 1
                || joined.chars().count() <= self.config.chunk_threshold_chars
                || passes >= MAX_REDUCE_PASSES
            {
                return self.request_summary(&joined).await;
            }
            passes += 1;
            let mut next = Vec::new();
            for batch in batch_by_chars(&pieces, self.config.chunk_threshold_chars) {
                let summary = self.request_summary(&batch).await?;
                next.push(summary.text);
            }
            debug!(pass = passes, pieces = next.len(), "Reduced summary pieces");
            pieces = next;
        }
    }

    async fn request_summary(&self, text: &str) -> Result<CompletionResponse> {
        let prompt = format!(
            "Summarize this conversation in at most {} sentences, highlighting the main topics, \
             key decisions, and outcomes.\n\n{}",
            self.config.summary_target_sentences, text
        );
        let request = CompletionRequest::new(prompt)
            .with_max_tokens(self.config.summary_max_tokens)
            .with_temperature(self.config.summary_temperature);

        let mut response = self.gateway.complete(request).await?;
        response.text = response.text.trim().to_string();
        if response.text.is_empty() {
            return Err(ColloquyError::ProviderUnavailable(
                "summary completion was empty".to_string(),
            ));
        }
        Ok(response)
    }
}

/// Greedily group strings so each group's joined length stays within
/// `max_chars`. A single oversize string gets a group of its own.
fn batch_by_chars(pieces: &[String], max_chars: usize) -> Vec<String> {
    let mut batches = Vec::new();
    let mut current = String::new();
    for piece in pieces {
        if !current.is_empty()
            && current.chars().count() + 1 + piece.chars().count() > max_chars
        {
            batches.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(piece);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_core::types::Sender;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    fn messages(contents: &[&str]) -> Vec<Message> {
        let conv_id = Uuid::new_v4();
        contents
            .iter()
            .map(|c| Message::new(conv_id, Sender::User, *c))
            .collect()
    }

    fn config(chunk_size: usize, chunk_threshold_chars: usize) -> AnalysisConfig {
        AnalysisConfig {
            chunk_size,
            chunk_threshold_chars,
            ..AnalysisConfig::default()
        }
    }

    /// Returns a fixed text and counts calls.
    struct CountingGateway {
        text: &'static str,
        calls: AtomicUsize,
    }

    impl CountingGateway {
        fn new(text: &'static str) -> Self {
            Self {
                text,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TextCompletionGateway for CountingGateway {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> std::result::Result<CompletionResponse, ColloquyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CompletionResponse {
                text: self.text.to_string(),
                provider: "test".to_string(),
                degraded: false,
            })
        }
    }

    /// Records every request it receives.
    struct RecordingGateway {
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl RecordingGateway {
        fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl TextCompletionGateway for RecordingGateway {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> std::result::Result<CompletionResponse, ColloquyError> {
            self.requests.lock().unwrap().push(request);
            Ok(CompletionResponse {
                text: "recorded summary".to_string(),
                provider: "test".to_string(),
                degraded: false,
            })
        }
    }

    #[tokio::test]
    async fn test_short_history_is_one_request() {
        let gateway = Arc::new(CountingGateway::new("a tidy summary"));
        let summarizer = Summarizer::new(gateway.clone(), config(20, 6000));
        let response = summarizer
            .summarize(&messages(&["hello", "hi there", "bye"]))
            .await
            .unwrap();
        assert_eq!(response.text, "a tidy summary");
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exactly_one_window_is_one_request() {
        let gateway = Arc::new(CountingGateway::new("summary"));
        let summarizer = Summarizer::new(gateway.clone(), config(3, 10));
        // Three messages fill the window exactly; length is over the char
        // threshold but the message-count branch still takes the direct path.
        let history = messages(&["aaaaaaaaaa", "bbbbbbbbbb", "cccccccccc"]);
        summarizer.summarize(&history).await.unwrap();
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_long_history_chunks_then_reduces() {
        let gateway = Arc::new(CountingGateway::new("piece summary"));
        let summarizer = Summarizer::new(gateway.clone(), config(2, 50));
        // Six messages of 10 chars each: the transcript is over 50 chars and
        // over the 2-message window, so three window calls run, then the
        // three short pieces join under the threshold for one final call.
        let history = messages(&[
            "aaaaaaaaaa",
            "bbbbbbbbbb",
            "cccccccccc",
            "dddddddddd",
            "eeeeeeeeee",
            "ffffffffff",
        ]);
        let response = summarizer.summarize(&history).await.unwrap();
        assert_eq!(response.text, "piece summary");
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_reduce_passes_are_bounded() {
        // Every completion is longer than the threshold, so reduction can
        // never converge on its own; the pass bound must cut it off.
        let gateway = Arc::new(CountingGateway::new(
            "an obstinately long summary that stays over the configured threshold",
        ));
        let summarizer = Summarizer::new(gateway.clone(), config(1, 50));
        let history = messages(&[
            "0123456789012345678901234567890123456789",
            "0123456789012345678901234567890123456789",
        ]);
        let response = summarizer.summarize(&history).await.unwrap();
        assert!(!response.text.is_empty());
        // 2 window calls, 2 calls per reduce pass for 3 passes, 1 final.
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn test_summary_prompt_shape() {
        let gateway = Arc::new(RecordingGateway::new());
        let summarizer = Summarizer::new(gateway.clone(), AnalysisConfig::default());
        summarizer.summarize(&messages(&["hello world"])).await.unwrap();

        let requests = gateway.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert!(request
            .prompt
            .starts_with("Summarize this conversation in at most 3 sentences"));
        assert!(request.prompt.contains("user: hello world"));
        assert_eq!(request.max_tokens, 200);
        assert!((request.temperature - 0.5).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_blank_completion_is_an_error() {
        let gateway = Arc::new(CountingGateway::new("   \n  "));
        let summarizer = Summarizer::new(gateway, AnalysisConfig::default());
        let err = summarizer
            .summarize(&messages(&["hello"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ColloquyError::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn test_completion_whitespace_trimmed() {
        let gateway = Arc::new(CountingGateway::new("  neat summary \n"));
        let summarizer = Summarizer::new(gateway, AnalysisConfig::default());
        let response = summarizer.summarize(&messages(&["hello"])).await.unwrap();
        assert_eq!(response.text, "neat summary");
    }

    // ---- batch_by_chars ----

    #[test]
    fn test_batch_groups_under_limit() {
        let pieces = vec!["aaaa".to_string(), "bbbb".to_string(), "cccc".to_string()];
        let batches = batch_by_chars(&pieces, 9);
        assert_eq!(batches, vec!["aaaa\nbbbb".to_string(), "cccc".to_string()]);
    }

    #[test]
    fn test_batch_isolates_oversize_piece() {
        let pieces = vec!["x".repeat(20)];
        let batches = batch_by_chars(&pieces, 5);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].chars().count(), 20);
    }

    #[test]
    fn test_batch_empty_input() {
        assert!(batch_by_chars(&[], 10).is_empty());
    }
}
