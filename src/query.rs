//! Query pipeline: history-aware rewriting, retrieval with a relevance
//! gate, and grounded generation.
//!
//! [`QueryPipeline::answer`] never raises. It sits on a user-facing
//! request path where a hard failure is worse than a generic reply, so
//! every internal error degrades to [`FALLBACK_REPLY`]. Callers that
//! want to distinguish a real answer from a degraded one use
//! [`QueryPipeline::answer_checked`] and inspect the [`QueryOutcome`].

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::generation::GenerationProvider;
use crate::index::VectorIndex;
use crate::models::{ChatMessage, Role};

/// The only failure mode the caller ever sees.
pub const FALLBACK_REPLY: &str = "I'm sorry, I encountered a problem while processing your question. Please try again or rephrase your question.";

/// Rewriting instruction. The raw question may lean on pronouns or
/// ellipsis resolvable only through prior turns; retrieval on the raw
/// text degrades recall.
const CONTEXTUALIZE_INSTRUCTION: &str = "Given the chat history, rewrite the user's question to be fully self-contained. Don't provide any answers, code or explanation. Simply rewrite the user's question to be fully self-contained. Only provide a single line question as output.";

const ANSWER_INSTRUCTION: &str = "You are a helpful assistant. Use the following context to answer the user's question. If unsure, say you don't know.";

/// Result of one query, distinguishing a grounded answer from the
/// degraded fallback.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    Answered {
        text: String,
        /// The self-contained rewrite actually used for retrieval.
        standalone_query: String,
        /// Whether the relevance gate kept any snippet, or retrieval
        /// fell back to the unfiltered top-k.
        gated: bool,
    },
    Fallback {
        reason: String,
    },
}

impl QueryOutcome {
    pub fn into_text(self) -> String {
        match self {
            QueryOutcome::Answered { text, .. } => text,
            QueryOutcome::Fallback { .. } => FALLBACK_REPLY.to_string(),
        }
    }
}

pub struct QueryPipeline {
    index: Arc<VectorIndex>,
    generator: Arc<dyn GenerationProvider>,
    retrieval: RetrievalConfig,
}

impl QueryPipeline {
    pub fn new(
        index: Arc<VectorIndex>,
        generator: Arc<dyn GenerationProvider>,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            index,
            generator,
            retrieval,
        }
    }

    /// Answer a question against a conversation's knowledge scope.
    /// Never raises: any failure yields [`FALLBACK_REPLY`].
    pub async fn answer(
        &self,
        conversation_id: &str,
        history: &[ChatMessage],
        question: &str,
    ) -> String {
        self.answer_checked(conversation_id, history, question)
            .await
            .into_text()
    }

    /// As [`answer`](Self::answer), but exposing whether the reply is a
    /// grounded answer or the degraded fallback.
    pub async fn answer_checked(
        &self,
        conversation_id: &str,
        history: &[ChatMessage],
        question: &str,
    ) -> QueryOutcome {
        match self.run(conversation_id, history, question).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(conversation_id, "query degraded to fallback: {}", e);
                QueryOutcome::Fallback {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn run(
        &self,
        conversation_id: &str,
        history: &[ChatMessage],
        question: &str,
    ) -> Result<QueryOutcome> {
        let window = history_window(history, self.retrieval.history_window);

        // Rewrite into a self-contained query before retrieval.
        let rewrite = self
            .generator
            .invoke(CONTEXTUALIZE_INSTRUCTION, &window, question)
            .await?;
        let standalone_query = match single_line(&rewrite) {
            Some(line) => line,
            None => question.trim().to_string(),
        };
        debug!(conversation_id, %standalone_query, "rewrote question");

        let hits = self
            .index
            .search(conversation_id, &standalone_query, self.retrieval.top_k)
            .await?;

        // Relevance gate. A sparse or off-topic knowledge base can push
        // every hit past the threshold; the gate is a quality filter,
        // not a requirement of having context, so fall back to the
        // unfiltered top-k rather than answering with nothing.
        let kept: Vec<&str> = hits
            .iter()
            .filter(|h| h.distance < self.retrieval.max_distance)
            .map(|h| h.chunk.text.as_str())
            .collect();
        let gated = !kept.is_empty();
        let snippets: Vec<&str> = if gated {
            kept
        } else {
            hits.iter().map(|h| h.chunk.text.as_str()).collect()
        };
        let context = snippets.join("\n\n");
        debug!(
            conversation_id,
            retrieved = hits.len(),
            kept = snippets.len(),
            gated,
            "built retrieval context"
        );

        let system = format!("{}\nContext:\n{}", ANSWER_INSTRUCTION, context);
        let text = self
            .generator
            .invoke(&system, &window, &standalone_query)
            .await?;

        Ok(QueryOutcome::Answered {
            text,
            standalone_query,
            gated,
        })
    }
}

/// The most recent `n` user/assistant messages, chronological order.
/// System messages never enter the window.
fn history_window(history: &[ChatMessage], n: usize) -> Vec<ChatMessage> {
    let filtered: Vec<&ChatMessage> = history
        .iter()
        .filter(|m| matches!(m.role, Role::User | Role::Assistant))
        .collect();
    let start = filtered.len().saturating_sub(n);
    filtered[start..].iter().map(|m| (*m).clone()).collect()
}

/// First non-empty line of the model's rewrite, or `None` when the
/// output is blank.
fn single_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: Role, content: &str) -> ChatMessage {
        ChatMessage::new(role, content)
    }

    #[test]
    fn window_drops_system_messages() {
        let history = vec![
            msg(Role::System, "Processed 1 documents: a.txt"),
            msg(Role::User, "hello"),
            msg(Role::Assistant, "hi"),
        ];
        let window = history_window(&history, 6);
        assert_eq!(window.len(), 2);
        assert!(window.iter().all(|m| m.role != Role::System));
    }

    #[test]
    fn window_keeps_most_recent_in_order() {
        let history: Vec<ChatMessage> = (0..10)
            .map(|i| {
                let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
                msg(role, &format!("turn {}", i))
            })
            .collect();
        let window = history_window(&history, 6);
        assert_eq!(window.len(), 6);
        assert_eq!(window[0].content, "turn 4");
        assert_eq!(window[5].content, "turn 9");
    }

    #[test]
    fn single_line_takes_first_non_empty() {
        assert_eq!(
            single_line("\n  What is Rust?  \nextra"),
            Some("What is Rust?".to_string())
        );
        assert_eq!(single_line("   \n  \n"), None);
        assert_eq!(single_line(""), None);
    }
}
