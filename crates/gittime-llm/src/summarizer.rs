//! LLM-backed [`Summarizer`].

use std::sync::Arc;

use async_trait::async_trait;
use gittime_core::{CollaboratorError, CommitContext, Summarizer};
use tracing::debug;

use crate::client::ChatModel;
use crate::prompts::{evolution_prompt, EVOLUTION_SYSTEM};

/// Explains one commit's effect on one feature in a few sentences.
pub struct LlmSummarizer {
    model: Arc<dyn ChatModel>,
    max_tokens: u32,
}

impl LlmSummarizer {
    pub fn new(model: Arc<dyn ChatModel>, max_tokens: u32) -> Self {
        Self { model, max_tokens }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, context: &CommitContext) -> Result<String, CollaboratorError> {
        let prompt = evolution_prompt(context);
        debug!(
            commit = %context.commit.id.short(),
            feature = %context.feature_name,
            prompt_chars = prompt.len(),
            "summarizing commit"
        );
        let text = self
            .model
            .complete(EVOLUTION_SYSTEM, &prompt, self.max_tokens)
            .await?;
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LlmError, Result};
    use chrono::{TimeZone, Utc};
    use gittime_core::{CommitId, CommitMeta};
    use std::sync::Mutex;

    struct Echo {
        seen: Mutex<Option<(String, u32)>>,
        reply: Result<String>,
    }

    #[async_trait]
    impl ChatModel for Echo {
        async fn complete(&self, _system: &str, user: &str, max_tokens: u32) -> Result<String> {
            *self.seen.lock().unwrap() = Some((user.to_string(), max_tokens));
            self.reply.clone()
        }
    }

    fn context() -> CommitContext {
        CommitContext {
            feature_name: "Token Refresh".into(),
            feature_description: "Renews sessions".into(),
            commit: CommitMeta {
                id: CommitId::new("abcdef1234567"),
                author: "dev".into(),
                timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
                message: "Refresh tokens early".into(),
            },
            files: Vec::new(),
            omitted_files: 0,
        }
    }

    #[tokio::test]
    async fn test_summary_uses_rendered_context() {
        let model = Arc::new(Echo {
            seen: Mutex::new(None),
            reply: Ok("  Tokens now refresh before expiry.\n".into()),
        });
        let summarizer = LlmSummarizer::new(model.clone(), 400);

        let text = summarizer.summarize(&context()).await.unwrap();
        assert_eq!(text, "Tokens now refresh before expiry.");

        let (prompt, max_tokens) = model.seen.lock().unwrap().clone().unwrap();
        assert_eq!(max_tokens, 400);
        assert!(prompt.contains("Name: Token Refresh"));
        assert!(prompt.contains("Message: Refresh tokens early"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_collaborator_failure() {
        let model = Arc::new(Echo {
            seen: Mutex::new(None),
            reply: Err(LlmError::Status {
                status: 503,
                message: "overloaded".into(),
            }),
        });
        let err = LlmSummarizer::new(model, 400)
            .summarize(&context())
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Failed(msg) if msg.contains("503")));
    }
}
