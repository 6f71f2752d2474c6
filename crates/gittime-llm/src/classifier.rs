//! LLM-backed [`FeatureClassifier`].

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use gittime_core::{CollaboratorError, FeatureCandidate, FeatureClassifier, RepoSnapshot};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::ChatModel;
use crate::error::{LlmError, Result};
use crate::prompts::{classification_prompt, IDENTIFY_FEATURES_SYSTEM, MAX_FILES_PER_FEATURE};

/// Body of a markdown code fence, optionally tagged `json`.
static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```(?:json)?\s*([\s\S]*?)```").expect("Invalid fenced JSON regex")
});

/// Extract JSON from a reply that may wrap it in a markdown fence.
pub fn parse_json_block(text: &str) -> Result<Value> {
    let mut body = text.trim();
    if let Some(inner) = FENCED_JSON.captures(body).and_then(|c| c.get(1)) {
        body = inner.as_str().trim();
    }
    serde_json::from_str(body).map_err(|e| LlmError::Parse(e.to_string()))
}

/// Turn the model's JSON array into candidates.
///
/// Items without a `name` are dropped; files are capped per feature.
pub fn parse_candidates(text: &str) -> Result<Vec<FeatureCandidate>> {
    let value = parse_json_block(text)?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("features") {
            Some(Value::Array(items)) => items,
            _ => return Err(LlmError::Parse("expected a JSON array of features".into())),
        },
        _ => return Err(LlmError::Parse("expected a JSON array of features".into())),
    };

    let candidates = items
        .into_iter()
        .filter_map(|item| {
            let name = item.get("name")?.as_str()?.trim().to_string();
            if name.is_empty() {
                return None;
            }
            let description = item
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let files = item
                .get("files")
                .and_then(Value::as_array)
                .map(|files| {
                    files
                        .iter()
                        .filter_map(Value::as_str)
                        .take(MAX_FILES_PER_FEATURE)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            Some(FeatureCandidate {
                name,
                description,
                files,
            })
        })
        .collect();
    Ok(candidates)
}

/// Classifies features by prompting a chat model with the repository snapshot.
pub struct LlmClassifier {
    model: Arc<dyn ChatModel>,
    max_tokens: u32,
}

impl LlmClassifier {
    pub fn new(model: Arc<dyn ChatModel>, max_tokens: u32) -> Self {
        Self { model, max_tokens }
    }
}

#[async_trait]
impl FeatureClassifier for LlmClassifier {
    async fn classify(
        &self,
        snapshot: &RepoSnapshot,
    ) -> std::result::Result<Vec<FeatureCandidate>, CollaboratorError> {
        let prompt = classification_prompt(snapshot);
        debug!(repo = %snapshot.repo, prompt_chars = prompt.len(), "classifying features");

        let reply = self
            .model
            .complete(IDENTIFY_FEATURES_SYSTEM, &prompt, self.max_tokens)
            .await?;
        let candidates = parse_candidates(&reply).map_err(|err| {
            warn!(repo = %snapshot.repo, error = %err, "unparseable classifier reply");
            err
        })?;
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Canned(Mutex<Vec<String>>, String);

    #[async_trait]
    impl ChatModel for Canned {
        async fn complete(&self, system: &str, user: &str, _max_tokens: u32) -> Result<String> {
            self.0
                .lock()
                .unwrap()
                .push(format!("{system}\n---\n{user}"));
            Ok(self.1.clone())
        }
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "Here you go:\n```json\n[{\"name\": \"Login\", \"files\": [\"a.rs\"]}]\n```\nThanks";
        let value = parse_json_block(text).unwrap();
        assert_eq!(value[0]["name"], "Login");

        let bare = parse_json_block("  [1, 2]  ").unwrap();
        assert_eq!(bare, serde_json::json!([1, 2]));

        assert!(matches!(parse_json_block("not json"), Err(LlmError::Parse(_))));
    }

    #[test]
    fn test_first_fence_wins_on_repeated_parses() {
        for n in 0..3 {
            let text = format!("```\n{{\"features\": [{n}]}}\n```\n```json\n[]\n```");
            let value = parse_json_block(&text).unwrap();
            assert_eq!(value["features"][0], n, "first fence wins");
        }
    }

    #[test]
    fn test_parse_candidates_drops_unnamed_and_caps_files() {
        let files: Vec<String> = (0..15).map(|i| format!("src/f{i}.rs")).collect();
        let text = serde_json::json!([
            {"name": "Big Feature", "description": "d", "files": files},
            {"description": "no name"},
            {"name": "  ", "files": ["x"]},
            {"name": "No Files"}
        ])
        .to_string();

        let candidates = parse_candidates(&text).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].files.len(), MAX_FILES_PER_FEATURE);
        assert_eq!(candidates[1].name, "No Files");
        assert!(candidates[1].files.is_empty());
    }

    #[test]
    fn test_parse_candidates_rejects_non_array() {
        assert!(matches!(
            parse_candidates("{\"error\": \"nope\"}"),
            Err(LlmError::Parse(_))
        ));
        let wrapped = parse_candidates("{\"features\": [{\"name\": \"A\", \"files\": [\"a\"]}]}").unwrap();
        assert_eq!(wrapped.len(), 1);
    }

    #[tokio::test]
    async fn test_classifier_maps_parse_failure_to_invalid_output() {
        let model = Arc::new(Canned(Mutex::new(Vec::new()), "I cannot help".into()));
        let classifier = LlmClassifier::new(model.clone(), 1024);
        let err = classifier
            .classify(&RepoSnapshot::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::InvalidOutput(_)));

        let prompts = model.0.lock().unwrap();
        assert!(prompts[0].starts_with(IDENTIFY_FEATURES_SYSTEM));
        assert!(prompts[0].contains("## File tree"));
    }
}
