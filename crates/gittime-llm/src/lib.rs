//! gittime-llm: chat-model collaborators for GitTime
//!
//! [`LlmClassifier`] and [`LlmSummarizer`] implement the core
//! `FeatureClassifier` and `Summarizer` traits over any [`ChatModel`];
//! [`ChatClient`] is the OpenAI-compatible HTTP model.

pub mod classifier;
pub mod client;
pub mod config;
pub mod error;
pub mod prompts;
pub mod summarizer;

pub use classifier::{parse_candidates, parse_json_block, LlmClassifier};
pub use client::{ChatClient, ChatModel, Message, Role};
pub use config::{LlmConfig, API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use error::{LlmError, Result};
pub use summarizer::LlmSummarizer;
