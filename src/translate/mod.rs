use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::RetryConfig;
use crate::errors::TranslationError;
use crate::retry::retry_with_backoff;
use crate::transcribe::Transcript;

/// Target languages offered for translation. Fixed catalog; a run may select
/// any non-empty subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum Language {
    Turkish,
    English,
    French,
    German,
}

impl Language {
    /// English name of the language, as used in prompts and file names.
    pub fn name(&self) -> &'static str {
        match self {
            Language::Turkish => "Turkish",
            Language::English => "English",
            Language::French => "French",
            Language::German => "German",
        }
    }

    /// All languages in the catalog.
    pub fn catalog() -> &'static [Language] {
        &[
            Language::Turkish,
            Language::English,
            Language::French,
            Language::German,
        ]
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Translated text for one (run, target language) pair. Never mutated after
/// creation.
#[derive(Debug, Clone)]
pub struct Translation {
    pub language: Language,
    pub text: String,
}

/// Trait for the external text-generation service.
///
/// Each call is independent; no conversation state is kept between calls.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete `prompt` and return the first completion's text.
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, TranslationError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Text-generation client for an OpenAI-compatible `/v1/chat/completions`
/// endpoint.
pub struct ChatCompletionGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    retry: RetryConfig,
}

impl ChatCompletionGenerator {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        request_timeout: Duration,
        retry: RetryConfig,
    ) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build HTTP client for the text-generation service")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            retry,
        })
    }

    fn api_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.endpoint.trim_end_matches('/')
        )
    }

    /// One request attempt. The outer `Result` is fatal for this language;
    /// the inner one is retryable.
    async fn send_once(
        &self,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<Result<String, TranslationError>, TranslationError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
            }],
            max_tokens,
        };

        let response = match self
            .client
            .post(self.api_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Ok(Err(TranslationError::Request(e.to_string()))),
        };

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            let api_error = TranslationError::Api {
                status: status.as_u16(),
                message,
            };
            if status.is_server_error() || status.as_u16() == 429 {
                return Ok(Err(api_error));
            }
            // Client error, retrying will not help.
            return Err(api_error);
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| TranslationError::Request(format!("invalid response body: {e}")))?;

        match parsed.choices.into_iter().next() {
            Some(choice) => Ok(Ok(choice.message.content)),
            None => Err(TranslationError::EmptyCompletion),
        }
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionGenerator {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, TranslationError> {
        retry_with_backoff(&self.retry, "Text-generation", || {
            self.send_once(prompt, max_tokens)
        })
        .await
    }
}

/// Translates a transcript into target languages, one independent service
/// call per language.
pub struct Translator {
    generator: Arc<dyn TextGenerator>,
    max_completion_tokens: u32,
}

impl Translator {
    pub fn new(generator: Arc<dyn TextGenerator>, max_completion_tokens: u32) -> Self {
        Self {
            generator,
            max_completion_tokens,
        }
    }

    /// Prompt sent to the text-generation service for one language.
    fn build_prompt(transcript: &Transcript, language: Language) -> String {
        format!(
            "Translate the following text to {}. Reply with the translation only.\n\n{}",
            language.name(),
            transcript.text()
        )
    }

    /// Translate the transcript into one target language.
    pub async fn translate(
        &self,
        transcript: &Transcript,
        language: Language,
    ) -> Result<Translation, TranslationError> {
        let prompt = Self::build_prompt(transcript, language);
        let completion = self
            .generator
            .complete(&prompt, self.max_completion_tokens)
            .await?;

        let text = completion.trim().to_string();
        if text.is_empty() {
            return Err(TranslationError::EmptyCompletion);
        }

        Ok(Translation { language, text })
    }
}
