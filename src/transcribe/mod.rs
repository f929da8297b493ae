use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;

use crate::config::RetryConfig;
use crate::errors::TranscriptionError;
use crate::retry::retry_with_backoff;

/// Plain-text transcription of a run's audio track.
///
/// Created once per run, immutable, shared read-only by every per-language
/// translation. The source language is whatever the speech-to-text service
/// auto-detected.
#[derive(Debug, Clone)]
pub struct Transcript {
    text: String,
}

impl Transcript {
    /// Build a transcript from the raw service response, rejecting empty or
    /// whitespace-only results.
    pub fn from_service_text(text: String) -> Result<Self, TranscriptionError> {
        if text.trim().is_empty() {
            return Err(TranscriptionError::EmptyTranscript);
        }
        Ok(Self { text })
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Trait for the external speech-to-text service.
///
/// The audio file is sent whole; no chunking or streaming.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe the audio file at `audio` and return the raw reported text.
    async fn transcribe(&self, audio: &Path) -> Result<String, TranscriptionError>;
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Speech-to-text client for an OpenAI-compatible `/v1/audio/transcriptions`
/// endpoint (Whisper).
pub struct WhisperApiTranscriber {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    retry: RetryConfig,
}

impl WhisperApiTranscriber {
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
            .context("Failed to build HTTP client for the speech-to-text service")?;
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
            "{}/v1/audio/transcriptions",
            self.endpoint.trim_end_matches('/')
        )
    }

    /// One request attempt. The outer `Result` is fatal (do not retry); the
    /// inner one is retryable (network trouble, 5xx, rate limiting).
    async fn send_once(
        &self,
        audio: &Path,
    ) -> Result<Result<String, TranscriptionError>, TranscriptionError> {
        let bytes = tokio::fs::read(audio)
            .await
            .map_err(|source| TranscriptionError::ReadAudio {
                path: audio.to_path_buf(),
                source,
            })?;

        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.wav".to_string());

        let form = multipart::Form::new().text("model", self.model.clone()).part(
            "file",
            multipart::Part::bytes(bytes)
                .file_name(file_name)
                .mime_str("audio/wav")
                .map_err(|e| TranscriptionError::Request(e.to_string()))?,
        );

        let response = match self
            .client
            .post(self.api_url())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Ok(Err(TranscriptionError::Request(e.to_string()))),
        };

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            let api_error = TranscriptionError::Api {
                status: status.as_u16(),
                message,
            };
            if status.is_server_error() || status.as_u16() == 429 {
                return Ok(Err(api_error));
            }
            // Client error, retrying will not help.
            return Err(api_error);
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionError::Request(format!("invalid response body: {e}")))?;
        Ok(Ok(parsed.text))
    }
}

#[async_trait]
impl SpeechToText for WhisperApiTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<String, TranscriptionError> {
        retry_with_backoff(&self.retry, "Speech-to-text", || self.send_once(audio)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_rejects_empty_service_text() {
        assert!(matches!(
            Transcript::from_service_text(String::new()),
            Err(TranscriptionError::EmptyTranscript)
        ));
        assert!(matches!(
            Transcript::from_service_text("   \n".to_string()),
            Err(TranscriptionError::EmptyTranscript)
        ));
    }

    #[test]
    fn test_transcript_keeps_text_verbatim() {
        let transcript = Transcript::from_service_text("hello world".to_string()).unwrap();
        assert_eq!(transcript.text(), "hello world");
    }

    #[test]
    fn test_transcription_response_parses_text_field() {
        let body = r#"{"text":"hello world"}"#;
        let parsed: TranscriptionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.text, "hello world");
    }

    #[test]
    fn test_api_url_normalizes_trailing_slash() {
        let t = WhisperApiTranscriber::new(
            "https://api.openai.com/",
            "key",
            "whisper-1",
            Duration::from_secs(1),
            RetryConfig::default(),
        )
        .unwrap();
        assert_eq!(
            t.api_url(),
            "https://api.openai.com/v1/audio/transcriptions"
        );
    }
}
