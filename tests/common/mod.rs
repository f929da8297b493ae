//! Shared mock service implementations for pipeline integration tests.
//!
//! Mocks stand in for the four external collaborators (transcoder,
//! speech-to-text, text-generation, document converters) and count their
//! invocations so tests can assert which stages ran.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use video_translator::errors::{
    ExportError, TranscodeError, TranscriptionError, TranslationError,
};
use video_translator::export::{DocumentConverter, Exporter};
use video_translator::extract::{AudioArtifact, AudioExtractor};
use video_translator::store::ArtifactStore;
use video_translator::transcribe::SpeechToText;
use video_translator::translate::{Language, TextGenerator, Translator};
use video_translator::TranslationPipeline;

/// Extractor that writes a small fake WAV file, or fails without writing.
pub struct MockExtractor {
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl MockExtractor {
    pub fn ok() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioExtractor for MockExtractor {
    async fn extract_audio(
        &self,
        _video: &Path,
        audio_out: &Path,
    ) -> Result<AudioArtifact, TranscodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(TranscodeError::EmptyOutput(audio_out.to_path_buf()));
        }
        let bytes = b"RIFF-fake-wav";
        tokio::fs::write(audio_out, bytes).await.unwrap();
        Ok(AudioArtifact {
            path: audio_out.to_path_buf(),
            size_bytes: bytes.len() as u64,
        })
    }
}

/// Speech-to-text stub returning a fixed transcript, or an API error.
pub struct MockTranscriber {
    pub text: Option<String>,
    pub calls: AtomicUsize,
}

impl MockTranscriber {
    pub fn with_text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            text: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechToText for MockTranscriber {
    async fn transcribe(&self, _audio: &Path) -> Result<String, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.text {
            Some(text) => Ok(text.clone()),
            None => Err(TranscriptionError::Api {
                status: 500,
                message: "mock transcription outage".to_string(),
            }),
        }
    }
}

/// Text generator that answers `[<Language>] <prompt tail>` style completions
/// and can be told to fail for specific languages.
pub struct MockGenerator {
    pub failing_languages: HashSet<Language>,
    pub calls: AtomicUsize,
}

impl MockGenerator {
    pub fn ok() -> Self {
        Self {
            failing_languages: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_for(languages: &[Language]) -> Self {
        Self {
            failing_languages: languages.iter().copied().collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn target_of(prompt: &str) -> Option<Language> {
        Language::catalog()
            .iter()
            .copied()
            .find(|l| prompt.contains(l.name()))
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String, TranslationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let language = Self::target_of(prompt)
            .ok_or_else(|| TranslationError::Request("no target language in prompt".to_string()))?;
        if self.failing_languages.contains(&language) {
            return Err(TranslationError::Api {
                status: 503,
                message: format!("mock outage for {language}"),
            });
        }
        Ok(format!("translated-{language}"))
    }
}

/// Converter that writes placeholder document bytes, optionally failing for
/// one of the two conversion paths.
pub struct MockConverter {
    pub fail_pdf: bool,
}

impl MockConverter {
    pub fn ok() -> Self {
        Self { fail_pdf: false }
    }

    pub fn failing_pdf() -> Self {
        Self { fail_pdf: true }
    }
}

#[async_trait]
impl DocumentConverter for MockConverter {
    async fn html_to_docx(&self, _html: &str, output: &Path) -> Result<(), ExportError> {
        tokio::fs::write(output, b"mock-docx").await.unwrap();
        Ok(())
    }

    async fn html_to_pdf(&self, _html: &str, output: &Path) -> Result<(), ExportError> {
        if self.fail_pdf {
            return Err(ExportError::EmptyOutput(output.to_path_buf()));
        }
        tokio::fs::write(output, b"mock-pdf").await.unwrap();
        Ok(())
    }
}

/// Assemble a pipeline over `root` from the given mocks.
pub fn pipeline_with(
    root: &Path,
    extractor: Arc<MockExtractor>,
    transcriber: Arc<MockTranscriber>,
    generator: Arc<MockGenerator>,
    converter: Arc<MockConverter>,
) -> TranslationPipeline {
    TranslationPipeline::with_components(
        ArtifactStore::new(root),
        extractor,
        transcriber,
        Arc::new(Translator::new(generator, 1000)),
        Arc::new(Exporter::new(converter)),
        2,
    )
}

/// Number of run directories currently under the store root.
pub fn run_dir_count(root: &Path) -> usize {
    std::fs::read_dir(root)
        .map(|entries| entries.filter_map(|e| e.ok()).count())
        .unwrap_or(0)
}
