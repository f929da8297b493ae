use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::{ExportError, PipelineError, Stage, TranslationError};
use crate::export::{CommandConverter, DocumentFormat, ExportedDocument, Exporter};
use crate::extract::{AudioExtractor, FfmpegExtractor, AUDIO_FILE_NAME};
use crate::store::{ArtifactHandle, ArtifactStore};
use crate::transcribe::{SpeechToText, Transcript, WhisperApiTranscriber};
use crate::translate::{ChatCompletionGenerator, Language, Translator};
use crate::utils::sanitize_filename;

/// State of a run. Stages 1-3 are strictly sequential; translation and export
/// fan out per language. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    VideoReceived,
    AudioExtracted,
    Transcribed,
    Translating,
    Exporting,
    Completed,
    Failed(Stage),
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::VideoReceived => write!(f, "video-received"),
            RunState::AudioExtracted => write!(f, "audio-extracted"),
            RunState::Transcribed => write!(f, "transcribed"),
            RunState::Translating => write!(f, "translating"),
            RunState::Exporting => write!(f, "exporting"),
            RunState::Completed => write!(f, "completed"),
            RunState::Failed(stage) => write!(f, "failed({stage})"),
        }
    }
}

/// Uploaded video handed to the pipeline: raw bytes plus the original file
/// name (used only for the working-copy name).
#[derive(Debug, Clone)]
pub struct VideoInput {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Outcome for a single target language.
#[derive(Debug)]
pub enum LanguageOutcome {
    /// Translation succeeded; per-format document results follow.
    Translated {
        text: String,
        documents: BTreeMap<DocumentFormat, Result<ExportedDocument, ExportError>>,
    },
    /// Translation failed; no export was attempted for this language.
    Failed(TranslationError),
}

/// Per-language entry of a run report, in the order languages were requested.
#[derive(Debug)]
pub struct LanguageReport {
    pub language: Language,
    pub outcome: LanguageOutcome,
}

impl LanguageReport {
    /// Documents successfully produced for this language.
    pub fn documents(&self) -> Vec<&ExportedDocument> {
        match &self.outcome {
            LanguageOutcome::Translated { documents, .. } => {
                documents.values().filter_map(|r| r.as_ref().ok()).collect()
            }
            LanguageOutcome::Failed(_) => Vec::new(),
        }
    }
}

/// Result of one pipeline run.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub state: RunState,
    pub transcript: Option<Transcript>,
    pub languages: Vec<LanguageReport>,
    pub completed_at: DateTime<Utc>,
}

impl RunReport {
    /// Report for a run that never started (empty language selection).
    fn not_started(run_id: Uuid) -> Self {
        Self {
            run_id,
            state: RunState::Idle,
            transcript: None,
            languages: Vec::new(),
            completed_at: Utc::now(),
        }
    }
}

/// End-to-end translation pipeline for one uploaded video.
///
/// Composes the artifact store, audio extractor, transcriber, translator and
/// exporter; owns the per-stage failure policy and the terminal cleanup step.
/// Multiple runs may execute concurrently: each gets its own working
/// directory and no state is shared across runs.
pub struct TranslationPipeline {
    store: ArtifactStore,
    extractor: Arc<dyn AudioExtractor>,
    transcriber: Arc<dyn SpeechToText>,
    translator: Arc<Translator>,
    exporter: Arc<Exporter>,
    max_concurrent_translations: usize,
}

impl TranslationPipeline {
    /// Wire up the production components from configuration. Fails if an
    /// HTTP client cannot be built with the configured timeout.
    pub fn new(config: &Config) -> crate::Result<Self> {
        let request_timeout = Duration::from_secs(config.service.request_timeout_secs);
        let tool_timeout = Duration::from_secs(config.app.external_tool_timeout_secs);
        let api_key = config.service.api_key();

        let transcriber = WhisperApiTranscriber::new(
            &config.service.endpoint,
            &api_key,
            &config.service.transcription_model,
            request_timeout,
            config.service.retry.clone(),
        )?;
        let generator = ChatCompletionGenerator::new(
            &config.service.endpoint,
            &api_key,
            &config.service.translation_model,
            request_timeout,
            config.service.retry.clone(),
        )?;

        Ok(Self {
            store: ArtifactStore::new(config.app.work_root()),
            extractor: Arc::new(FfmpegExtractor::new(tool_timeout)),
            transcriber: Arc::new(transcriber),
            translator: Arc::new(Translator::new(
                Arc::new(generator),
                config.service.max_completion_tokens,
            )),
            exporter: Arc::new(Exporter::new(Arc::new(CommandConverter::new(tool_timeout)))),
            max_concurrent_translations: config.app.max_concurrent_translations,
        })
    }

    /// Build a pipeline from explicit components.
    pub fn with_components(
        store: ArtifactStore,
        extractor: Arc<dyn AudioExtractor>,
        transcriber: Arc<dyn SpeechToText>,
        translator: Arc<Translator>,
        exporter: Arc<Exporter>,
        max_concurrent_translations: usize,
    ) -> Self {
        Self {
            store,
            extractor,
            transcriber,
            translator,
            exporter,
            max_concurrent_translations,
        }
    }

    /// The store this pipeline writes artifacts into.
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Process one uploaded video into per-language translated documents.
    ///
    /// An empty language selection is a no-op, not an error: the run never
    /// starts and nothing is written. Storage, extraction and transcription
    /// failures abort the run; translation and export failures are recorded
    /// per language in the report. Cleanup of the video copy and audio track
    /// runs on every terminal path and never touches exported documents.
    pub async fn run(
        &self,
        video: VideoInput,
        languages: &[Language],
        formats: &[DocumentFormat],
    ) -> Result<RunReport, PipelineError> {
        let run_id = Uuid::new_v4();

        if languages.is_empty() {
            tracing::info!("Run {}: no target languages selected, nothing to do", run_id);
            return Ok(RunReport::not_started(run_id));
        }

        match self.run_stages(run_id, video, languages, formats).await {
            Ok(report) => Ok(report),
            Err(e) => {
                tracing::error!(
                    "Run {} entered state {}: {}",
                    run_id,
                    RunState::Failed(e.stage()),
                    e
                );
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        run_id: Uuid,
        video: VideoInput,
        languages: &[Language],
        formats: &[DocumentFormat],
    ) -> Result<RunReport, PipelineError> {
        // Reserve an isolated working directory and park a copy of the
        // upload there.
        self.store.reserve(run_id).await?;
        let video_name = format!("source_{}", sanitize_filename(&video.file_name));
        let video_handle = match self.store.write(run_id, &video_name, &video.data).await {
            Ok(handle) => handle,
            Err(e) => {
                self.cleanup(run_id, &[]).await;
                return Err(e.into());
            }
        };
        tracing::info!(
            "Run {} [{}]: video {} ({} bytes), languages: {:?}",
            run_id,
            RunState::VideoReceived,
            video.file_name,
            video.data.len(),
            languages
        );

        // Stage 1: video -> audio.
        let audio_path = self.store.artifact_path(run_id, AUDIO_FILE_NAME);
        let audio = match self
            .extractor
            .extract_audio(video_handle.path(), &audio_path)
            .await
        {
            Ok(audio) => audio,
            Err(e) => {
                self.cleanup(run_id, &[]).await;
                return Err(e.into());
            }
        };
        let audio_handle = self.store.adopt(run_id, audio.path.clone());
        tracing::info!(
            "Run {} [{}]: audio track written ({} bytes)",
            run_id,
            RunState::AudioExtracted,
            audio.size_bytes
        );

        // Stage 2: audio -> transcript.
        let transcript = match self.transcribe(&audio_handle).await {
            Ok(transcript) => transcript,
            Err(e) => {
                self.cleanup(run_id, &[]).await;
                return Err(e.into());
            }
        };
        tracing::info!(
            "Run {} [{}]: transcript has {} characters",
            run_id,
            RunState::Transcribed,
            transcript.text().len()
        );

        // Stages 3-4: per-language fan-out bounded by the concurrency limit.
        // A translation failure downgrades a single language to a recorded
        // partial failure; buffered() keeps results in request order.
        tracing::info!(
            "Run {} [{}]: fanning out over {} language(s)",
            run_id,
            RunState::Translating,
            languages.len()
        );
        let limit = self.max_concurrent_translations.max(1);
        let reports: Vec<LanguageReport> = stream::iter(languages.iter().copied())
            .map(|language| {
                let transcript = transcript.clone();
                async move {
                    self.process_language(run_id, &transcript, language, formats)
                        .await
                }
            })
            .buffered(limit)
            .collect()
            .await;

        // Terminal cleanup: keep exactly the exported documents.
        tracing::debug!("Run {} [{}]: joining export branches", run_id, RunState::Exporting);
        let keep: Vec<PathBuf> = reports
            .iter()
            .flat_map(|r| r.documents())
            .map(|d| d.path.clone())
            .collect();
        self.cleanup(run_id, &keep).await;

        tracing::info!("Run {} [{}]", run_id, RunState::Completed);
        Ok(RunReport {
            run_id,
            state: RunState::Completed,
            transcript: Some(transcript),
            languages: reports,
            completed_at: Utc::now(),
        })
    }

    async fn transcribe(
        &self,
        audio: &ArtifactHandle,
    ) -> Result<Transcript, crate::errors::TranscriptionError> {
        let raw = self.transcriber.transcribe(audio.path()).await?;
        Transcript::from_service_text(raw)
    }

    async fn process_language(
        &self,
        run_id: Uuid,
        transcript: &Transcript,
        language: Language,
        formats: &[DocumentFormat],
    ) -> LanguageReport {
        match self.translator.translate(transcript, language).await {
            Ok(translation) => {
                tracing::info!("Run {}: translated to {}", run_id, language);
                let documents = self
                    .exporter
                    .export(&self.store, run_id, &translation, formats)
                    .await;
                LanguageReport {
                    language,
                    outcome: LanguageOutcome::Translated {
                        text: translation.text,
                        documents,
                    },
                }
            }
            Err(e) => {
                tracing::warn!("Run {}: translation to {} failed: {}", run_id, language, e);
                LanguageReport {
                    language,
                    outcome: LanguageOutcome::Failed(e),
                }
            }
        }
    }

    /// Unconditional finalizer: removes every artifact the run created except
    /// the paths in `keep`. Cleanup trouble is logged, never surfaced; it must
    /// not mask the run's own outcome.
    async fn cleanup(&self, run_id: Uuid, keep: &[PathBuf]) {
        let keep: HashSet<PathBuf> = keep.iter().cloned().collect();
        if let Err(e) = self.store.remove_all_except(run_id, &keep).await {
            tracing::warn!("Run {}: cleanup failed: {}", run_id, e);
        }
    }
}
