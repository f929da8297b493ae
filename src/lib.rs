//! Video Translator - translate a video's speech into multiple languages
//!
//! This library extracts the audio track from an uploaded video, transcribes
//! it via a speech-to-text service, translates the transcript into a set of
//! target languages via a text-generation service, and renders downloadable
//! documents per language in plain-text, rich-text and fixed-layout formats.

pub mod cli;
pub mod config;
pub mod errors;
pub mod export;
pub mod extract;
pub mod pipeline;
pub mod retry;
pub mod store;
pub mod transcribe;
pub mod translate;
pub mod utils;

pub use config::Config;
pub use errors::{
    ExportError, PipelineError, Stage, StorageError, TranscodeError, TranscriptionError,
    TranslationError,
};
pub use export::{DocumentFormat, ExportedDocument, Exporter};
pub use pipeline::{
    LanguageOutcome, LanguageReport, RunReport, RunState, TranslationPipeline, VideoInput,
};
pub use store::ArtifactStore;
pub use transcribe::Transcript;
pub use translate::{Language, Translation, Translator};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;
