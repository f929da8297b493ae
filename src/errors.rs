//! Error types for the translation pipeline.
//!
//! Each pipeline stage has its own error enum. Storage, transcode and
//! transcription errors are fatal to a run; translation and export errors are
//! scoped to a single language (or language/format pair) and are collected
//! into the run report instead of aborting it.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the artifact store. Always fatal to the run.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to create working directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write artifact {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read artifact {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to remove artifact {path}: {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors from the audio extraction stage. Always fatal to the run.
#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("failed to spawn ffmpeg: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("ffmpeg exited with {status}: {stderr}")]
    CommandFailed {
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("ffmpeg timed out after {0} seconds")]
    Timeout(u64),

    #[error("transcoder produced no audio output at {0}")]
    EmptyOutput(PathBuf),
}

/// Errors from the speech-to-text stage. Always fatal to the run.
#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("failed to read audio file {path}: {source}")]
    ReadAudio {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("speech-to-text request failed: {0}")]
    Request(String),

    #[error("speech-to-text service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("speech-to-text service returned an empty transcript")]
    EmptyTranscript,
}

/// Errors from the translation stage. Scoped to one target language; other
/// languages proceed unaffected.
#[derive(Error, Debug)]
pub enum TranslationError {
    #[error("translation request failed: {0}")]
    Request(String),

    #[error("text-generation service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("text-generation service returned an empty completion")]
    EmptyCompletion,
}

/// Errors from document export. Scoped to one (language, format) pair; other
/// formats and languages proceed unaffected.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: &'static str,
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {stderr}")]
    ConverterFailed {
        tool: &'static str,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("{tool} timed out after {seconds} seconds")]
    Timeout { tool: &'static str, seconds: u64 },

    #[error("converter produced no output at {0}")]
    EmptyOutput(PathBuf),

    #[error("storage failure while writing document: {0}")]
    Storage(#[from] StorageError),
}

/// The pipeline stage at which a fatal error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Storage,
    Extract,
    Transcribe,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Storage => write!(f, "storage"),
            Stage::Extract => write!(f, "extract"),
            Stage::Transcribe => write!(f, "transcribe"),
        }
    }
}

/// Fatal pipeline error. Partial failures (translation/export) never surface
/// here; they are recorded in the run report.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("audio extraction failed: {0}")]
    Extract(#[from] TranscodeError),

    #[error("transcription failed: {0}")]
    Transcribe(#[from] TranscriptionError),
}

impl PipelineError {
    /// The stage at which the run failed.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Storage(_) => Stage::Storage,
            PipelineError::Extract(_) => Stage::Extract,
            PipelineError::Transcribe(_) => Stage::Transcribe,
        }
    }
}
