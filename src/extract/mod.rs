use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::errors::TranscodeError;

/// File name of the extracted audio track inside a run directory.
pub const AUDIO_FILE_NAME: &str = "audio.wav";

/// Fixed output profile for extracted audio: 16 kHz mono 16-bit PCM WAV.
/// Deterministic so every downstream stage sees the same container/codec.
pub const AUDIO_SAMPLE_RATE: u32 = 16_000;
pub const AUDIO_CHANNELS: u32 = 1;

/// The extracted audio track for a run.
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    /// Path of the written audio file.
    pub path: PathBuf,

    /// Size of the audio file in bytes.
    pub size_bytes: u64,
}

/// Trait for pulling the audio track out of a video container.
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Extract the audio track of `video` into `audio_out`.
    ///
    /// Succeeds only if the output file exists and is non-empty.
    async fn extract_audio(
        &self,
        video: &Path,
        audio_out: &Path,
    ) -> Result<AudioArtifact, TranscodeError>;
}

/// Production extractor that shells out to ffmpeg.
pub struct FfmpegExtractor {
    timeout: Duration,
}

impl FfmpegExtractor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl AudioExtractor for FfmpegExtractor {
    async fn extract_audio(
        &self,
        video: &Path,
        audio_out: &Path,
    ) -> Result<AudioArtifact, TranscodeError> {
        tracing::debug!(
            "Extracting audio: {} -> {}",
            video.display(),
            audio_out.display()
        );

        let result = tokio::time::timeout(
            self.timeout,
            Command::new("ffmpeg")
                .args([
                    "-i",
                    &video.to_string_lossy(),
                    "-vn", // No video
                    "-acodec",
                    "pcm_s16le",
                    "-ar",
                    &AUDIO_SAMPLE_RATE.to_string(),
                    "-ac",
                    &AUDIO_CHANNELS.to_string(),
                    "-y", // Overwrite output file
                    &audio_out.to_string_lossy(),
                ])
                .output(),
        )
        .await;

        let output = match result {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => return Err(TranscodeError::Spawn(source)),
            Err(_) => return Err(TranscodeError::Timeout(self.timeout.as_secs())),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            return Err(TranscodeError::CommandFailed {
                status: output.status,
                stderr,
            });
        }

        let size_bytes = tokio::fs::metadata(audio_out)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if size_bytes == 0 {
            return Err(TranscodeError::EmptyOutput(audio_out.to_path_buf()));
        }

        Ok(AudioArtifact {
            path: audio_out.to_path_buf(),
            size_bytes,
        })
    }
}
