use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::export::DocumentFormat;
use crate::translate::Language;

#[derive(Parser)]
#[command(
    name = "videotrans",
    about = "Video Translator - Extract, transcribe and translate a video's audio into downloadable documents",
    version,
    long_about = "A CLI tool that extracts the audio track from a video file, transcribes it with a speech-to-text service, translates the transcript into the selected target languages, and renders each translation as plain-text, rich-text (.docx) and fixed-layout (.pdf) documents."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate a video into one or more target languages
    Translate {
        /// Path of the video file to translate (mp4, mkv, avi, ...)
        #[arg(value_name = "VIDEO")]
        video: PathBuf,

        /// Target language; repeat for multiple languages
        #[arg(short, long = "language", value_enum, value_name = "LANG")]
        languages: Vec<Language>,

        /// Document format to produce; repeat for multiple formats
        #[arg(
            short,
            long = "format",
            value_enum,
            value_name = "FORMAT",
            default_values_t = [DocumentFormat::Text, DocumentFormat::Docx, DocumentFormat::Pdf]
        )]
        formats: Vec<DocumentFormat>,

        /// Directory to keep run artifacts under (defaults to the configured
        /// work root)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Configure service endpoint and settings
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List available target languages
    Languages,
}
