use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use video_translator::cli::{Cli, Commands};
use video_translator::pipeline::{LanguageOutcome, RunReport, TranslationPipeline, VideoInput};
use video_translator::translate::Language;
use video_translator::{utils, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "video_translator=debug"
    } else {
        "video_translator=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Check for required external tools (non-fatal)
    let missing_deps = utils::check_dependencies().await;
    if !missing_deps.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing_deps {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }

    let mut config = Config::load().await?;

    match cli.command {
        Commands::Translate {
            video,
            languages,
            formats,
            output,
        } => {
            if languages.is_empty() {
                println!("No target languages selected; nothing to do.");
                println!("Pick at least one with --language (see `videotrans languages`).");
                return Ok(());
            }

            if let Some(dir) = output {
                config.app.work_root = Some(dir);
            }

            utils::check_file_accessible(&video)?;
            let data = fs_err::read(&video)
                .with_context(|| format!("Failed to read video file {}", video.display()))?;
            let file_name = video
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload.mp4".to_string());

            tracing::info!(
                "Translating {} ({}) into {:?}",
                file_name,
                utils::format_file_size(data.len() as u64),
                languages
            );

            let pipeline = TranslationPipeline::new(&config)?;

            let spinner = if cli.quiet {
                None
            } else {
                let spinner = ProgressBar::new_spinner();
                spinner.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} [{elapsed_precise}] {msg}")
                        .unwrap(),
                );
                spinner.set_message("Extracting, transcribing and translating...");
                spinner.enable_steady_tick(std::time::Duration::from_millis(120));
                Some(spinner)
            };

            let result = pipeline
                .run(VideoInput { file_name, data }, &languages, &formats)
                .await;

            if let Some(spinner) = spinner {
                spinner.finish_and_clear();
            }

            let report = result?;
            print_report(&report);
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                println!("Edit the config file to change settings:");
                println!(
                    "  {}",
                    dirs::config_dir()
                        .map(|d| d.join("video-translator").join("config.yaml"))
                        .unwrap_or_default()
                        .display()
                );
            }
        }
        Commands::Languages => {
            println!("Available target languages:");
            for language in Language::catalog() {
                println!("  • {}", language);
            }
        }
    }

    Ok(())
}

/// Render the per-language results the way a download page would: translated
/// text first, then one line per produced document with its MIME type.
fn print_report(report: &RunReport) {
    println!("Run {} {}", report.run_id, report.state);

    for entry in &report.languages {
        match &entry.outcome {
            LanguageOutcome::Translated { text, documents } => {
                println!("\n{} translation:", entry.language);
                println!("{}", text);
                for (format, result) in documents {
                    match result {
                        Ok(doc) => println!(
                            "  [{}] {} ({})",
                            format,
                            doc.path.display(),
                            doc.mime_type
                        ),
                        Err(e) => println!("  [{}] export failed: {}", format, e),
                    }
                }
            }
            LanguageOutcome::Failed(e) => {
                println!("\n{} translation failed: {}", entry.language, e);
            }
        }
    }
}
