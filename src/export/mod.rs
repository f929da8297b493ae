use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::ValueEnum;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use uuid::Uuid;

use crate::errors::ExportError;
use crate::store::ArtifactStore;
use crate::translate::{Language, Translation};

/// Output document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum DocumentFormat {
    /// Plain text, the raw translation with no structural wrapping
    Text,
    /// Rich-text document (Word)
    Docx,
    /// Fixed-layout document (PDF)
    Pdf,
}

impl DocumentFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Text => "txt",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Pdf => "pdf",
        }
    }

    /// MIME type for the format, suitable for a download action.
    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentFormat::Text => "text/plain",
            DocumentFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocumentFormat::Pdf => "application/pdf",
        }
    }

    /// All formats, in the order they are rendered.
    pub fn all() -> &'static [DocumentFormat] {
        &[
            DocumentFormat::Text,
            DocumentFormat::Docx,
            DocumentFormat::Pdf,
        ]
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentFormat::Text => write!(f, "text"),
            DocumentFormat::Docx => write!(f, "docx"),
            DocumentFormat::Pdf => write!(f, "pdf"),
        }
    }
}

/// One rendered document for one (translation, format) pair.
///
/// Exported documents are the run's deliverables: cleanup never removes them.
#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub language: Language,
    pub format: DocumentFormat,
    pub path: PathBuf,
    pub mime_type: &'static str,
}

/// Trait for the external rich-text and fixed-layout document writers.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Render an HTML fragment into a rich-text document at `output`.
    async fn html_to_docx(&self, html: &str, output: &Path) -> Result<(), ExportError>;

    /// Render an HTML fragment into a fixed-layout document at `output`.
    async fn html_to_pdf(&self, html: &str, output: &Path) -> Result<(), ExportError>;
}

/// Production converter shelling out to pandoc (docx) and wkhtmltopdf (pdf),
/// both fed the HTML fragment on stdin.
pub struct CommandConverter {
    timeout: Duration,
}

impl CommandConverter {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn run_with_stdin(
        &self,
        tool: &'static str,
        args: &[&str],
        input: &str,
        output: &Path,
    ) -> Result<(), ExportError> {
        tracing::debug!("Rendering document with {}: {}", tool, output.display());

        let mut child = Command::new(tool)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            // A converter that outlives the timeout must not keep running and
            // write its output into an already finalized run directory.
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExportError::Spawn { tool, source })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|source| ExportError::Spawn { tool, source })?;
            // Dropping stdin closes the pipe so the tool sees EOF.
        }

        let result = tokio::time::timeout(self.timeout, child.wait_with_output()).await;
        let out = match result {
            Ok(Ok(out)) => out,
            Ok(Err(source)) => return Err(ExportError::Spawn { tool, source }),
            Err(_) => {
                return Err(ExportError::Timeout {
                    tool,
                    seconds: self.timeout.as_secs(),
                })
            }
        };

        if !out.status.success() {
            return Err(ExportError::ConverterFailed {
                tool,
                status: out.status,
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            });
        }

        let size = tokio::fs::metadata(output).await.map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(ExportError::EmptyOutput(output.to_path_buf()));
        }

        Ok(())
    }
}

#[async_trait]
impl DocumentConverter for CommandConverter {
    async fn html_to_docx(&self, html: &str, output: &Path) -> Result<(), ExportError> {
        let out = output.to_string_lossy().into_owned();
        self.run_with_stdin("pandoc", &["-f", "html", "-t", "docx", "-o", &out, "-"], html, output)
            .await
    }

    async fn html_to_pdf(&self, html: &str, output: &Path) -> Result<(), ExportError> {
        let out = output.to_string_lossy().into_owned();
        self.run_with_stdin(
            "wkhtmltopdf",
            &["--quiet", "--encoding", "utf-8", "-", &out],
            html,
            output,
        )
        .await
    }
}

/// Escape text for embedding in the exported HTML fragment.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Minimal structural document shared by the rich-text and fixed-layout
/// renderings: one heading with the language name, one body paragraph.
pub fn document_html(translation: &Translation) -> String {
    format!(
        "<h1>{} Translation</h1><p>{}</p>",
        translation.language.name(),
        escape_html(&translation.text)
    )
}

/// File name of an exported document inside the run directory.
pub fn document_file_name(language: Language, format: DocumentFormat) -> String {
    format!("{}_translation.{}", language.name(), format.extension())
}

/// Renders translations into the requested document formats and writes them
/// into the artifact store.
pub struct Exporter {
    converter: Arc<dyn DocumentConverter>,
}

impl Exporter {
    pub fn new(converter: Arc<dyn DocumentConverter>) -> Self {
        Self { converter }
    }

    /// Render `translation` into each requested format.
    ///
    /// Failures are per (language, format): one failed rendering does not
    /// block the remaining formats.
    pub async fn export(
        &self,
        store: &ArtifactStore,
        run_id: Uuid,
        translation: &Translation,
        formats: &[DocumentFormat],
    ) -> BTreeMap<DocumentFormat, Result<ExportedDocument, ExportError>> {
        let mut documents = BTreeMap::new();

        for &format in formats {
            let result = self
                .export_one(store, run_id, translation, format)
                .await;
            if let Err(e) = &result {
                tracing::warn!(
                    "Export failed for {} ({}): {}",
                    translation.language,
                    format,
                    e
                );
            }
            documents.insert(format, result);
        }

        documents
    }

    async fn export_one(
        &self,
        store: &ArtifactStore,
        run_id: Uuid,
        translation: &Translation,
        format: DocumentFormat,
    ) -> Result<ExportedDocument, ExportError> {
        let name = document_file_name(translation.language, format);

        let path = match format {
            DocumentFormat::Text => {
                let handle = store
                    .write(run_id, &name, translation.text.as_bytes())
                    .await?;
                handle.path().to_path_buf()
            }
            DocumentFormat::Docx => {
                let path = store.artifact_path(run_id, &name);
                let html = document_html(translation);
                self.converter.html_to_docx(&html, &path).await?;
                path
            }
            DocumentFormat::Pdf => {
                let path = store.artifact_path(run_id, &name);
                let html = document_html(translation);
                self.converter.html_to_pdf(&html, &path).await?;
                path
            }
        };

        Ok(ExportedDocument {
            language: translation.language,
            format,
            path,
            mime_type: format.mime_type(),
        })
    }
}
