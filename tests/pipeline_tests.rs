//! End-to-end pipeline tests over mocked external services.

mod common;

use std::sync::Arc;

use common::{pipeline_with, run_dir_count, MockConverter, MockExtractor, MockGenerator, MockTranscriber};
use tempfile::TempDir;

use video_translator::export::DocumentFormat;
use video_translator::pipeline::{LanguageOutcome, RunState, VideoInput};
use video_translator::translate::Language;
use video_translator::Stage;

fn video() -> VideoInput {
    VideoInput {
        file_name: "movie.mp4".to_string(),
        data: b"not really a video".to_vec(),
    }
}

fn all_formats() -> Vec<DocumentFormat> {
    DocumentFormat::all().to_vec()
}

#[tokio::test]
async fn test_single_language_produces_all_three_documents() {
    let temp = TempDir::new().unwrap();
    let pipeline = pipeline_with(
        temp.path(),
        Arc::new(MockExtractor::ok()),
        Arc::new(MockTranscriber::with_text("hello world")),
        Arc::new(MockGenerator::ok()),
        Arc::new(MockConverter::ok()),
    );

    let report = pipeline
        .run(video(), &[Language::English], &all_formats())
        .await
        .unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.transcript.as_ref().unwrap().text(), "hello world");
    assert_eq!(report.languages.len(), 1);

    let entry = &report.languages[0];
    assert_eq!(entry.language, Language::English);
    match &entry.outcome {
        LanguageOutcome::Translated { text, documents } => {
            assert_eq!(text, "translated-English");
            assert_eq!(documents.len(), 3);
            for result in documents.values() {
                let doc = result.as_ref().unwrap();
                assert!(doc.path.exists(), "document missing: {}", doc.path.display());
            }
        }
        LanguageOutcome::Failed(e) => panic!("translation unexpectedly failed: {e}"),
    }
}

#[tokio::test]
async fn test_cleanup_removes_transients_and_keeps_documents() {
    let temp = TempDir::new().unwrap();
    let pipeline = pipeline_with(
        temp.path(),
        Arc::new(MockExtractor::ok()),
        Arc::new(MockTranscriber::with_text("hello world")),
        Arc::new(MockGenerator::ok()),
        Arc::new(MockConverter::ok()),
    );

    let report = pipeline
        .run(video(), &[Language::French], &all_formats())
        .await
        .unwrap();

    let run_dir = pipeline.store().run_dir(report.run_id);
    assert!(!run_dir.join("audio.wav").exists());
    assert!(!run_dir.join("source_movie.mp4").exists());

    let docs = report.languages[0].documents();
    assert_eq!(docs.len(), 3);
    for doc in docs {
        assert!(doc.path.exists());
    }
}

#[tokio::test]
async fn test_empty_language_selection_is_a_noop() {
    let temp = TempDir::new().unwrap();
    let extractor = Arc::new(MockExtractor::ok());
    let transcriber = Arc::new(MockTranscriber::with_text("hello world"));
    let pipeline = pipeline_with(
        temp.path(),
        extractor.clone(),
        transcriber.clone(),
        Arc::new(MockGenerator::ok()),
        Arc::new(MockConverter::ok()),
    );

    let report = pipeline.run(video(), &[], &all_formats()).await.unwrap();

    assert_eq!(report.state, RunState::Idle);
    assert!(report.languages.is_empty());
    assert_eq!(extractor.call_count(), 0);
    assert_eq!(transcriber.call_count(), 0);
    assert_eq!(run_dir_count(temp.path()), 0);
}

#[tokio::test]
async fn test_extract_failure_aborts_before_downstream_stages() {
    let temp = TempDir::new().unwrap();
    let transcriber = Arc::new(MockTranscriber::with_text("hello world"));
    let generator = Arc::new(MockGenerator::ok());
    let pipeline = pipeline_with(
        temp.path(),
        Arc::new(MockExtractor::failing()),
        transcriber.clone(),
        generator.clone(),
        Arc::new(MockConverter::ok()),
    );

    let err = pipeline
        .run(video(), &[Language::English], &all_formats())
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Stage::Extract);
    assert_eq!(transcriber.call_count(), 0);
    assert_eq!(generator.call_count(), 0);
    // The uploaded video copy is cleaned up with the rest of the run dir.
    assert_eq!(run_dir_count(temp.path()), 0);
}

#[tokio::test]
async fn test_transcription_failure_aborts_and_cleans_up() {
    let temp = TempDir::new().unwrap();
    let generator = Arc::new(MockGenerator::ok());
    let pipeline = pipeline_with(
        temp.path(),
        Arc::new(MockExtractor::ok()),
        Arc::new(MockTranscriber::failing()),
        generator.clone(),
        Arc::new(MockConverter::ok()),
    );

    let err = pipeline
        .run(video(), &[Language::German], &all_formats())
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Stage::Transcribe);
    assert_eq!(generator.call_count(), 0);
    assert_eq!(run_dir_count(temp.path()), 0);
}

#[tokio::test]
async fn test_one_failed_language_does_not_abort_the_run() {
    let temp = TempDir::new().unwrap();
    let generator = Arc::new(MockGenerator::failing_for(&[Language::German]));
    let pipeline = pipeline_with(
        temp.path(),
        Arc::new(MockExtractor::ok()),
        Arc::new(MockTranscriber::with_text("hello world")),
        generator.clone(),
        Arc::new(MockConverter::ok()),
    );

    let report = pipeline
        .run(video(), &[Language::French, Language::German], &all_formats())
        .await
        .unwrap();

    assert_eq!(report.state, RunState::Completed);
    // Both languages were attempted.
    assert_eq!(generator.call_count(), 2);

    let french = &report.languages[0];
    assert_eq!(french.language, Language::French);
    assert_eq!(french.documents().len(), 3);

    let german = &report.languages[1];
    assert_eq!(german.language, Language::German);
    assert!(matches!(german.outcome, LanguageOutcome::Failed(_)));
    // No export happens for a language whose translation failed.
    assert!(german.documents().is_empty());
}

#[tokio::test]
async fn test_translation_attempts_match_selected_languages_even_when_all_fail() {
    let temp = TempDir::new().unwrap();
    let generator = Arc::new(MockGenerator::failing_for(&[
        Language::Turkish,
        Language::English,
        Language::French,
    ]));
    let pipeline = pipeline_with(
        temp.path(),
        Arc::new(MockExtractor::ok()),
        Arc::new(MockTranscriber::with_text("hello world")),
        generator.clone(),
        Arc::new(MockConverter::ok()),
    );

    let languages = [Language::Turkish, Language::English, Language::French];
    let report = pipeline
        .run(video(), &languages, &all_formats())
        .await
        .unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(generator.call_count(), languages.len());
    assert!(report
        .languages
        .iter()
        .all(|entry| matches!(entry.outcome, LanguageOutcome::Failed(_))));
}

#[tokio::test]
async fn test_results_keep_request_order() {
    let temp = TempDir::new().unwrap();
    let pipeline = pipeline_with(
        temp.path(),
        Arc::new(MockExtractor::ok()),
        Arc::new(MockTranscriber::with_text("hello world")),
        Arc::new(MockGenerator::ok()),
        Arc::new(MockConverter::ok()),
    );

    let languages = [Language::German, Language::Turkish, Language::English];
    let report = pipeline
        .run(video(), &languages, &all_formats())
        .await
        .unwrap();

    let reported: Vec<Language> = report.languages.iter().map(|e| e.language).collect();
    assert_eq!(reported, languages);
}

#[tokio::test]
async fn test_one_failed_format_does_not_block_other_formats() {
    let temp = TempDir::new().unwrap();
    let pipeline = pipeline_with(
        temp.path(),
        Arc::new(MockExtractor::ok()),
        Arc::new(MockTranscriber::with_text("hello world")),
        Arc::new(MockGenerator::ok()),
        Arc::new(MockConverter::failing_pdf()),
    );

    let report = pipeline
        .run(video(), &[Language::English], &all_formats())
        .await
        .unwrap();

    assert_eq!(report.state, RunState::Completed);
    match &report.languages[0].outcome {
        LanguageOutcome::Translated { documents, .. } => {
            assert!(documents[&DocumentFormat::Text].is_ok());
            assert!(documents[&DocumentFormat::Docx].is_ok());
            assert!(documents[&DocumentFormat::Pdf].is_err());
        }
        LanguageOutcome::Failed(e) => panic!("translation unexpectedly failed: {e}"),
    }
}

#[tokio::test]
async fn test_plain_text_export_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let pipeline = pipeline_with(
        temp.path(),
        Arc::new(MockExtractor::ok()),
        Arc::new(MockTranscriber::with_text("hello world")),
        Arc::new(MockGenerator::ok()),
        Arc::new(MockConverter::ok()),
    );

    let first = pipeline
        .run(video(), &[Language::English], &[DocumentFormat::Text])
        .await
        .unwrap();
    let second = pipeline
        .run(video(), &[Language::English], &[DocumentFormat::Text])
        .await
        .unwrap();

    let read = |report: &video_translator::RunReport| {
        let doc = report.languages[0].documents()[0].path.clone();
        std::fs::read(doc).unwrap()
    };
    assert_eq!(read(&first), read(&second));
}
