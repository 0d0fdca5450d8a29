//! ProcessFallback against real `sh` child processes.
//!
//! The script receives `--url <url> --out <path>` as `$1..$4`.

#![cfg(unix)]

use std::path::PathBuf;
use std::sync::Arc;

use scrapeline_common::{FallbackSettings, RecordType, ScrapeError};
use scrapeline_pipeline::testing::RecordingDiagnostics;
use scrapeline_pipeline::{
    Diagnostics, FallbackReason, FallbackRunner, OutputStream, ProcessFallback,
};

fn sh(script: &str, root: PathBuf) -> FallbackSettings {
    FallbackSettings {
        program: PathBuf::from("sh"),
        args: vec!["-c".to_string(), script.to_string(), "fallback".to_string()],
        data_dir: root.join("data"),
        project_root: root,
    }
}

#[tokio::test]
async fn exit_zero_writes_csv_at_out_path() {
    let dir = tempfile::tempdir().unwrap();
    let diagnostics = Arc::new(RecordingDiagnostics::new());
    let runner = ProcessFallback::new(
        sh(
            r#"[ "$1" = "--url" ] && [ "$3" = "--out" ] || exit 9
printf 'name,price\n"%s",£1.00\n' "$2" > "$4""#,
            dir.path().to_path_buf(),
        ),
        diagnostics.clone(),
    );
    let out = dir.path().join("data/books_scraper_output.csv");

    runner.run("https://books.toscrape.com", &out).await.unwrap();

    let written = std::fs::read_to_string(&out).unwrap();
    assert_eq!(written, "name,price\n\"https://books.toscrape.com\",£1.00\n");
}

#[tokio::test]
async fn runs_in_project_root() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let diagnostics = Arc::new(RecordingDiagnostics::new());
    let runner = ProcessFallback::new(sh("pwd", root.clone()), diagnostics.clone());

    runner
        .run("https://example.com", &root.join("data/out.csv"))
        .await
        .unwrap();

    assert_eq!(
        diagnostics.output_lines(OutputStream::Stdout),
        vec![root.display().to_string()]
    );
}

#[tokio::test]
async fn streams_stdout_and_stderr_lines() {
    let dir = tempfile::tempdir().unwrap();
    let diagnostics = Arc::new(RecordingDiagnostics::new());
    let runner = ProcessFallback::new(
        sh(
            "echo page 1; echo page 2; echo 'warning: slow' >&2",
            dir.path().to_path_buf(),
        ),
        diagnostics.clone(),
    );

    runner
        .run("https://example.com", &dir.path().join("out.csv"))
        .await
        .unwrap();

    assert_eq!(
        diagnostics.output_lines(OutputStream::Stdout),
        vec!["page 1", "page 2"]
    );
    assert_eq!(
        diagnostics.output_lines(OutputStream::Stderr),
        vec!["warning: slow"]
    );
}

#[tokio::test]
async fn non_zero_exit_reports_code() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ProcessFallback::new(
        sh("echo boom >&2; exit 3", dir.path().to_path_buf()),
        Arc::new(RecordingDiagnostics::new()),
    );

    let err = runner
        .run("https://example.com", &dir.path().join("out.csv"))
        .await
        .unwrap_err();

    assert!(matches!(err, ScrapeError::FallbackFailed(msg) if msg.contains("code 3")));
}

#[tokio::test]
async fn missing_program_is_launch_failure() {
    let dir = tempfile::tempdir().unwrap();
    let settings = FallbackSettings {
        program: dir.path().join("no-such-interpreter"),
        ..FallbackSettings::for_project_root(dir.path())
    };
    let runner = ProcessFallback::new(settings, Arc::new(RecordingDiagnostics::new()));

    let err = runner
        .run("https://example.com", &dir.path().join("out.csv"))
        .await
        .unwrap_err();

    assert!(matches!(err, ScrapeError::FallbackFailed(msg) if msg.contains("failed to start")));
}

#[tokio::test]
async fn stale_output_is_removed_before_launch() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("books_scraper_output.csv");
    std::fs::write(&out, "name,price\nOld,£9\n").unwrap();

    // Exits 0 without writing anything.
    let runner = ProcessFallback::new(
        sh("true", dir.path().to_path_buf()),
        Arc::new(RecordingDiagnostics::new()),
    );
    runner.run("https://example.com", &out).await.unwrap();

    assert!(!out.exists());
}

/// Panics on every output line, killing the forwarder task.
struct PanickingDiagnostics;

impl Diagnostics for PanickingDiagnostics {
    fn empty_page(&self, _: RecordType, _: u32, _: &str) {}
    fn records_rejected(&self, _: RecordType, _: usize, _: &str) {}
    fn empty_result(&self, _: RecordType) {}
    fn session_close_failed(&self, _: RecordType, _: &str) {}
    fn fallback_triggered(&self, _: RecordType, _: &FallbackReason) {}
    fn fallback_output(&self, _: OutputStream, line: &str) {
        panic!("sink rejected {line}");
    }
    fn terminal_failure(&self, _: RecordType, _: &ScrapeError) {}
}

#[tokio::test]
async fn failed_output_forwarder_does_not_fail_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ProcessFallback::new(
        sh("echo one; echo two >&2", dir.path().to_path_buf()),
        Arc::new(PanickingDiagnostics),
    );

    runner
        .run("https://example.com", &dir.path().join("out.csv"))
        .await
        .unwrap();
}
