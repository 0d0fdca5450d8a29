// Fallback dispatcher: runs the external scraper as a child process.
//
// Invocation is `<program> [args..] --url <url> --out <path>` from the project
// root. stdout/stderr are streamed line by line to diagnostics while the
// process runs; the result depends only on the exit status.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use scrapeline_common::{FallbackSettings, ScrapeError, ScrapeResult};

use crate::diagnostics::{Diagnostics, OutputStream};
use crate::traits::FallbackRunner;

pub struct ProcessFallback {
    settings: FallbackSettings,
    diagnostics: Arc<dyn Diagnostics>,
}

impl ProcessFallback {
    pub fn new(settings: FallbackSettings, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            settings,
            diagnostics,
        }
    }

    pub fn settings(&self) -> &FallbackSettings {
        &self.settings
    }

    /// Make sure the output path holds nothing from an earlier run, so a
    /// process that exits 0 without writing cannot resurrect stale rows.
    async fn prepare_output(output_path: &Path) -> ScrapeResult<()> {
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ScrapeError::FallbackFailed(format!(
                    "cannot create output directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        match tokio::fs::remove_file(output_path).await {
            Ok(()) => {
                debug!(path = %output_path.display(), "Removed previous fallback output");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ScrapeError::FallbackFailed(format!(
                "cannot clear previous output {}: {e}",
                output_path.display()
            ))),
        }
    }
}

async fn forward_lines<R>(reader: R, stream: OutputStream, diagnostics: Arc<dyn Diagnostics>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        diagnostics.fallback_output(stream, &line);
    }
}

#[async_trait]
impl FallbackRunner for ProcessFallback {
    async fn run(&self, url: &str, output_path: &Path) -> ScrapeResult<()> {
        // The child runs in `project_root`; hand it paths that mean the same
        // thing there as they do here.
        let resolve_err =
            |e: std::io::Error| ScrapeError::FallbackFailed(format!("cannot resolve paths: {e}"));
        let settings = self.settings.resolved().map_err(resolve_err)?;
        let output_path = std::path::absolute(output_path).map_err(resolve_err)?;
        let output_path = output_path.as_path();

        Self::prepare_output(output_path).await?;

        let program = &settings.program;
        info!(program = %program.display(), url, out = %output_path.display(), "Launching fallback scraper");

        let mut child = Command::new(program)
            .args(&settings.args)
            .arg("--url")
            .arg(url)
            .arg("--out")
            .arg(output_path)
            .current_dir(&settings.project_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ScrapeError::FallbackFailed(format!(
                    "failed to start {}: {e}",
                    program.display()
                ))
            })?;

        let stdout = child.stdout.take().map(|out| {
            tokio::spawn(forward_lines(
                out,
                OutputStream::Stdout,
                self.diagnostics.clone(),
            ))
        });
        let stderr = child.stderr.take().map(|err| {
            tokio::spawn(forward_lines(
                err,
                OutputStream::Stderr,
                self.diagnostics.clone(),
            ))
        });

        let status = child
            .wait()
            .await
            .map_err(|e| ScrapeError::FallbackFailed(format!("failed to wait for process: {e}")))?;

        // Pipes close when the process exits; drain what is left.
        for handle in [stdout, stderr].into_iter().flatten() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Fallback output forwarder failed");
            }
        }

        match status.code() {
            Some(0) => {
                info!(url, "Fallback scraper finished");
                Ok(())
            }
            Some(code) => Err(ScrapeError::FallbackFailed(format!(
                "fallback scraper exited with code {code}"
            ))),
            None => Err(ScrapeError::FallbackFailed(
                "fallback scraper was terminated by a signal".to_string(),
            )),
        }
    }
}
