// Primary extraction: drive a managed browser session and collect validated
// records for one request.

use std::sync::Arc;

use tracing::{debug, info, warn};

use scrapeline_common::{
    ExtractedRecord, ExtractionPolicy, RecordType, ScrapeError, ScrapeRequest, ScrapeResult,
    TypeConfig,
};

use crate::diagnostics::Diagnostics;
use crate::normalize::{dedup, validate_items};
use crate::traits::{BrowserSession, SessionProvider, WaitPolicy};

/// Owns an open session for the length of one run. If the run's future is
/// dropped before `close`, the session is ended on a spawned task.
struct SessionGuard {
    session: Option<Box<dyn BrowserSession>>,
}

impl SessionGuard {
    async fn close(&mut self) -> anyhow::Result<()> {
        match self.session.take() {
            Some(mut session) => session.close().await,
            None => Ok(()),
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = session.close().await {
                        warn!(error = %format!("{e:#}"), "Failed to close abandoned browser session");
                    }
                });
            }
            Err(_) => warn!("Browser session dropped outside a runtime, left open"),
        }
    }
}

pub struct ExtractionOrchestrator {
    sessions: Arc<dyn SessionProvider>,
    policy: ExtractionPolicy,
    diagnostics: Arc<dyn Diagnostics>,
}

impl ExtractionOrchestrator {
    pub fn new(
        sessions: Arc<dyn SessionProvider>,
        policy: ExtractionPolicy,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            sessions,
            policy,
            diagnostics,
        }
    }

    /// Run primary extraction. `Ok(vec![])` means the extractor worked but
    /// found nothing usable; `ExtractionFailed` means it could not run.
    ///
    /// The session is closed before this returns, whatever the outcome.
    pub async fn run(
        &self,
        request: &ScrapeRequest,
        config: &TypeConfig,
    ) -> ScrapeResult<Vec<ExtractedRecord>> {
        let session = self
            .sessions
            .open()
            .await
            .map_err(|e| ScrapeError::ExtractionFailed(format!("session init: {e:#}")))?;
        let mut guard = SessionGuard {
            session: Some(session),
        };

        let result = match guard.session.as_deref_mut() {
            Some(session) => self.walk(session, request, config).await,
            None => Err(ScrapeError::ExtractionFailed("session already closed".to_string())),
        };

        if let Err(e) = guard.close().await {
            self.diagnostics
                .session_close_failed(config.record_type, &format!("{e:#}"));
        }

        let records = dedup(result?);
        if records.is_empty() {
            self.diagnostics.empty_result(config.record_type);
        } else {
            info!(record_type = %config.record_type, count = records.len(), "Primary extraction complete");
        }
        Ok(records)
    }

    async fn walk(
        &self,
        session: &mut dyn BrowserSession,
        request: &ScrapeRequest,
        config: &TypeConfig,
    ) -> ScrapeResult<Vec<ExtractedRecord>> {
        match config.record_type {
            RecordType::Books => {
                debug!(url = %request.url, "Books use the fixed catalogue walk");
                let mut all = Vec::new();
                for page in 1..=self.policy.books_page_count {
                    let url = self.policy.books_page_url(page);
                    let records = self
                        .extract_page(session, config, &url, page, self.policy.books_settle)
                        .await?;
                    all.extend(records);
                }
                Ok(all)
            }
            RecordType::Businesses => {
                self.extract_page(session, config, &request.url, 1, self.policy.businesses_settle)
                    .await
            }
        }
    }

    async fn extract_page(
        &self,
        session: &mut dyn BrowserSession,
        config: &TypeConfig,
        url: &str,
        page: u32,
        settle: std::time::Duration,
    ) -> ScrapeResult<Vec<ExtractedRecord>> {
        session
            .goto(url, WaitPolicy::NetworkIdle)
            .await
            .map_err(|e| ScrapeError::ExtractionFailed(format!("navigate to {url}: {e:#}")))?;

        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }

        let items = session
            .extract(&config.instruction, config.schema.json_schema())
            .await
            .map_err(|e| ScrapeError::ExtractionFailed(format!("extract on {url}: {e:#}")))?;

        let records = validate_items(config, items, self.diagnostics.as_ref());
        if records.is_empty() {
            self.diagnostics.empty_page(config.record_type, page, url);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        fast_policy, CallLog, DiagnosticEvent, MockSessionProvider, RecordingDiagnostics,
    };
    use scrapeline_common::SchemaRegistry;
    use serde_json::json;

    fn orchestrator(
        sessions: MockSessionProvider,
        diagnostics: Arc<RecordingDiagnostics>,
    ) -> ExtractionOrchestrator {
        ExtractionOrchestrator::new(Arc::new(sessions), fast_policy(), diagnostics)
    }

    fn books_request() -> ScrapeRequest {
        ScrapeRequest::parse(Some("https://books.toscrape.com"), Some("books")).unwrap()
    }

    #[tokio::test]
    async fn books_walk_visits_three_pages_in_order() {
        let log = CallLog::new();
        let sessions = MockSessionProvider::new(log.clone())
            .on_extract(Ok(vec![json!({"name": "A", "price": "£1"})]))
            .on_extract(Ok(vec![]))
            .on_extract(Ok(vec![json!({"name": "C", "price": "£3"})]));
        let diagnostics = Arc::new(RecordingDiagnostics::new());
        let registry = SchemaRegistry::standard();

        let records = orchestrator(sessions, diagnostics.clone())
            .run(&books_request(), registry.get(RecordType::Books))
            .await
            .unwrap();

        let names: Vec<_> = records.iter().filter_map(|r| r.get("name")).collect();
        assert_eq!(names, vec!["A", "C"]);
        assert_eq!(
            log.entries(),
            vec![
                "session:open",
                "session:goto https://books.toscrape.com/catalogue/page-1.html",
                "session:extract",
                "session:goto https://books.toscrape.com/catalogue/page-2.html",
                "session:extract",
                "session:goto https://books.toscrape.com/catalogue/page-3.html",
                "session:extract",
                "session:close",
            ]
        );
        assert!(diagnostics.events().contains(&DiagnosticEvent::EmptyPage {
            record_type: RecordType::Books,
            page: 2,
        }));
    }

    #[tokio::test]
    async fn businesses_navigate_once_to_caller_url() {
        let log = CallLog::new();
        let sessions = MockSessionProvider::new(log.clone())
            .on_extract(Ok(vec![json!({"name": "Acme", "phone": "555"})]));
        let registry = SchemaRegistry::standard();
        let request =
            ScrapeRequest::parse(Some("https://bbb.test/search?q=billing"), Some("businesses"))
                .unwrap();

        let records = orchestrator(sessions, Arc::new(RecordingDiagnostics::new()))
            .run(&request, registry.get(RecordType::Businesses))
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(
            log.entries(),
            vec![
                "session:open",
                "session:goto https://bbb.test/search?q=billing",
                "session:extract",
                "session:close",
            ]
        );
    }

    #[tokio::test]
    async fn extractor_error_still_closes_session() {
        let log = CallLog::new();
        let sessions = MockSessionProvider::new(log.clone())
            .on_extract(Ok(vec![json!({"name": "A", "price": "£1"})]))
            .on_extract(Err("remote extractor crashed".to_string()));
        let registry = SchemaRegistry::standard();

        let err = orchestrator(sessions, Arc::new(RecordingDiagnostics::new()))
            .run(&books_request(), registry.get(RecordType::Books))
            .await
            .unwrap_err();

        assert!(matches!(err, ScrapeError::ExtractionFailed(msg) if msg.contains("crashed")));
        assert_eq!(log.entries().last().map(String::as_str), Some("session:close"));
        // Third page never visited.
        assert_eq!(log.count_prefix("session:goto"), 2);
    }

    #[tokio::test]
    async fn navigation_error_is_extraction_failure() {
        let log = CallLog::new();
        let sessions = MockSessionProvider::new(log.clone()).fail_goto("net::ERR_NAME_NOT_RESOLVED");
        let registry = SchemaRegistry::standard();
        let request =
            ScrapeRequest::parse(Some("https://nowhere.test"), Some("businesses")).unwrap();

        let err = orchestrator(sessions, Arc::new(RecordingDiagnostics::new()))
            .run(&request, registry.get(RecordType::Businesses))
            .await
            .unwrap_err();

        assert!(matches!(err, ScrapeError::ExtractionFailed(_)));
        assert_eq!(log.count_prefix("session:close"), 1);
    }

    #[tokio::test]
    async fn session_init_failure_is_extraction_failure() {
        let log = CallLog::new();
        let sessions = MockSessionProvider::new(log.clone()).fail_open("quota exceeded");
        let registry = SchemaRegistry::standard();

        let err = orchestrator(sessions, Arc::new(RecordingDiagnostics::new()))
            .run(&books_request(), registry.get(RecordType::Books))
            .await
            .unwrap_err();

        assert!(matches!(err, ScrapeError::ExtractionFailed(msg) if msg.contains("quota")));
        assert_eq!(log.count_prefix("session:goto"), 0);
    }

    #[tokio::test]
    async fn all_empty_pages_is_empty_result_not_error() {
        let log = CallLog::new();
        let sessions = MockSessionProvider::new(log.clone());
        let diagnostics = Arc::new(RecordingDiagnostics::new());
        let registry = SchemaRegistry::standard();

        let records = orchestrator(sessions, diagnostics.clone())
            .run(&books_request(), registry.get(RecordType::Books))
            .await
            .unwrap();

        assert!(records.is_empty());
        let events = diagnostics.events();
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, DiagnosticEvent::EmptyPage { .. }))
                .count(),
            3
        );
        assert!(events.contains(&DiagnosticEvent::EmptyResult {
            record_type: RecordType::Books
        }));
    }

    #[tokio::test]
    async fn cancelled_run_still_closes_session() {
        let log = CallLog::new();
        let sessions = MockSessionProvider::new(log.clone());
        let policy = ExtractionPolicy {
            businesses_settle: std::time::Duration::from_secs(60),
            ..fast_policy()
        };
        let orchestrator = ExtractionOrchestrator::new(
            Arc::new(sessions),
            policy,
            Arc::new(RecordingDiagnostics::new()),
        );
        let registry = SchemaRegistry::standard();
        let request = ScrapeRequest::parse(Some("https://bbb.test"), Some("businesses")).unwrap();

        // Dropped while waiting out the settle delay.
        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            orchestrator.run(&request, registry.get(RecordType::Businesses)),
        )
        .await;
        assert!(timed_out.is_err());

        for _ in 0..10 {
            if log.count_prefix("session:close") > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(log.count_prefix("session:extract"), 0);
        assert_eq!(log.count_prefix("session:close"), 1);
    }

    #[tokio::test]
    async fn close_failure_is_reported_not_fatal() {
        let log = CallLog::new();
        let sessions = MockSessionProvider::new(log.clone())
            .on_extract(Ok(vec![json!({"name": "Acme"})]))
            .fail_close("already gone");
        let diagnostics = Arc::new(RecordingDiagnostics::new());
        let registry = SchemaRegistry::standard();
        let request = ScrapeRequest::parse(Some("https://bbb.test"), Some("businesses")).unwrap();

        let records = orchestrator(sessions, diagnostics.clone())
            .run(&request, registry.get(RecordType::Businesses))
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert!(diagnostics
            .events()
            .iter()
            .any(|e| matches!(e, DiagnosticEvent::SessionCloseFailed { .. })));
    }
}
