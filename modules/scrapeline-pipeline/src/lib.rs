pub mod diagnostics;
pub mod export;
pub mod fallback;
pub mod handler;
pub mod ingest;
pub mod normalize;
pub mod orchestrator;
pub mod persist;
pub mod stagehand;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use diagnostics::{Diagnostics, FallbackReason, OutputStream, TracingDiagnostics};
pub use export::RecordExporter;
pub use fallback::ProcessFallback;
pub use handler::ScrapeHandler;
pub use orchestrator::ExtractionOrchestrator;
pub use persist::{PersistenceGateway, PgRecordStore};
pub use stagehand::StagehandProvider;
pub use traits::{BrowserSession, FallbackRunner, RecordStore, SessionProvider, WaitPolicy};
