pub mod config;
pub mod error;
pub mod registry;
pub mod types;

pub use config::{Config, ExtractionPolicy, FallbackSettings};
pub use error::{RecordRejected, ScrapeError, ScrapeResult};
pub use registry::{FieldSpec, RecordSchema, SchemaRegistry, TypeConfig};
pub use types::*;
