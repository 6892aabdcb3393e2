pub mod billing;
pub mod config;
pub mod error;
pub mod evidence;
pub mod http;
pub mod ingest;
pub mod metrics_server;
pub mod observability;
pub mod ocr;
pub mod pipeline;
pub mod sinks;
pub mod sources;
pub mod store;
pub mod transform;

pub use error::IngestError;
pub use ingest::Orchestrator;
pub use pipeline::{Envelope, Pipeline};
