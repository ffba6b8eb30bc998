//! Logging infrastructure: structured pipeline event logging.
//!
//! Provides [`JsonlPipelineLog`], a JSONL file writer that implements
//! the [`PipelineProgress`](council_application::PipelineProgress) port.

mod jsonl_log;

pub use jsonl_log::JsonlPipelineLog;
