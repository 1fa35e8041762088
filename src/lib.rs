//! Google Cloud Logging output for `tracing`, threaded by request.
//!
//! Events are rendered as line-delimited JSON understood by Cloud
//! Logging. When an event is emitted while handling a request that
//! carried an `X-Cloud-Trace-Context` header, the entry is linked to the
//! request's trace through the `logging.googleapis.com/trace` and
//! `logging.googleapis.com/spanId` fields.

pub mod trace_context;
pub mod record;
pub mod severity;
pub mod formatter;
pub mod context;
pub mod sink;
pub mod layer;

pub mod env;
pub mod init;
pub mod noop_sink;
pub mod stdout_sink;

pub use context::{current_trace_context, with_trace_context, X_CLOUD_TRACE_CONTEXT_HEADER};
pub use formatter::{Formatter, FormatterConfig};
pub use record::{LogLevel, LogRecord};
pub use severity::Severity;
