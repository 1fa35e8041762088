use crate::formatter::{ConfigError, Formatter, FormatterConfig};
use crate::layer::CloudLoggingLayer;
use crate::sink::LogSink;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the logging layer.
///
/// **Fields**
/// - `channel_buffer`: maximum number of formatted lines queued before
///   new ones are dropped.
/// - `batch_size`: number of lines handed to the sink per batch.
/// - `flush_interval`: maximum time between flushes of a partial batch.
/// - `max_level`: most verbose level that is formatted at all.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub channel_buffer: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_level: LevelFilter,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
            max_level: LevelFilter::DEBUG,
        }
    }
}

/// Error type returned when the global subscriber cannot be installed.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("invalid formatter configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled(#[from] SetGlobalDefaultError),
}

/// Initialize the global `tracing` subscriber with a Cloud Logging layer.
///
/// **Parameters**
/// - `formatter`: shared [`Formatter`] holding the project id.
/// - `sink`: [`LogSink`] that receives the formatted lines.
/// - `config`: [`LayerConfig`] controlling level, buffering and batching.
///
/// **Returns**
///
/// The handle of the background task draining lines into `sink`. Must be
/// called from within a Tokio runtime.
pub fn init_tracing_with_config(
    formatter: Arc<Formatter>,
    sink: Arc<dyn LogSink>,
    config: LayerConfig,
) -> Result<JoinHandle<()>, InitError> {
    let (layer, handle) = CloudLoggingLayer::new(
        formatter,
        sink,
        config.channel_buffer,
        config.batch_size,
        config.flush_interval,
    );

    let subscriber = Registry::default().with(config.max_level).with(layer);
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        handle.abort();
        return Err(e.into());
    }
    Ok(handle)
}

/// Initialize tracing with [`LayerConfig::default`].
pub fn init_tracing(formatter: Arc<Formatter>, sink: Arc<dyn LogSink>) -> Result<JoinHandle<()>, InitError> {
    init_tracing_with_config(formatter, sink, LayerConfig::default())
}

/// Initialize tracing with the project taken from `GOOGLE_CLOUD_PROJECT`.
///
/// This is the recommended entrypoint for services deployed on App
/// Engine or Cloud Run.
pub fn init_tracing_from_env(sink: Arc<dyn LogSink>) -> Result<JoinHandle<()>, InitError> {
    let formatter = Formatter::new(FormatterConfig::from_env())?;
    init_tracing(Arc::new(formatter), sink)
}
