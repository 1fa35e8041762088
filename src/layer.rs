use crate::context::current_trace_context;
use crate::formatter::Formatter;
use crate::record::{LogLevel, LogRecord};
use crate::sink::LogSink;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

const MAX_SEND_ATTEMPTS: u32 = 5;

/// `tracing_subscriber` layer that renders every event as a Cloud
/// Logging JSON line and forwards it to an asynchronous [`LogSink`] via
/// a bounded channel and background task.
///
/// The `X-Cloud-Trace-Context` of the request being handled is read from
/// [`crate::context`] at the moment the event is emitted, so the event
/// must be emitted from within [`crate::context::with_trace_context`] to
/// be threaded into the request's trace. Sink I/O is fully decoupled from
/// application threads.
pub struct CloudLoggingLayer {
    formatter: Arc<Formatter>,
    sender: mpsc::Sender<Vec<u8>>,
    /// Total events seen by the layer.
    pub total_events: Arc<AtomicU64>,
    /// Successfully enqueued into channel.
    pub enqueued_events: Arc<AtomicU64>,
    /// Dropped because the channel was full.
    pub dropped_events: Arc<AtomicU64>,
    /// Dropped because the background task is gone.
    pub closed_events: Arc<AtomicU64>,
    /// Dropped because the record could not be formatted.
    pub format_errors: Arc<AtomicU64>,
}

impl CloudLoggingLayer {
    /// Create a new layer and spawn a background task that pulls lines
    /// from a bounded channel and sends them to the provided
    /// [`LogSink`].
    ///
    /// Must be called from within a Tokio runtime. The task exits after
    /// draining the channel once the layer (the only sender) is dropped.
    ///
    /// Minimal thresholds are enforced for `buffer`, `batch_size` and
    /// `flush_interval` to avoid degenerate configurations.
    pub fn new(
        formatter: Arc<Formatter>,
        sink: Arc<dyn LogSink>,
        buffer: usize,
        batch_size: usize,
        flush_interval: Duration,
    ) -> (Self, JoinHandle<()>) {
        let buffer = buffer.max(16);
        let batch_size = batch_size.max(1);
        let flush_interval = flush_interval.max(Duration::from_millis(10));

        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(buffer);

        let handle = tokio::spawn(async move {
            let mut batch = Vec::with_capacity(batch_size);
            let backoff = Duration::from_millis(100);
            let max_backoff = Duration::from_secs(10);

            // Created once so incoming lines do not push the deadline back.
            let mut tick = interval(flush_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    line = rx.recv() => match line {
                        Some(line) => {
                            batch.push(line);
                            if batch.len() >= batch_size {
                                if let Err(e) = send_batch(&*sink, &mut batch, backoff, max_backoff).await {
                                    eprintln!("error sending log batch: {}", e);
                                }
                            }
                        }
                        None => {
                            if let Err(e) = send_batch(&*sink, &mut batch, backoff, max_backoff).await {
                                eprintln!("error flushing log batch on shutdown: {}", e);
                            }
                            if let Err(e) = sink.flush().await {
                                eprintln!("error flushing log sink: {}", e);
                            }
                            break;
                        }
                    },
                    _ = tick.tick() => {
                        if !batch.is_empty() {
                            if let Err(e) = send_batch(&*sink, &mut batch, backoff, max_backoff).await {
                                eprintln!("error flushing log batch: {}", e);
                            }
                        }
                    }
                }
            }
        });

        (Self {
            formatter,
            sender: tx,
            total_events: Arc::new(AtomicU64::new(0)),
            enqueued_events: Arc::new(AtomicU64::new(0)),
            dropped_events: Arc::new(AtomicU64::new(0)),
            closed_events: Arc::new(AtomicU64::new(0)),
            format_errors: Arc::new(AtomicU64::new(0)),
        }, handle)
    }
}

/// Send `batch` in order, resuming after the last accepted line on retry.
/// The batch is always empty on return; after `MAX_SEND_ATTEMPTS` failed
/// attempts the remaining lines are discarded and the last error returned.
async fn send_batch(
    sink: &dyn LogSink,
    batch: &mut Vec<Vec<u8>>,
    mut backoff: Duration,
    max_backoff: Duration,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut sent = 0;
    let mut attempt = 1;
    loop {
        let mut last_err: Option<Box<dyn Error + Send + Sync>> = None;
        for line in &batch[sent..] {
            if let Err(e) = sink.send(line).await {
                last_err = Some(e);
                break;
            }
            sent += 1;
        }

        let Some(err) = last_err else {
            batch.clear();
            return Ok(());
        };

        if attempt >= MAX_SEND_ATTEMPTS {
            batch.clear();
            return Err(err);
        }

        eprintln!("log sink send failed, retrying in {:?}", backoff);
        sleep(backoff).await;
        backoff = std::cmp::min(backoff * 2, max_backoff);
        attempt += 1;
    }
}

impl<S> Layer<S> for CloudLoggingLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let mut data = BTreeMap::new();
        let mut message: Option<String> = None;

        let mut visitor = FieldVisitor { fields: &mut data, message: &mut message };
        event.record(&mut visitor);

        let record = LogRecord {
            level: LogLevel::from(*event.metadata().level()),
            message: message.unwrap_or_default(),
            data,
            trace_context: current_trace_context(),
        };

        let line = match self.formatter.format(&record) {
            Ok(line) => line,
            Err(e) => {
                self.format_errors.fetch_add(1, Ordering::Relaxed);
                eprintln!("dropping log record that failed to format: {}", e);
                return;
            }
        };

        match self.sender.try_send(line) {
            Ok(()) => {
                self.enqueued_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(_)) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("log channel full, dropping log record");
            }
            Err(TrySendError::Closed(_)) => {
                self.closed_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("log sink task is not running, dropping log record");
            }
        }
    }
}

use serde_json::Value;
use tracing::field::{Field, Visit};

/// Collects event fields into the record's `data`, routing the
/// `message` field into the record message.
pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, Value>,
    pub message: &'a mut Option<String>,
}

impl<'a> FieldVisitor<'a> {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.insert(field, Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        // Non-finite floats have no JSON representation and become null.
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.insert(field, Value::String(format!("{:?}", value)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FlakySink {
        failures_left: Mutex<u32>,
        accepted: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl LogSink for FlakySink {
        async fn send(&self, line: &[u8]) -> Result<(), Box<dyn Error + Send + Sync>> {
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err("unavailable".into());
            }
            self.accepted.lock().unwrap().push(line.to_vec());
            Ok(())
        }
    }

    fn sink(failures: u32) -> FlakySink {
        FlakySink { failures_left: Mutex::new(failures), accepted: Mutex::new(Vec::new()) }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_sink_recovers() {
        let sink = sink(2);
        let mut batch = vec![b"a\n".to_vec(), b"b\n".to_vec()];
        send_batch(&sink, &mut batch, Duration::from_millis(100), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(batch.is_empty());
        assert_eq!(*sink.accepted.lock().unwrap(), vec![b"a\n".to_vec(), b"b\n".to_vec()]);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let sink = sink(u32::MAX);
        let mut batch = vec![b"a\n".to_vec()];
        let res = send_batch(&sink, &mut batch, Duration::from_millis(100), Duration::from_secs(1)).await;
        assert!(res.is_err());
        assert!(batch.is_empty());
        assert!(sink.accepted.lock().unwrap().is_empty());
    }
}
