use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::info;

use tracing_cloud_logging::context::with_trace_context;
use tracing_cloud_logging::formatter::{Formatter, FormatterConfig};
use tracing_cloud_logging::init::init_tracing;
use tracing_cloud_logging::noop_sink::NoopSink;

#[tokio::main]
async fn main() {
    let formatter = match Formatter::new(FormatterConfig::new("load-test")) {
        Ok(formatter) => Arc::new(formatter),
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };
    if let Err(e) = init_tracing(formatter, Arc::new(NoopSink)) {
        eprintln!("{}", e);
        return;
    }

    let n: u64 = 100_000;
    let start = Instant::now();

    with_trace_context("105445aa7843bc8bf206b12000100f00/8196282844182683029;o=1", async {
        for i in 0..n {
            info!(iteration = i, "default load test event");
        }
    })
    .await;

    let elapsed = start.elapsed();
    println!("default config: formatted {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    // Give background task a little time to drain the channel
    sleep(Duration::from_secs(2)).await;
}
