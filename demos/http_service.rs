use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_cloud_logging::context::with_trace_context;
use tracing_cloud_logging::init::init_tracing_from_env;
use tracing_cloud_logging::stdout_sink::StdoutSink;

/// Stand-in for a route handler. Every event it emits is threaded into
/// the trace of the request that invoked it.
async fn say_hello(path: &str) {
    debug!(battery = "50", "Flux capacitor low");
    info!(status = "busted", path, "Warp speed activated");
    warn!(status = "hmmm", "You have been warning");
    error!(status = "busted", "These are not the drones you are looking for");
}

/// Simulates what request middleware does: capture the
/// `X-Cloud-Trace-Context` header (empty when absent) and run the
/// handler inside that request's scope.
async fn handle_request(header: Option<&str>, path: &str) {
    with_trace_context(header.unwrap_or_default(), say_hello(path)).await;
}

#[tokio::main]
async fn main() {
    // Run with GOOGLE_CLOUD_PROJECT=my-proj; JSON logging is sent to stdout.
    let handle = match init_tracing_from_env(Arc::new(StdoutSink::new())) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let requests = [
        (Some("1ad1e4f50427b51eadc9b36064d40cc2/8196282844182683029;o=1"), "/"),
        (Some("105445aa7843bc8bf206b12000100f00/0;o=1"), "/hello"),
        (None, "/untraced"),
    ];

    let tasks: Vec<_> = requests
        .into_iter()
        .map(|(header, path)| tokio::spawn(handle_request(header, path)))
        .collect();
    for task in tasks {
        let _ = task.await;
    }

    // The global subscriber is never dropped; give the background task
    // one flush interval to drain.
    tokio::time::sleep(tokio::time::Duration::from_millis(1100)).await;
    handle.abort();
}
