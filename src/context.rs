use std::future::Future;

/// Header carrying the Google Cloud trace context of an inbound request.
pub const X_CLOUD_TRACE_CONTEXT_HEADER: &str = "X-Cloud-Trace-Context";

tokio::task_local! {
    static TRACE_CONTEXT: String;
}

/// Run `fut` with `raw` as the request's `X-Cloud-Trace-Context` value.
///
/// Every log event emitted while `fut` is polled picks the value up via
/// [`current_trace_context`]. Pass an empty string when the header is
/// absent. Tasks spawned from inside `fut` do not inherit the value and
/// have to be wrapped again.
pub async fn with_trace_context<F>(raw: impl Into<String>, fut: F) -> F::Output
where
    F: Future,
{
    TRACE_CONTEXT.scope(raw.into(), fut).await
}

/// Synchronous counterpart of [`with_trace_context`].
pub fn with_trace_context_sync<R>(raw: impl Into<String>, f: impl FnOnce() -> R) -> R {
    TRACE_CONTEXT.sync_scope(raw.into(), f)
}

/// The raw header value of the request currently being handled.
///
/// Returns `None` outside of any request scope or when the request had
/// no header.
pub fn current_trace_context() -> Option<String> {
    TRACE_CONTEXT
        .try_with(|raw| (!raw.is_empty()).then(|| raw.clone()))
        .ok()
        .flatten()
}
