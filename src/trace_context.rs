/// Length of the trace ID prefix of an `X-Cloud-Trace-Context` value.
pub const TRACE_ID_LEN: usize = 32;

// 32-char trace ID + '/' + at least one span character.
const MIN_HEADER_LEN: usize = TRACE_ID_LEN + 2;

/// Trace and span identifiers extracted from an `X-Cloud-Trace-Context`
/// header of the form `TRACE_ID/SPAN_ID;o=TRACE_FLAG`.
///
/// Values of this type are only produced by [`parse`], so both IDs are
/// always non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    trace_id: String,
    span_id: String,
    sampled: Option<bool>,
}

impl TraceContext {
    /// The 32-character trace ID, copied verbatim from the header.
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Span ID rendered as lowercase hex when the header carried the
    /// legacy decimal form, otherwise the header value unchanged.
    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    /// The `o=` trace flag: `Some(true)` for `o=1`, `Some(false)` for
    /// `o=0`, `None` when absent or unrecognised.
    pub fn sampled(&self) -> Option<bool> {
        self.sampled
    }
}

/// Parse a raw `X-Cloud-Trace-Context` header value.
///
/// Malformed input never fails loudly; it yields `None`, which callers
/// treat as "no trace information".
///
/// Span IDs are handled decimal-first: a span made only of ASCII digits
/// that fits into a `u64` is re-rendered as unpadded lowercase hex
/// (`255` becomes `ff`). Anything else is assumed to be encoded already
/// and is passed through.
pub fn parse(raw: &str) -> Option<TraceContext> {
    if raw.len() < MIN_HEADER_LEN || raw.as_bytes()[TRACE_ID_LEN] != b'/' {
        return None;
    }

    // The byte at TRACE_ID_LEN is ASCII, so both slices start on char boundaries.
    let trace_id = &raw[..TRACE_ID_LEN];
    let rest = &raw[TRACE_ID_LEN + 1..];

    let (span, options) = match rest.rfind(';') {
        Some(idx) => (&rest[..idx], Some(&rest[idx + 1..])),
        None => (rest, None),
    };
    if span.is_empty() {
        return None;
    }

    Some(TraceContext {
        trace_id: trace_id.to_string(),
        span_id: canonical_span_id(span),
        sampled: options.and_then(parse_trace_flag),
    })
}

fn canonical_span_id(span: &str) -> String {
    if !span.bytes().all(|b| b.is_ascii_digit()) {
        return span.to_string();
    }
    match span.parse::<u64>() {
        Ok(n) => format!("{:x}", n),
        Err(_) => span.to_string(),
    }
}

fn parse_trace_flag(options: &str) -> Option<bool> {
    match options.strip_prefix("o=")? {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}
