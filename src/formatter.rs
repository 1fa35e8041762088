use crate::env::{env_or, GOOGLE_CLOUD_PROJECT_ENV};
use crate::record::LogRecord;
use crate::severity::Severity;
use crate::trace_context;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io;

/// Configuration for [`Formatter`].
///
/// **Fields**
/// - `project_id`: Google Cloud project used to build the fully
///   qualified trace resource name `projects/{project_id}/traces/{id}`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormatterConfig {
    pub project_id: String,
}

impl FormatterConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        FormatterConfig { project_id: project_id.into() }
    }

    /// Read the project from the `GOOGLE_CLOUD_PROJECT` environment
    /// variable. An unset variable is reported by [`Formatter::new`].
    pub fn from_env() -> Self {
        FormatterConfig::new(env_or(GOOGLE_CLOUD_PROJECT_ENV, ""))
    }
}

/// Error type returned when a [`FormatterConfig`] is rejected.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("project id is required")]
    MissingProjectId,

    #[error("invalid project id {0:?}: must not contain '/' or whitespace")]
    InvalidProjectId(String),
}

/// Error type returned by [`Formatter::format`].
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error("failed to serialize log entry: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write log entry: {0}")]
    Io(#[from] io::Error),
}

/// Wire representation of one Cloud Logging entry.
///
/// `trace` and `span_id` are either both set or both absent, and absent
/// fields are left out of the JSON entirely so the entry is ingested as
/// untraced.
#[derive(Debug, Serialize, PartialEq)]
pub struct WireLogEntry<'a> {
    #[serde(rename = "logging.googleapis.com/trace", skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,

    #[serde(rename = "logging.googleapis.com/spanId", skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,

    pub data: &'a BTreeMap<String, Value>,

    #[serde(skip_serializing_if = "str::is_empty")]
    pub message: &'a str,

    pub severity: Severity,
}

/// Turns [`LogRecord`]s into line-delimited Cloud Logging JSON.
///
/// The formatter holds no mutable state; one instance can be shared
/// (e.g. behind an `Arc`) by any number of threads.
#[derive(Debug, Clone)]
pub struct Formatter {
    project_id: String,
}

impl Formatter {
    /// Validate `config` and build a formatter from it.
    ///
    /// The project id is used as given; surrounding whitespace is
    /// rejected rather than trimmed.
    pub fn new(config: FormatterConfig) -> Result<Self, ConfigError> {
        if config.project_id.trim().is_empty() {
            return Err(ConfigError::MissingProjectId);
        }
        if config.project_id.contains(|c: char| c == '/' || c.is_whitespace()) {
            return Err(ConfigError::InvalidProjectId(config.project_id));
        }
        Ok(Formatter { project_id: config.project_id })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Build the wire entry for `record` without serializing it.
    pub fn entry<'a>(&self, record: &'a LogRecord) -> WireLogEntry<'a> {
        let parsed = record
            .trace_context
            .as_deref()
            .filter(|raw| !raw.is_empty())
            .and_then(trace_context::parse);

        let (trace, span_id) = match parsed {
            Some(ctx) => (
                Some(format!("projects/{}/traces/{}", self.project_id, ctx.trace_id())),
                Some(ctx.span_id().to_string()),
            ),
            None => (None, None),
        };

        WireLogEntry {
            trace,
            span_id,
            data: &record.data,
            message: &record.message,
            severity: Severity::from(record.level),
        }
    }

    /// Format `record` as one JSON object followed by `\n`.
    pub fn format(&self, record: &LogRecord) -> Result<Vec<u8>, FormatError> {
        let mut line = serde_json::to_vec(&self.entry(record))?;
        line.push(b'\n');
        Ok(line)
    }

    /// Write the formatted line for `record` into `writer`.
    ///
    /// Failures of `writer` are reported as [`FormatError::Io`].
    pub fn format_to<W: io::Write>(&self, record: &LogRecord, mut writer: W) -> Result<(), FormatError> {
        serde_json::to_writer(&mut writer, &self.entry(record)).map_err(|e| {
            if e.is_io() {
                FormatError::Io(e.into())
            } else {
                FormatError::Serialize(e)
            }
        })?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogLevel;

    const HEADER: &str = "105445aa7843bc8bf206b12000100f00/0;o=1";

    fn formatter() -> Formatter {
        Formatter::new(FormatterConfig::new("my-proj")).unwrap()
    }

    fn as_json(line: &[u8]) -> Value {
        assert_eq!(line.last(), Some(&b'\n'));
        serde_json::from_slice(line).unwrap()
    }

    #[test]
    fn formats_reference_line() {
        let record = LogRecord::new(LogLevel::Info, "hi").with_trace_context(HEADER);
        let line = formatter().format(&record).unwrap();
        assert_eq!(
            String::from_utf8(line).unwrap(),
            "{\"logging.googleapis.com/trace\":\"projects/my-proj/traces/105445aa7843bc8bf206b12000100f00\",\
             \"logging.googleapis.com/spanId\":\"0\",\"data\":{},\"message\":\"hi\",\"severity\":\"INFO\"}\n"
        );
    }

    #[test]
    fn omits_trace_fields_without_context() {
        let record = LogRecord::new(LogLevel::Warn, "no trace").with_field("status", "hmmm");
        let json = as_json(&formatter().format(&record).unwrap());
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("logging.googleapis.com/trace"));
        assert!(!obj.contains_key("logging.googleapis.com/spanId"));
        assert_eq!(json["data"]["status"], "hmmm");
        assert_eq!(json["severity"], "WARNING");
    }

    #[test]
    fn omits_trace_fields_for_empty_or_malformed_context() {
        for raw in ["", "garbage", "105445aa7843bc8bf206b12000100f00"] {
            let record = LogRecord::new(LogLevel::Info, "x").with_trace_context(raw);
            let entry = formatter().entry(&record);
            assert_eq!(entry.trace, None);
            assert_eq!(entry.span_id, None);
        }
    }

    #[test]
    fn converts_decimal_span_in_output() {
        let record = LogRecord::new(LogLevel::Error, "boom")
            .with_trace_context("1ad1e4f50427b51eadc9b36064d40cc2/255;o=1");
        let json = as_json(&formatter().format(&record).unwrap());
        assert_eq!(
            json["logging.googleapis.com/trace"],
            "projects/my-proj/traces/1ad1e4f50427b51eadc9b36064d40cc2"
        );
        assert_eq!(json["logging.googleapis.com/spanId"], "ff");
    }

    #[test]
    fn output_is_deterministic() {
        let record = LogRecord::new(LogLevel::Debug, "same")
            .with_field("z", 1)
            .with_field("a", true)
            .with_field("m", serde_json::json!({"nested": [1, 2]}))
            .with_trace_context(HEADER);
        let f = formatter();
        assert_eq!(f.format(&record).unwrap(), f.format(&record).unwrap());
    }

    #[test]
    fn omits_empty_message() {
        let record = LogRecord::new(LogLevel::Info, "");
        let json = as_json(&formatter().format(&record).unwrap());
        assert!(json.get("message").is_none());
        assert_eq!(json["data"], serde_json::json!({}));
    }

    #[test]
    fn format_to_matches_format() {
        let record = LogRecord::new(LogLevel::Panic, "down").with_trace_context(HEADER);
        let f = formatter();
        let mut buf = Vec::new();
        f.format_to(&record, &mut buf).unwrap();
        assert_eq!(buf, f.format(&record).unwrap());
        assert_eq!(as_json(&buf)["severity"], "EMERGENCY");
    }

    #[test]
    fn rejects_bad_project_ids() {
        assert_eq!(
            Formatter::new(FormatterConfig::default()).unwrap_err(),
            ConfigError::MissingProjectId
        );
        assert_eq!(
            Formatter::new(FormatterConfig::new("  ")).unwrap_err(),
            ConfigError::MissingProjectId
        );
        assert_eq!(
            Formatter::new(FormatterConfig::new("a/b")).unwrap_err(),
            ConfigError::InvalidProjectId("a/b".to_string())
        );
    }

    #[test]
    fn rejects_padded_project_id() {
        assert_eq!(
            Formatter::new(FormatterConfig::new(" my-proj ")).unwrap_err(),
            ConfigError::InvalidProjectId(" my-proj ".to_string())
        );
        assert_eq!(formatter().project_id(), "my-proj");
    }

    struct BrokenWriter;

    impl io::Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn format_to_reports_writer_failure() {
        let record = LogRecord::new(LogLevel::Info, "lost").with_trace_context(HEADER);
        match formatter().format_to(&record, BrokenWriter) {
            Err(FormatError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("expected io error, got {:?}", other),
        }
    }
}
