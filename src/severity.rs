use crate::record::LogLevel;
use serde::Serialize;

/// Cloud Logging `LogSeverity` values.
///
/// `Notice` and `Alert` are part of the target vocabulary but no
/// [`LogLevel`] maps onto them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Default,
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Default => "DEFAULT",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Notice => "NOTICE",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
            Severity::Alert => "ALERT",
            Severity::Emergency => "EMERGENCY",
        }
    }
}

impl From<LogLevel> for Severity {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Severity::Default,
            LogLevel::Debug => Severity::Debug,
            LogLevel::Info => Severity::Info,
            LogLevel::Warn => Severity::Warning,
            LogLevel::Error => Severity::Error,
            LogLevel::Fatal => Severity::Critical,
            LogLevel::Panic => Severity::Emergency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_level() {
        let table = [
            ("trace", "DEFAULT"),
            ("debug", "DEBUG"),
            ("info", "INFO"),
            ("warn", "WARNING"),
            ("error", "ERROR"),
            ("fatal", "CRITICAL"),
            ("panic", "EMERGENCY"),
        ];
        for (level, expected) in table {
            let level: LogLevel = level.parse().unwrap();
            assert_eq!(Severity::from(level).as_str(), expected);
        }
    }

    #[test]
    fn trace_and_panic_boundaries() {
        assert_eq!(Severity::from(LogLevel::Trace), Severity::Default);
        assert_eq!(Severity::from(LogLevel::Panic), Severity::Emergency);
    }

    #[test]
    fn serializes_as_uppercase_name() {
        for severity in [Severity::Notice, Severity::Alert, Severity::Warning] {
            let json = serde_json::to_string(&severity).unwrap();
            assert_eq!(json, format!("\"{}\"", severity.as_str()));
        }
    }
}
