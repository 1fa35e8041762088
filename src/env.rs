//! Environment variable names used by this crate for convenient
//! configuration from services running on Google Cloud.
//!
//! These are purely helpers; [`crate::formatter::Formatter`] itself never
//! reads the environment.

/// Google Cloud project that owns the traces, set by App Engine and
/// Cloud Run.
pub const GOOGLE_CLOUD_PROJECT_ENV: &str = "GOOGLE_CLOUD_PROJECT";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
