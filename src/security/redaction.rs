//! Credential redaction for operator-facing log messages.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Marker substituted for redacted secret values.
pub const REDACTED: &str = "***";

/// `password`/`pwd` followed by an optional separator and the value up to the
/// next `;`, `,` or whitespace.
static CREDENTIAL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(password|pwd)\b\s*[=:]?\s*[^;,\s]*|(?i)(password|pwd)[^;,\s]*")
        .unwrap_or_else(|e| panic!("Internal error: invalid credential pattern: {}", e))
});

/// Redact credential-like substrings from a message.
///
/// Matching is case-insensitive; each match is replaced with `password=***` or
/// `pwd=***`.
///
/// ```
/// use mssql_data_mcp::security::redact_credentials;
///
/// assert_eq!(
///     redact_credentials("Server=db;Password=secret123;User Id=sa"),
///     "Server=db;password=***;User Id=sa"
/// );
/// ```
pub fn redact_credentials(message: &str) -> String {
    CREDENTIAL_PATTERN
        .replace_all(message, |caps: &Captures<'_>| {
            let keyword = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().to_ascii_lowercase())
                .unwrap_or_else(|| "password".to_string());
            format!("{}={}", keyword, REDACTED)
        })
        .into_owned()
}

/// Redact every literal occurrence of `secret` in addition to credential patterns.
pub fn redact_secret(message: &str, secret: &str) -> String {
    let message = if secret.is_empty() {
        message.to_string()
    } else {
        message.replace(secret, REDACTED)
    };
    redact_credentials(&message)
}
