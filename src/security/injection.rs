//! SQL injection detection.
//!
//! Detects common SQL injection patterns in free-form SQL fragments such as
//! `update_data`'s WHERE clause and `read_data`'s query.

use crate::error::ServerError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Compiled regex patterns for SQL injection detection.
///
/// These patterns are compiled once at first use (lazy static) for performance.
/// All patterns are hardcoded constants that have been verified to be valid regex.
static INJECTION_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    fn compile(pattern: &str) -> Regex {
        Regex::new(pattern).unwrap_or_else(|e| {
            panic!("Internal error: invalid regex pattern '{}': {}", pattern, e)
        })
    }

    vec![
        // Comment injection
        (compile(r"--"), "SQL line comment"),
        (compile(r"/\*"), "SQL block comment"),
        // Union-based injection
        (compile(r"(?i)\bUNION\s+(ALL\s+)?SELECT\b"), "UNION SELECT injection"),
        // OR-based injection (tautology)
        (compile(r"(?i)'\s*OR\s+'[^']*'\s*=\s*'"), "OR tautology injection"),
        (compile(r"(?i)\bOR\s+1\s*=\s*1\b"), "OR 1=1 injection"),
        // Stacked queries (multiple statements)
        (
            compile(r"(?i);\s*(SELECT|INSERT|UPDATE|DELETE|DROP|EXEC|EXECUTE|CREATE|ALTER|TRUNCATE|MERGE|DECLARE)\b"),
            "Stacked query injection",
        ),
        // Time-based blind injection
        (compile(r"(?i)\bWAITFOR\s+(DELAY|TIME)\b"), "Time-based blind injection (WAITFOR)"),
        // Extended stored procedures (common attack vectors)
        (compile(r"(?i)\bxp_cmdshell\b"), "xp_cmdshell execution attempt"),
        (compile(r"(?i)\bxp_reg\w+\b"), "Registry access attempt"),
        (compile(r"(?i)\bsp_oacreate\b"), "OLE automation attempt"),
        // Hex-encoded injection
        (compile(r"0x[0-9a-fA-F]{10,}"), "Long hex-encoded string"),
        // CHAR() obfuscation
        (
            compile(r"(?i)CHAR\s*\(\s*\d+\s*\)(\s*\+\s*CHAR\s*\(\s*\d+\s*\)){3,}"),
            "CHAR() obfuscation",
        ),
    ]
});

/// SQL injection detector.
#[derive(Debug, Clone, Copy, Default)]
pub struct InjectionDetector;

impl InjectionDetector {
    /// Create a new injection detector.
    pub fn new() -> Self {
        Self
    }

    /// Check a SQL fragment for injection patterns.
    ///
    /// Returns `Ok(())` if nothing is detected, or a validation error naming
    /// the detected pattern.
    pub fn check(&self, sql: &str) -> Result<(), ServerError> {
        for (pattern, description) in INJECTION_PATTERNS.iter() {
            if pattern.is_match(sql) {
                return Err(ServerError::validation(format!(
                    "Potentially unsafe SQL detected: {}",
                    description
                )));
            }
        }

        Ok(())
    }
}
