//! Validation of caller-supplied read queries.

use crate::error::ServerError;
use crate::security::InjectionDetector;
use once_cell::sync::Lazy;
use regex::Regex;

/// Pattern for the statement kinds a read query may start with.
static READ_QUERY_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(SELECT|WITH)\b")
        .unwrap_or_else(|e| panic!("Internal error: invalid read query pattern: {}", e))
});

/// Keywords that are never allowed in a read query, even inside a SELECT.
///
/// All patterns are hardcoded constants that have been verified to be valid regex.
static BLOCKED_KEYWORDS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    fn compile(pattern: &str) -> Regex {
        Regex::new(pattern).unwrap_or_else(|e| {
            panic!("Internal error: invalid regex pattern '{}': {}", pattern, e)
        })
    }

    vec![
        // Data modification
        (compile(r"(?i)\bDELETE\b"), "DELETE"),
        (compile(r"(?i)\bUPDATE\b"), "UPDATE"),
        (compile(r"(?i)\bINSERT\b"), "INSERT"),
        (compile(r"(?i)\bMERGE\b"), "MERGE"),
        (compile(r"(?i)\bTRUNCATE\b"), "TRUNCATE"),
        (compile(r"(?i)\bINTO\b"), "INTO"),
        // Schema changes
        (compile(r"(?i)\bDROP\b"), "DROP"),
        (compile(r"(?i)\bALTER\b"), "ALTER"),
        (compile(r"(?i)\bCREATE\b"), "CREATE"),
        // Permissions
        (compile(r"(?i)\bGRANT\b"), "GRANT"),
        (compile(r"(?i)\bREVOKE\b"), "REVOKE"),
        // Execution and batches
        (compile(r"(?i)\bEXEC(UTE)?\b"), "EXEC"),
        (compile(r"(?i)\bDECLARE\b"), "DECLARE"),
        (compile(r"(?i)\bBEGIN\b"), "BEGIN"),
        (compile(r"(?i)\bCOMMIT\b"), "COMMIT"),
        (compile(r"(?i)\bROLLBACK\b"), "ROLLBACK"),
        (compile(r"(?i)\bTRANSACTION\b"), "TRANSACTION"),
        (compile(r"(?i)\bWAITFOR\b"), "WAITFOR"),
        (compile(r"(?i)\bxp_\w+"), "xp_ extended stored procedure"),
        (compile(r"(?i)\bsp_\w+"), "sp_ system procedure"),
        // External data access
        (compile(r"(?i)\bOPENROWSET\b"), "OPENROWSET"),
        (compile(r"(?i)\bOPENQUERY\b"), "OPENQUERY"),
        (compile(r"(?i)\bOPENDATASOURCE\b"), "OPENDATASOURCE"),
        (compile(r"(?i)\bBULK\b"), "BULK"),
        // Server-level operations
        (compile(r"(?i)\bBACKUP\b"), "BACKUP"),
        (compile(r"(?i)\bRESTORE\b"), "RESTORE"),
        (compile(r"(?i)\bSHUTDOWN\b"), "SHUTDOWN"),
        (compile(r"(?i)\bKILL\b"), "KILL"),
    ]
});

/// Validator for the `read_data` tool's free-form query.
///
/// A query passes when it is a single SELECT (or CTE) statement without
/// comments, without any blocked keyword and without injection patterns.
#[derive(Debug, Clone)]
pub struct ReadQueryValidator {
    max_length: usize,
    detector: InjectionDetector,
}

impl ReadQueryValidator {
    /// Create a new validator accepting queries up to `max_length` characters.
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            detector: InjectionDetector::new(),
        }
    }

    /// Validate a read query.
    pub fn validate(&self, query: &str) -> Result<(), ServerError> {
        let trimmed = query.trim();

        if trimmed.is_empty() {
            return Err(ServerError::validation(
                "Query must be a non-empty string.",
            ));
        }

        if trimmed.chars().count() > self.max_length {
            return Err(ServerError::validation(format!(
                "Query exceeds maximum length of {} characters.",
                self.max_length
            )));
        }

        if !READ_QUERY_START.is_match(trimmed) {
            return Err(ServerError::validation(
                "Query must start with SELECT or WITH. Only read operations are allowed.",
            ));
        }

        if trimmed.contains("--") || trimmed.contains("/*") || trimmed.contains("*/") {
            return Err(ServerError::validation(
                "Comments are not allowed in queries.",
            ));
        }

        // A single trailing separator is tolerated.
        let body = trimmed.strip_suffix(';').unwrap_or(trimmed);
        if body.contains(';') {
            return Err(ServerError::validation(
                "Multiple statements are not allowed.",
            ));
        }

        for (pattern, keyword) in BLOCKED_KEYWORDS.iter() {
            if pattern.is_match(body) {
                return Err(ServerError::validation(format!(
                    "Keyword '{}' is not allowed in read queries.",
                    keyword
                )));
            }
        }

        self.detector.check(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_READ_QUERY_LENGTH;

    fn validator() -> ReadQueryValidator {
        ReadQueryValidator::new(MAX_READ_QUERY_LENGTH)
    }

    #[test]
    fn test_accepts_select_and_cte() {
        let v = validator();
        assert!(v.validate("SELECT * FROM Users").is_ok());
        assert!(v.validate("  select id, name from dbo.Users where id = 1;").is_ok());
        assert!(v
            .validate("WITH recent AS (SELECT TOP 10 * FROM Orders) SELECT * FROM recent")
            .is_ok());
    }

    #[test]
    fn test_rejects_non_select() {
        let v = validator();
        assert!(v.validate("DELETE FROM Users").is_err());
        assert!(v.validate("EXEC sp_who").is_err());
        assert!(v.validate("").is_err());
        assert!(v.validate("   ").is_err());
    }

    #[test]
    fn test_rejects_comments() {
        let v = validator();
        assert!(v.validate("SELECT * FROM Users -- trailing").is_err());
        assert!(v.validate("SELECT /* x */ * FROM Users").is_err());
    }

    #[test]
    fn test_rejects_stacked_statements() {
        let err = validator()
            .validate("SELECT 1; SELECT 2")
            .unwrap_err();
        assert_eq!(err.to_string(), "Multiple statements are not allowed.");
    }

    #[test]
    fn test_rejects_blocked_keywords() {
        let v = validator();
        assert!(v.validate("SELECT * INTO Backup FROM Users").is_err());
        assert!(v.validate("SELECT * FROM OPENROWSET('x', 'y')").is_err());
        assert!(v.validate("SELECT * FROM Users WAITFOR DELAY '0:0:5'").is_err());
        assert!(v.validate("SELECT xp_cmdshell('dir')").is_err());
    }

    #[test]
    fn test_keyword_match_uses_word_boundaries() {
        let v = validator();
        assert!(v.validate("SELECT created_at, updated_by FROM Audit").is_ok());
        assert!(v.validate("SELECT * FROM Deletions").is_ok());
    }

    #[test]
    fn test_rejects_injection_patterns() {
        assert!(validator()
            .validate("SELECT * FROM Users WHERE id = 1 OR 1=1")
            .is_err());
    }

    #[test]
    fn test_length_limit() {
        let v = ReadQueryValidator::new(20);
        assert!(v.validate("SELECT * FROM Users").is_ok());
        assert!(v.validate("SELECT * FROM LongTableName").is_err());
    }
}
