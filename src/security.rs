//! Security module for identifier handling, query validation and secret redaction.

mod identifiers;
mod injection;
mod redaction;
mod validation;

pub use identifiers::{
    escape_identifier, escape_single_identifier, parse_qualified_name, validate_word_identifier, MAX_IDENTIFIER_LENGTH,
};
pub use injection::InjectionDetector;
pub use redaction::{redact_credentials, redact_secret, REDACTED};
pub use validation::ReadQueryValidator;
