//! Identifier validation.
//!
//! Client, namespace, and key identifiers share one grammar: 1-63 characters
//! of lowercase letters, digits, `-`, and `_`, starting and ending with a
//! letter or digit. The grammar keeps identifiers free of the NUL delimiter
//! and the `:` used by the internal metadata prefix.

use crate::constants::MAX_IDENTIFIER_LEN;
use crate::error::GaiaError;
use crate::error::Result;

/// Validate an identifier against the naming grammar.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(name, "must not be empty"));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(invalid(name, "must be at most 63 characters"));
    }

    let bytes = name.as_bytes();
    if !is_alphanumeric(bytes[0]) {
        return Err(invalid(name, "must start with a lowercase letter or digit"));
    }
    if !is_alphanumeric(bytes[bytes.len() - 1]) {
        return Err(invalid(name, "must end with a lowercase letter or digit"));
    }
    for &b in bytes {
        if !is_alphanumeric(b) && b != b'-' && b != b'_' {
            return Err(invalid(name, "may contain only lowercase letters, digits, '-', and '_'"));
        }
    }
    Ok(())
}

fn is_alphanumeric(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit()
}

fn invalid(name: &str, reason: &str) -> GaiaError {
    GaiaError::IdentifierInvalid {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_names() {
        assert!(validate_name("web-a").is_ok());
        assert!(validate_name("prod").is_ok());
        assert!(validate_name("db_url").is_ok());
        assert!(validate_name("common").is_ok());
        assert!(validate_name("a1-b2_c3").is_ok());
    }

    #[test]
    fn accepts_boundary_lengths() {
        assert!(validate_name("a").is_ok());
        assert!(validate_name(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn rejects_boundary_violations() {
        assert!(validate_name("").is_err());
        assert!(validate_name(&"a".repeat(64)).is_err());
    }

    #[test]
    fn rejects_bad_edges() {
        assert!(validate_name("-web").is_err());
        assert!(validate_name("web-").is_err());
        assert!(validate_name("_web").is_err());
        assert!(validate_name("web_").is_err());
    }

    #[test]
    fn rejects_bad_characters() {
        assert!(validate_name("Web").is_err());
        assert!(validate_name("web a").is_err());
        assert!(validate_name("web.a").is_err());
        assert!(validate_name("web:a").is_err());
        assert!(validate_name("web\x00a").is_err());
    }

    #[test]
    fn error_kind_is_identifier_invalid() {
        assert!(matches!(validate_name("-x"), Err(GaiaError::IdentifierInvalid { .. })));
    }
}
