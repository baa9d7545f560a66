//! Composite key layout.
//!
//! A secret lives at `client \x00 namespace \x00 id`. NUL cannot appear in
//! valid identifiers, so the three components are unambiguous and a scan of
//! `client \x00` covers exactly one client.

use gaia_core::constants::KEY_DELIMITER;

/// Compose the storage key for a secret.
pub fn compose_key(client: &str, namespace: &str, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(client.len() + namespace.len() + id.len() + 2);
    key.extend_from_slice(client.as_bytes());
    key.push(KEY_DELIMITER);
    key.extend_from_slice(namespace.as_bytes());
    key.push(KEY_DELIMITER);
    key.extend_from_slice(id.as_bytes());
    key
}

/// The scan prefix covering every secret of one client.
pub fn client_prefix(client: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(client.len() + 1);
    prefix.extend_from_slice(client.as_bytes());
    prefix.push(KEY_DELIMITER);
    prefix
}

/// Split a storage key back into `(client, namespace, id)`. Returns `None`
/// for malformed keys (wrong component count or invalid UTF-8).
pub fn split_key(key: &[u8]) -> Option<(String, String, String)> {
    let mut parts = key.splitn(3, |&b| b == KEY_DELIMITER);
    let client = std::str::from_utf8(parts.next()?).ok()?;
    let namespace = std::str::from_utf8(parts.next()?).ok()?;
    let id = std::str::from_utf8(parts.next()?).ok()?;
    Some((client.to_string(), namespace.to_string(), id.to_string()))
}

/// Human-readable form of a composite key for error messages and logs.
pub fn display_key(client: &str, namespace: &str, id: &str) -> String {
    format!("{client}/{namespace}/{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_uses_nul_delimiters() {
        assert_eq!(compose_key("web-a", "prod", "db_url"), b"web-a\x00prod\x00db_url");
    }

    #[test]
    fn prefix_ends_with_delimiter() {
        assert_eq!(client_prefix("web-a"), b"web-a\x00");
    }

    #[test]
    fn split_inverts_compose() {
        let key = compose_key("web-a", "prod", "db_url");
        let (client, namespace, id) = split_key(&key).unwrap();
        assert_eq!(client, "web-a");
        assert_eq!(namespace, "prod");
        assert_eq!(id, "db_url");
    }

    #[test]
    fn split_rejects_malformed_keys() {
        assert!(split_key(b"only-one-component").is_none());
        assert!(split_key(b"two\x00components").is_none());
    }

    #[test]
    fn prefix_does_not_match_longer_client_names() {
        let key = compose_key("web-ab", "prod", "x");
        assert!(!key.starts_with(&client_prefix("web-a")));
    }
}
