//! Bulk import file parsing.
//!
//! The import file is a JSON array of `{client, namespace, id, value}`
//! objects, streamed to the daemon behind a single config frame.

use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use gaia_proto::v1::ImportSecretItem;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct FileItem {
    client: String,
    namespace: String,
    id: String,
    value: String,
}

/// Read and parse an import file.
pub fn read_import_file(path: &Path) -> Result<Vec<ImportSecretItem>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("could not read '{}'", path.display()))?;
    let items: Vec<FileItem> =
        serde_json::from_str(&raw).with_context(|| format!("could not parse '{}'", path.display()))?;

    Ok(items
        .into_iter()
        .map(|item| ImportSecretItem {
            client_name: item.client,
            namespace: item.namespace,
            id: item.id,
            value: item.value,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("import.json");
        std::fs::write(
            &path,
            r#"[
                {"client": "web-a", "namespace": "prod", "id": "db_url", "value": "postgres://db"},
                {"client": "common", "namespace": "common", "id": "region", "value": "eu-west-1"}
            ]"#,
        )
        .unwrap();

        let items = read_import_file(&path).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].client_name, "web-a");
        assert_eq!(items[1].id, "region");
    }

    #[test]
    fn rejects_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("import.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(read_import_file(&path).is_err());
    }
}
