//! Policy document corpus

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub scheme_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub source: String,
}

impl PolicyDocument {
    /// Build a document from one JSON object; `None` without an `id` and a string `content`
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let id = match object.get("id")? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let content = object.get("content")?.as_str()?.to_string();
        let text = |key: &str| -> String {
            match object.get(key) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            }
        };

        Some(Self {
            id,
            content,
            scheme_id: text("scheme_id"),
            title: text("title"),
            source: text("source"),
        })
    }
}

/// Load a JSON array of documents.
///
/// A missing file, malformed JSON or a non-array top level yields an empty
/// corpus; entries without `id` and `content` are skipped.
pub fn load_documents<P: AsRef<Path>>(path: P) -> Vec<PolicyDocument> {
    let path = path.as_ref();
    if !path.exists() {
        info!(path = %path.display(), "Policy documents not found, corpus is empty");
        return Vec::new();
    }

    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read policy documents");
            return Vec::new();
        }
    };

    let entries = match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Array(entries)) => entries,
        Ok(_) => {
            warn!(path = %path.display(), "Policy documents file is not a JSON array");
            return Vec::new();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Policy docs JSON parsing failed");
            return Vec::new();
        }
    };

    let total = entries.len();
    let documents: Vec<PolicyDocument> = entries.iter().filter_map(PolicyDocument::from_json).collect();
    if documents.len() < total {
        warn!(skipped = total - documents.len(), "Skipped policy documents without id or content");
    }
    info!(path = %path.display(), documents = documents.len(), "Loaded policy documents");
    documents
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy_docs.json");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_filters_incomplete_entries() {
        let (_dir, path) = write(
            &json!([
                {"id": "pmfby-1", "content": "Crop insurance", "scheme_id": "PMFBY", "title": "Fasal Bima"},
                {"id": "no-content"},
                {"content": "no id"},
                "not an object",
                {"id": 7, "content": "numeric id"}
            ])
            .to_string(),
        );

        let docs = load_documents(&path);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].scheme_id, "PMFBY");
        assert_eq!(docs[0].source, "");
        assert_eq!(docs[1].id, "7");
    }

    #[test]
    fn test_missing_file_is_empty() {
        assert!(load_documents("/nonexistent/policy_docs.json").is_empty());
    }

    #[test]
    fn test_malformed_json_is_empty() {
        let (_dir, path) = write("[{\"id\": ");
        assert!(load_documents(&path).is_empty());
    }

    #[test]
    fn test_non_array_is_empty() {
        let (_dir, path) = write("{\"id\": \"a\", \"content\": \"b\"}");
        assert!(load_documents(&path).is_empty());
    }
}
