//! External service credentials, kept in a JSON file outside the database.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{ReaderError, Result};

/// API keys for the parsing service and the LLM service.
///
/// Field names on the wire match what the settings page sends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialSet {
    #[serde(rename = "OPENAI_API_KEY")]
    pub llm_key: String,
    #[serde(rename = "LLAMA_CLOUD_API_KEY")]
    pub parsing_key: String,
}

#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when the file is missing or unreadable as JSON.
    pub fn read(&self) -> Option<CredentialSet> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => {
                warn!(path = %self.path.display(), "credential file not found");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(set) => Some(set),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "credential file is not valid JSON");
                None
            }
        }
    }

    pub fn write(&self, credentials: &CredentialSet) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(credentials)?;
        std::fs::write(&self.path, json)?;
        info!(path = %self.path.display(), "credentials saved");
        Ok(())
    }

    /// Parsing-service key, or a service error telling the user to configure it.
    pub fn parsing_key(&self) -> Result<String> {
        let set = self.read().ok_or_else(missing_keys)?;
        if set.parsing_key.trim().is_empty() {
            return Err(ReaderError::Service(
                "LLAMA_CLOUD_API_KEY is not set.".to_string(),
            ));
        }
        Ok(set.parsing_key)
    }

    /// LLM-service key, or a service error telling the user to configure it.
    pub fn llm_key(&self) -> Result<String> {
        let set = self.read().ok_or_else(missing_keys)?;
        if set.llm_key.trim().is_empty() {
            return Err(ReaderError::Service("OPENAI_API_KEY is not set.".to_string()));
        }
        Ok(set.llm_key)
    }
}

fn missing_keys() -> ReaderError {
    ReaderError::Service(
        "API keys are not set. Please enter the API keys in the settings.".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_reads_none() {
        let tmp = TempDir::new().unwrap();
        let store = CredentialStore::new(tmp.path().join("nope.json"));
        assert!(store.read().is_none());
        assert!(matches!(store.llm_key(), Err(ReaderError::Service(_))));
    }

    #[test]
    fn test_write_then_read() {
        let tmp = TempDir::new().unwrap();
        let store = CredentialStore::new(tmp.path().join("nested/credentials.json"));
        let set = CredentialSet {
            llm_key: "sk-test".to_string(),
            parsing_key: "llx-test".to_string(),
        };
        store.write(&set).unwrap();
        assert_eq!(store.read(), Some(set));
        assert_eq!(store.llm_key().unwrap(), "sk-test");
        assert_eq!(store.parsing_key().unwrap(), "llx-test");
    }

    #[test]
    fn test_wire_names() {
        let json = r#"{"OPENAI_API_KEY":"a","LLAMA_CLOUD_API_KEY":"b"}"#;
        let set: CredentialSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.llm_key, "a");
        assert_eq!(set.parsing_key, "b");
    }

    #[test]
    fn test_blank_key_is_service_error() {
        let tmp = TempDir::new().unwrap();
        let store = CredentialStore::new(tmp.path().join("c.json"));
        store
            .write(&CredentialSet {
                llm_key: "sk".to_string(),
                parsing_key: " ".to_string(),
            })
            .unwrap();
        let err = store.parsing_key().unwrap_err();
        assert!(err.to_string().contains("LLAMA_CLOUD_API_KEY"));
    }

    #[test]
    fn test_invalid_json_reads_none() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("c.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(CredentialStore::new(path).read().is_none());
    }
}
