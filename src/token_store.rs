//! Persisted auth token storage.
//!
//! The client keeps a single bearer token in a JSON file in the data
//! directory, under the same fixed key the web client used in browser
//! storage. Absence of the key means unauthenticated.

use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const TOKEN_KEY: &str = "dasham_token";
const STORE_FILE: &str = "dasham.json";

#[derive(Error, Debug)]
pub enum TokenStoreError {
    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TokenStoreError>;

#[derive(Debug, Clone)]
pub struct TokenStore {
    data_dir: PathBuf,
}

impl TokenStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
        }
    }

    fn file_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE)
    }

    fn read_store(&self) -> Result<Value> {
        let content = match fs::read_to_string(self.file_path()) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::from("{}"),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    fn write_store(&self, store: &Value) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        let content = serde_json::to_string_pretty(store)?;
        fs::write(self.file_path(), content)?;
        Ok(())
    }

    /// Returns the persisted token, or `None` when unauthenticated.
    pub fn token(&self) -> Result<Option<String>> {
        let store = self.read_store()?;
        Ok(store
            .get(TOKEN_KEY)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()))
    }

    /// Persists the token for subsequent requests and process restarts.
    pub fn set_token(&self, token: &str) -> Result<()> {
        let mut store = self.read_store()?;
        store[TOKEN_KEY] = json!(token);
        self.write_store(&store)
    }

    /// Removes the persisted token, returning the client to the
    /// unauthenticated state.
    pub fn clear_token(&self) -> Result<()> {
        let mut store = self.read_store()?;
        if let Some(map) = store.as_object_mut() {
            map.remove(TOKEN_KEY);
        }
        self.write_store(&store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_token_absent_by_default() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = TokenStore::new(temp_dir.path());

        assert!(store.token().unwrap().is_none());
    }

    #[test]
    fn test_token_round_trip() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = TokenStore::new(temp_dir.path());

        store.set_token("jwt-abc123").unwrap();
        assert_eq!(store.token().unwrap().as_deref(), Some("jwt-abc123"));

        // A fresh handle over the same directory sees the persisted token
        let reopened = TokenStore::new(temp_dir.path());
        assert_eq!(reopened.token().unwrap().as_deref(), Some("jwt-abc123"));
    }

    #[test]
    fn test_clear_token() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = TokenStore::new(temp_dir.path());

        store.set_token("jwt-abc123").unwrap();
        store.clear_token().unwrap();
        assert!(store.token().unwrap().is_none());
    }

    #[test]
    fn test_clear_token_on_empty_store_is_ok() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = TokenStore::new(temp_dir.path());

        assert!(store.clear_token().is_ok());
    }

    #[test]
    fn test_overwrite_replaces_token() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = TokenStore::new(temp_dir.path());

        store.set_token("old").unwrap();
        store.set_token("new").unwrap();
        assert_eq!(store.token().unwrap().as_deref(), Some("new"));
    }
}
