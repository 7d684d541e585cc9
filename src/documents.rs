//! Document library operations: list, get, rename, delete.

use tracing::{info, warn};

use crate::error::{ReaderError, Result};
use crate::filename::validate_filename;
use crate::models::Document;
use crate::store::Store;

pub struct DocumentService {
    store: Store,
}

impl DocumentService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<Document>> {
        let docs = self.store.list_documents().await?;
        info!(count = docs.len(), "listing documents");
        Ok(docs)
    }

    pub async fn get(&self, filename: &str) -> Result<Document> {
        self.store.find_document(filename).await?.ok_or_else(|| {
            warn!(file = filename, "file not found");
            ReaderError::NotFound("File not found".to_string())
        })
    }

    /// Full extracted text of a document.
    pub async fn content(&self, filename: &str) -> Result<String> {
        Ok(self.get(filename).await?.content)
    }

    /// Rename a document. The new name follows the upload rules and must be free.
    pub async fn rename(&self, filename: &str, new_filename: &str) -> Result<Document> {
        if new_filename.is_empty() {
            warn!("new filename was not provided");
            return Err(ReaderError::Validation(
                "New filename is required.".to_string(),
            ));
        }
        validate_filename(new_filename)?;

        info!(from = filename, to = new_filename, "renaming file");
        let doc = self.store.rename_document(filename, new_filename).await?;
        info!(from = filename, to = new_filename, "file renamed");
        Ok(doc)
    }

    /// Delete a document with all its paragraphs and notes.
    pub async fn delete(&self, filename: &str) -> Result<()> {
        if !self.store.delete_document(filename).await? {
            warn!(file = filename, "file not found for deletion");
            return Err(ReaderError::NotFound("File not found.".to_string()));
        }
        info!(file = filename, "deleted file and its paragraphs and notes");
        Ok(())
    }
}
