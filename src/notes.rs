//! Note and feedback workflow.
//!
//! A note belongs to exactly one paragraph and each paragraph has at most one
//! note. Creation checks the document, the paragraph's ownership, and the
//! existing note in that order; the schema's unique constraint catches the
//! race between two concurrent creates.

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{ReaderError, Result};
use crate::feedback::{build_prompt, FeedbackProvider};
use crate::models::Note;
use crate::store::Store;

pub struct NoteService {
    store: Store,
    feedback: Arc<dyn FeedbackProvider>,
}

impl NoteService {
    pub fn new(store: Store, feedback: Arc<dyn FeedbackProvider>) -> Self {
        Self { store, feedback }
    }

    /// Notes of the document named `filename`, in paragraph order.
    pub async fn list_notes(&self, filename: &str) -> Result<Vec<Note>> {
        let doc = self.store.find_document(filename).await?.ok_or_else(|| {
            warn!(file = filename, "file not found when fetching notes");
            ReaderError::NotFound("File not found".to_string())
        })?;
        self.store.list_notes_for_document(doc.id).await
    }

    pub async fn create_note(
        &self,
        filename: &str,
        paragraph_id: i64,
        content: &str,
    ) -> Result<Note> {
        let doc = self.store.find_document(filename).await?.ok_or_else(|| {
            warn!(file = filename, "file not found when creating a note");
            ReaderError::NotFound("File not found".to_string())
        })?;

        let paragraph = self
            .store
            .find_paragraph(paragraph_id)
            .await?
            .filter(|p| p.file_id == doc.id)
            .ok_or_else(|| {
                warn!(file = filename, paragraph_id, "paragraph not found in file");
                ReaderError::NotFound("Paragraph not found in the specified file.".to_string())
            })?;

        if self
            .store
            .find_note_for_paragraph(paragraph.id)
            .await?
            .is_some()
        {
            warn!(file = filename, paragraph_id, "note already exists");
            return Err(ReaderError::Conflict(
                "Note already exists for this paragraph.".to_string(),
            ));
        }

        let note = self.store.insert_note(paragraph.id, content).await?;
        info!(file = filename, paragraph_id, note_id = note.id, "created note");
        Ok(note)
    }

    pub async fn update_note(&self, note_id: i64, content: &str) -> Result<Note> {
        let note = self
            .store
            .update_note(note_id, content)
            .await?
            .ok_or_else(|| {
                warn!(note_id, "note not found for update");
                ReaderError::NotFound("Note not found".to_string())
            })?;
        info!(note_id, "updated note");
        Ok(note)
    }

    pub async fn delete_note(&self, note_id: i64) -> Result<()> {
        if !self.store.delete_note(note_id).await? {
            warn!(note_id, "note not found for deletion");
            return Err(ReaderError::NotFound("Note not found".to_string()));
        }
        info!(note_id, "deleted note");
        Ok(())
    }

    /// Ask the LLM to evaluate `note_content` as a summary of the paragraph
    /// `paragraph_id`, given the document text up to that paragraph.
    pub async fn request_feedback(
        &self,
        paragraph_id: i64,
        context: &str,
        note_content: &str,
    ) -> Result<String> {
        let paragraph = self
            .store
            .find_paragraph(paragraph_id)
            .await?
            .ok_or_else(|| ReaderError::NotFound("Paragraph not found".to_string()))?;

        self.feedback_for_position(paragraph.order, context, note_content)
            .await
    }

    /// Build the prompt for a paragraph at `position` (1-based) and call the LLM once.
    pub async fn feedback_for_position(
        &self,
        position: i64,
        context: &str,
        note_content: &str,
    ) -> Result<String> {
        if context.trim().is_empty() {
            return Err(ReaderError::Validation(
                "No context available for this note.".to_string(),
            ));
        }

        let prompt = build_prompt(context, note_content, position);
        tracing::debug!(position, chars = prompt.len(), "feedback prompt built");

        match self.feedback.complete(&prompt).await {
            Ok(text) => {
                info!(position, model = self.feedback.model_name(), "feedback generated");
                Ok(text)
            }
            Err(e) => {
                tracing::error!(error = %e, "error in the request to the LLM service");
                Err(match e {
                    ReaderError::Service(_) => e,
                    other => ReaderError::Service(other.to_string()),
                })
            }
        }
    }
}
