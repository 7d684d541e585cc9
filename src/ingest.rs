//! Document ingestion workflow.
//!
//! Validates each upload, writes it to a scoped scratch file, creates a
//! placeholder document, runs the configured [`DocumentParser`], segments the
//! extracted text, and stores the paragraphs. Files are processed one at a
//! time and independently: a failure on one file never rolls back documents
//! already committed for earlier files in the same batch.

use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::UploadsConfig;
use crate::error::{ErrorKind, ReaderError, Result};
use crate::filename;
use crate::models::Document;
use crate::parser::DocumentParser;
use crate::segment::segment;
use crate::store::Store;

/// One uploaded file as received from the router.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Why a single file in a batch produced no document.
#[derive(Debug, Clone, Serialize)]
pub struct UploadFailure {
    pub filename: String,
    #[serde(skip)]
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: String,
}

/// Outcome of a batch upload.
#[derive(Debug, Clone, Serialize, Default)]
pub struct BatchReport {
    pub documents: Vec<Document>,
    pub failures: Vec<UploadFailure>,
    /// Files the parser found no content in.
    pub skipped: Vec<String>,
}

/// Result of ingesting a single file.
#[derive(Debug)]
pub enum FileOutcome {
    Created(Document),
    /// Parser returned no content; the placeholder was removed.
    Empty,
}

pub struct Ingestor {
    store: Store,
    parser: Arc<dyn DocumentParser>,
    uploads: UploadsConfig,
}

impl Ingestor {
    pub fn new(store: Store, parser: Arc<dyn DocumentParser>, uploads: &UploadsConfig) -> Self {
        Self {
            store,
            parser,
            uploads: uploads.clone(),
        }
    }

    /// Ingest every file in `uploads`, in order.
    ///
    /// Returns the batch report when at least one document was created.
    /// When none were, the error keeps the failures' kind if they all agree
    /// (so a lone duplicate is a conflict); otherwise it is a
    /// [`ReaderError::BatchRejected`] carrying every per-file failure.
    pub async fn ingest_batch(&self, uploads: Vec<Upload>) -> Result<BatchReport> {
        if uploads.is_empty() {
            warn!("no files received for upload");
            return Err(ReaderError::Validation(
                "No files received for upload.".to_string(),
            ));
        }

        let mut report = BatchReport::default();
        for upload in uploads {
            let name = upload.filename.clone();
            match self.ingest_file(upload).await {
                Ok(FileOutcome::Created(doc)) => report.documents.push(doc),
                Ok(FileOutcome::Empty) => report.skipped.push(name),
                Err(e) => {
                    if e.kind() == ErrorKind::Internal {
                        error!(file = %name, error = %e, "error processing file");
                    } else {
                        warn!(file = %name, error = %e, "file rejected");
                    }
                    report.failures.push(UploadFailure {
                        filename: name,
                        kind: e.kind(),
                        code: e.kind().code(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if report.documents.is_empty() {
            warn!("no files processed successfully");
            return Err(rejection(report));
        }

        Ok(report)
    }

    /// Check an upload's name and type before anything is written.
    pub async fn validate(&self, upload: &Upload) -> Result<()> {
        filename::validate_filename(&upload.filename)?;

        let ext = filename::extension(&upload.filename).unwrap_or_default();
        if !self.uploads.allows_extension(&ext) {
            return Err(ReaderError::Validation(format!(
                "Unsupported file type: {}",
                upload.filename
            )));
        }

        if upload.bytes.len() > self.uploads.max_upload_bytes {
            return Err(ReaderError::Validation(format!(
                "File {} exceeds the maximum upload size of {} bytes",
                upload.filename, self.uploads.max_upload_bytes
            )));
        }

        if self.store.document_exists(&upload.filename).await? {
            return Err(ReaderError::Conflict(format!(
                "File name '{}' already taken.",
                upload.filename
            )));
        }

        Ok(())
    }

    /// Run the full workflow for one file.
    pub async fn ingest_file(&self, upload: Upload) -> Result<FileOutcome> {
        self.validate(&upload).await?;

        // Removed when dropped, whichever way this function returns.
        let scratch = self.write_scratch(&upload)?;
        info!(file = %upload.filename, "file temporarily saved");

        let placeholder = self.store.create_placeholder(&upload.filename).await?;

        let parsed = self
            .parser
            .parse(scratch.path(), &upload.filename)
            .await?;

        let Some(text) = parsed else {
            warn!(file = %upload.filename, parser = self.parser.name(), "no content found in file");
            self.store.delete_document_by_id(placeholder.id).await?;
            return Ok(FileOutcome::Empty);
        };

        let paragraphs = segment(&text);
        let stored = self
            .store
            .insert_paragraphs(placeholder.id, &paragraphs)
            .await?;
        self.store.set_document_content(placeholder.id, &text).await?;

        let document = self
            .store
            .find_document(&upload.filename)
            .await?
            .ok_or_else(|| {
                ReaderError::Internal(format!("document {} vanished after ingest", placeholder.id))
            })?;

        info!(
            file = %upload.filename,
            id = document.id,
            paragraphs = stored.len(),
            "file created and parsed"
        );
        drop(scratch);
        Ok(FileOutcome::Created(document))
    }

    fn write_scratch(&self, upload: &Upload) -> Result<tempfile::NamedTempFile> {
        std::fs::create_dir_all(&self.uploads.temp_dir)?;
        let suffix = filename::extension(&upload.filename)
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();
        let stem = upload
            .filename
            .strip_suffix(suffix.as_str())
            .unwrap_or(&upload.filename);
        let mut file = tempfile::Builder::new()
            .prefix(&format!("{}-", stem))
            .suffix(&suffix)
            .tempfile_in(&self.uploads.temp_dir)?;
        file.write_all(&upload.bytes)?;
        file.flush()?;
        Ok(file)
    }
}

/// Error for a batch in which no document was created.
fn rejection(report: BatchReport) -> ReaderError {
    let details = report
        .failures
        .iter()
        .map(|f| format!("{}: {}", f.filename, f.message))
        .chain(
            report
                .skipped
                .iter()
                .map(|s| format!("{}: no content found", s)),
        )
        .collect::<Vec<_>>()
        .join("; ");
    let message = format!("No files processed successfully. {}", details);

    match report.failures.first() {
        None => ReaderError::Validation(message),
        Some(first)
            if report.skipped.is_empty()
                && report.failures.iter().all(|f| f.kind == first.kind) =>
        {
            ReaderError::with_kind(first.kind, message)
        }
        Some(_) => ReaderError::BatchRejected {
            message,
            failures: report.failures,
        },
    }
}
