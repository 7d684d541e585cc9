//! Document-parsing collaborators.
//!
//! A [`DocumentParser`] turns an uploaded file into markdown-flavoured text.
//! `Ok(None)` means the service found nothing to extract; that is not an
//! error and the ingestion workflow skips the file.
//!
//! | Config value | Parser |
//! |--------------|--------|
//! | `"llama"` | [`LlamaParseClient`], the LlamaParse cloud API |
//! | `"local"` | [`LocalParser`], in-process PDF/DOCX extraction |

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::ParserConfig;
use crate::credentials::CredentialStore;
use crate::error::{ReaderError, Result};
use crate::extract;
use crate::filename;

#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// Short identifier used in logs (e.g. `"llama"`).
    fn name(&self) -> &str;

    /// Extract text from the file at `path`, uploaded as `declared_name`.
    async fn parse(&self, path: &Path, declared_name: &str) -> Result<Option<String>>;
}

/// Build the parser selected by `[parser].provider`.
pub fn create_parser(
    config: &ParserConfig,
    credentials: CredentialStore,
) -> anyhow::Result<Arc<dyn DocumentParser>> {
    match config.provider.as_str() {
        "llama" => Ok(Arc::new(LlamaParseClient::new(config, credentials)?)),
        "local" => Ok(Arc::new(LocalParser)),
        other => anyhow::bail!("Unknown parser provider: {}", other),
    }
}

fn none_if_blank(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

// ============ Local ============

/// Extracts text in-process; needs no credentials.
pub struct LocalParser;

#[async_trait]
impl DocumentParser for LocalParser {
    fn name(&self) -> &str {
        "local"
    }

    async fn parse(&self, path: &Path, declared_name: &str) -> Result<Option<String>> {
        let ext = filename::extension(declared_name).unwrap_or_default();
        let bytes = tokio::fs::read(path).await?;

        // pdf-extract is synchronous and CPU bound.
        let text = tokio::task::spawn_blocking(move || extract::extract_text(&bytes, &ext))
            .await
            .map_err(|e| ReaderError::Internal(e.to_string()))?
            .map_err(|e| ReaderError::Service(e.to_string()))?;

        Ok(none_if_blank(text))
    }
}

// ============ LlamaParse ============

/// Client for the LlamaParse cloud API.
///
/// Uploads the file, polls the job until it finishes, then fetches the
/// markdown result. The API key is read from the [`CredentialStore`] on each
/// call so keys saved through the settings endpoint apply immediately.
pub struct LlamaParseClient {
    client: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
    timeout: Duration,
    credentials: CredentialStore,
}

#[derive(Deserialize)]
struct JobResponse {
    id: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize)]
struct MarkdownResponse {
    #[serde(default)]
    markdown: String,
}

impl LlamaParseClient {
    pub fn new(config: &ParserConfig, credentials: CredentialStore) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            timeout: Duration::from_secs(config.timeout_secs),
            credentials,
        })
    }

    async fn upload(&self, api_key: &str, path: &Path, declared_name: &str) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        let part = reqwest::multipart::Part::bytes(bytes).file_name(declared_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/api/parsing/upload", self.base_url))
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReaderError::Service(format!(
                "LlamaParse upload failed ({}): {}",
                status, body
            )));
        }

        let job: JobResponse = response.json().await?;
        Ok(job.id)
    }

    async fn wait_for_job(&self, api_key: &str, job_id: &str) -> Result<()> {
        let started = Instant::now();
        loop {
            let job: JobResponse = self
                .client
                .get(format!("{}/api/parsing/job/{}", self.base_url, job_id))
                .bearer_auth(api_key)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            let status = job.status.unwrap_or_default();
            debug!(job = %job.id, status = %status, "LlamaParse job status");
            match status.as_str() {
                "SUCCESS" => return Ok(()),
                "ERROR" | "CANCELED" => {
                    return Err(ReaderError::Service(format!(
                        "LlamaParse job {} ended with status {}",
                        job_id, status
                    )))
                }
                _ => {}
            }

            if started.elapsed() >= self.timeout {
                return Err(ReaderError::Service(format!(
                    "LlamaParse job {} timed out after {}s",
                    job_id,
                    self.timeout.as_secs()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn fetch_markdown(&self, api_key: &str, job_id: &str) -> Result<String> {
        let result: MarkdownResponse = self
            .client
            .get(format!(
                "{}/api/parsing/job/{}/result/markdown",
                self.base_url, job_id
            ))
            .bearer_auth(api_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(result.markdown)
    }
}

#[async_trait]
impl DocumentParser for LlamaParseClient {
    fn name(&self) -> &str {
        "llama"
    }

    async fn parse(&self, path: &Path, declared_name: &str) -> Result<Option<String>> {
        let api_key = self.credentials.parsing_key()?;

        let job_id = self.upload(&api_key, path, declared_name).await?;
        info!(file = declared_name, job = %job_id, "LlamaParse job submitted");

        self.wait_for_job(&api_key, &job_id).await?;
        let markdown = self.fetch_markdown(&api_key, &job_id).await?;

        let result = none_if_blank(markdown);
        if result.is_none() {
            warn!(file = declared_name, "LlamaParse returned no content");
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_none_if_blank() {
        assert_eq!(none_if_blank("  \n\n ".to_string()), None);
        assert_eq!(none_if_blank("x".to_string()).as_deref(), Some("x"));
    }

    #[test]
    fn test_create_parser_by_provider() {
        let tmp = TempDir::new().unwrap();
        let creds = CredentialStore::new(tmp.path().join("c.json"));
        let mut cfg = ParserConfig::default();
        assert_eq!(create_parser(&cfg, creds.clone()).unwrap().name(), "llama");
        cfg.provider = "local".to_string();
        assert_eq!(create_parser(&cfg, creds.clone()).unwrap().name(), "local");
        cfg.provider = "ocr".to_string();
        assert!(create_parser(&cfg, creds).is_err());
    }

    #[tokio::test]
    async fn test_llama_without_credentials_is_service_error() {
        let tmp = TempDir::new().unwrap();
        let creds = CredentialStore::new(tmp.path().join("missing.json"));
        let client = LlamaParseClient::new(&ParserConfig::default(), creds).unwrap();
        let file = tmp.path().join("a.pdf");
        std::fs::write(&file, b"%PDF").unwrap();
        let err = client.parse(&file, "a.pdf").await.unwrap_err();
        assert!(matches!(err, ReaderError::Service(_)));
    }

    #[tokio::test]
    async fn test_local_parser_rejects_garbage_pdf() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("scratch");
        std::fs::write(&file, b"not a pdf").unwrap();
        let err = LocalParser.parse(&file, "report.pdf").await.unwrap_err();
        assert!(matches!(err, ReaderError::Service(_)));
    }
}
