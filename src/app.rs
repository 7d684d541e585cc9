//! Wiring of configuration, persistence, and external collaborators.
//!
//! [`App`] is built once at startup and shared by the CLI and the HTTP
//! server. Collaborators are passed in explicitly, so tests can swap the
//! parser and the LLM for in-process stubs.

use anyhow::Result;
use std::sync::Arc;

use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::db;
use crate::documents::DocumentService;
use crate::feedback::{FeedbackProvider, OpenAiFeedback};
use crate::ingest::Ingestor;
use crate::migrate;
use crate::notes::NoteService;
use crate::parser::{create_parser, DocumentParser};
use crate::store::Store;

pub struct App {
    pub config: Config,
    pub store: Store,
    pub credentials: CredentialStore,
    pub documents: DocumentService,
    pub ingestor: Ingestor,
    pub notes: NoteService,
}

impl App {
    /// Connect to the database, apply the schema, and build the configured
    /// parser and LLM clients.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let credentials = CredentialStore::new(&config.credentials.path);
        let parser = create_parser(&config.parser, credentials.clone())?;
        let feedback: Arc<dyn FeedbackProvider> =
            Arc::new(OpenAiFeedback::new(&config.llm, credentials.clone())?);
        Self::with_services(config, parser, feedback).await
    }

    /// Like [`App::from_config`] with caller-supplied collaborators.
    pub async fn with_services(
        config: &Config,
        parser: Arc<dyn DocumentParser>,
        feedback: Arc<dyn FeedbackProvider>,
    ) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply_schema(&pool).await?;
        let store = Store::new(pool);

        Ok(Self {
            config: config.clone(),
            credentials: CredentialStore::new(&config.credentials.path),
            documents: DocumentService::new(store.clone()),
            ingestor: Ingestor::new(store.clone(), parser, &config.uploads),
            notes: NoteService::new(store.clone(), feedback),
            store,
        })
    }

    pub async fn close(&self) {
        self.store.pool().close().await;
    }
}
