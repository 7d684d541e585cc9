//! # Text Reader
//!
//! Backend for a reading-comprehension tool. Users upload PDF or DOCX
//! documents, which are converted to text by a parsing service and split into
//! paragraphs. Readers attach one summary note to each paragraph and can ask
//! an LLM to evaluate that note against the surrounding text.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────┐   ┌──────────┐
//! │  Upload  │──▶│ Parser (HTTP │──▶│ Segmenter │──▶│  SQLite  │
//! │ PDF/DOCX │   │  or local)   │   │           │   │          │
//! └──────────┘   └──────────────┘   └───────────┘   └────┬─────┘
//!                                                        │
//!                       ┌────────────────────────────────┤
//!                       ▼                                ▼
//!                 ┌──────────┐                    ┌─────────────┐
//!                 │   CLI    │                    │    HTTP     │
//!                 │ (reader) │                    │ notes + LLM │
//!                 └──────────┘                    └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! reader init                    # create database
//! reader ingest notes.pdf        # parse and store a document
//! reader list                    # show stored documents
//! reader serve                   # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error type shared by all workflows |
//! | [`models`] | Documents, paragraphs, notes |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`store`] | Persistence of documents, paragraphs, notes |
//! | [`segment`] | Paragraph segmentation |
//! | [`filename`] | Filename validation |
//! | [`credentials`] | API key file |
//! | [`extract`] | In-process PDF/DOCX text extraction |
//! | [`parser`] | Document parsing services |
//! | [`feedback`] | Prompt construction and LLM client |
//! | [`ingest`] | Upload workflow |
//! | [`documents`] | Document listing, rename, delete |
//! | [`notes`] | Note workflows and feedback requests |
//! | [`app`] | Wiring of config, store, and collaborators |
//! | [`server`] | HTTP API |

pub mod app;
pub mod config;
pub mod credentials;
pub mod db;
pub mod documents;
pub mod error;
pub mod extract;
pub mod feedback;
pub mod filename;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod notes;
pub mod parser;
pub mod segment;
pub mod server;
pub mod store;
