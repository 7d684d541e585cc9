use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Built frontend served for every path the API does not claim.
    #[serde(default)]
    pub frontend_dir: Option<PathBuf>,
    /// Value expected in the `x-token` header of the credential endpoints.
    #[serde(default = "default_auth_token")]
    pub auth_token: String,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            frontend_dir: None,
            auth_token: default_auth_token(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_auth_token() -> String {
    "default_secret_token".to_string()
}
fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadsConfig {
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    /// Per-file cap, checked by the ingestion workflow.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Cap on a whole multipart upload request (all files plus framing).
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            allowed_extensions: default_allowed_extensions(),
            max_upload_bytes: default_max_upload_bytes(),
            max_request_bytes: default_max_request_bytes(),
        }
    }
}

impl UploadsConfig {
    pub fn allows_extension(&self, ext: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    }

    /// Body limit for the upload route. Always leaves room for one file of
    /// `max_upload_bytes` plus its multipart headers.
    pub fn request_limit(&self) -> usize {
        self.max_request_bytes
            .max(self.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES))
    }
}

const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("text-reader")
}
fn default_allowed_extensions() -> Vec<String> {
    vec!["pdf".to_string(), "docx".to_string()]
}
fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}
fn default_max_request_bytes() -> usize {
    200 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct ParserConfig {
    #[serde(default = "default_parser_provider")]
    pub provider: String,
    #[serde(default = "default_parser_base_url")]
    pub base_url: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_parser_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            provider: default_parser_provider(),
            base_url: default_parser_base_url(),
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_parser_timeout_secs(),
        }
    }
}

fn default_parser_provider() -> String {
    "llama".to_string()
}
fn default_parser_base_url() -> String {
    "https://api.cloud.llamaindex.ai".to_string()
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_parser_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct CredentialsConfig {
    #[serde(default = "default_credentials_path")]
    pub path: PathBuf,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            path: default_credentials_path(),
        }
    }
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("./data/credentials.json")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.uploads.allowed_extensions.is_empty() {
        anyhow::bail!("uploads.allowed_extensions must not be empty");
    }
    if config.uploads.max_upload_bytes == 0 {
        anyhow::bail!("uploads.max_upload_bytes must be > 0");
    }
    if config.uploads.max_request_bytes == 0 {
        anyhow::bail!("uploads.max_request_bytes must be > 0");
    }

    match config.parser.provider.as_str() {
        "llama" | "local" => {}
        other => anyhow::bail!(
            "Unknown parser provider: '{}'. Must be llama or local.",
            other
        ),
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }
    if config.llm.max_tokens == 0 {
        anyhow::bail!("llm.max_tokens must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = parse("[db]\npath = \"/tmp/reader.sqlite\"\n").unwrap();
        assert_eq!(cfg.server.bind, "127.0.0.1:8000");
        assert_eq!(cfg.parser.provider, "llama");
        assert_eq!(cfg.llm.model, "gpt-4o");
        assert!(cfg.uploads.allows_extension("PDF"));
        assert!(cfg.uploads.allows_extension("docx"));
        assert!(!cfg.uploads.allows_extension("txt"));
    }

    #[test]
    fn test_unknown_parser_rejected() {
        let err = parse("[db]\npath = \"x\"\n[parser]\nprovider = \"ocr\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown parser provider"));
    }

    #[test]
    fn test_empty_extension_list_rejected() {
        let err = parse("[db]\npath = \"x\"\n[uploads]\nallowed_extensions = []\n").unwrap_err();
        assert!(err.to_string().contains("allowed_extensions"));
    }

    #[test]
    fn test_temperature_out_of_range() {
        assert!(parse("[db]\npath = \"x\"\n[llm]\ntemperature = 3.5\n").is_err());
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/nonexistent/reader.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_request_limit_fits_a_full_size_file() {
        let mut cfg = parse("[db]\npath = \"x\"\n").unwrap();
        assert_eq!(cfg.uploads.request_limit(), 200 * 1024 * 1024);

        cfg.uploads.max_upload_bytes = 1000;
        cfg.uploads.max_request_bytes = 500;
        assert!(cfg.uploads.request_limit() > 1000);
    }

    #[test]
    fn test_example_config_loads() {
        let cfg = load_config(Path::new("config/reader.example.toml")).unwrap();
        assert_eq!(cfg.server.auth_token, "change-me");
        assert_eq!(cfg.uploads.max_upload_bytes, 25 * 1024 * 1024);
        assert!(cfg.server.frontend_dir.is_some());
    }
}
