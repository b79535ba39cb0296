//! Configuration management using the prefer crate.
//!
//! Settings come from four layers, highest precedence first:
//! CLI flags, environment variables, a config file, built-in defaults.
//! The config file is discovered by prefer (`docextract.toml`,
//! `docextract.yaml`, `docextract.json`, ... in the standard locations) or
//! given explicitly with `--config`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::documents::DEFAULT_EXTENSION;
use crate::export::DEFAULT_EXPORT_FILE;
use crate::extraction::TextExtractor;
use crate::extractor::{ExpectedFields, FieldListError};
use crate::llm::LlmConfig;

/// Name prefer uses to discover config files.
pub const CONFIG_NAME: &str = "docextract";

/// Problems found before any document is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing --dir")]
    MissingDir,

    #[error("Directory {} doesn't exist", .0.display())]
    DirNotFound(PathBuf),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("Missing --base-prompt-file")]
    MissingPromptFile,

    #[error("Failed to read base prompt file {}: {source}", .path.display())]
    PromptUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing --fields")]
    MissingFields,

    #[error("Invalid --fields: {0}")]
    InvalidFields(#[from] FieldListError),

    #[error("Config file error: {0}")]
    File(String),
}

/// Config file contents. Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Comma-separated list of expected fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<String>,
    /// Base prompt file path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_prompt_file: Option<String>,
    /// Document extension to scan for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    /// CSV export path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Generation service settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Text extraction settings.
    #[serde(default)]
    pub ocr: OcrConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Falls back to defaults when no config file is found.
    pub async fn load() -> Self {
        match prefer::load(CONFIG_NAME).await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("Ignoring config file {}: {}", path.display(), e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::File(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        match ext {
            "toml" => toml::from_str(contents)
                .map_err(|e| ConfigError::File(format!("Failed to parse TOML config: {}", e))),
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| ConfigError::File(format!("Failed to parse YAML config: {}", e))),
            _ => serde_json::from_str(contents)
                .map_err(|e| ConfigError::File(format!("Failed to parse JSON config: {}", e))),
        }
    }

    /// Get the base directory for resolving relative paths.
    /// Returns the config file's parent directory if available, otherwise None.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path from the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved against the config file's directory
    pub fn resolve_path(&self, path_str: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        match self.base_dir() {
            Some(base) if !path.is_absolute() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// `[ocr]` section: how PDFs and images are turned into text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Tesseract language code.
    pub language: String,
    /// PDFs with fewer non-whitespace characters per page are OCR'd.
    pub min_chars_per_page: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        let defaults = TextExtractor::new();
        Self {
            language: defaults.language().to_string(),
            min_chars_per_page: defaults.min_chars_per_page(),
        }
    }
}

impl OcrConfig {
    pub fn extractor(&self) -> TextExtractor {
        TextExtractor::new()
            .with_language(&self.language)
            .with_min_chars(self.min_chars_per_page)
    }
}

/// LLM-related CLI flags.
#[derive(Debug, Clone, Default)]
pub struct LlmOverrides {
    pub provider: Option<crate::llm::LlmProvider>,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

/// Layer env vars and CLI flags over the config file's LLM settings.
pub fn resolve_llm(config: &Config, overrides: &LlmOverrides) -> LlmConfig {
    let mut llm = config.llm.clone().with_env_overrides();
    if let Some(provider) = overrides.provider {
        llm.provider = provider;
    }
    if let Some(ref endpoint) = overrides.endpoint {
        llm.endpoint = Some(endpoint.clone());
    }
    if let Some(ref key) = overrides.api_key {
        llm.api_key = Some(key.clone());
    }
    if let Some(ref model) = overrides.model {
        llm.model = model.clone();
    }
    llm
}

/// Check that `dir` was given and is an existing directory.
pub fn resolve_dir(dir: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let dir = dir.ok_or(ConfigError::MissingDir)?;
    if !dir.exists() {
        return Err(ConfigError::DirNotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(ConfigError::NotADirectory(dir.to_path_buf()));
    }
    Ok(dir.to_path_buf())
}

/// Expected fields from the CLI, falling back to the config file.
pub fn resolve_fields(cli: Option<&str>, config: &Config) -> Result<ExpectedFields, ConfigError> {
    let list = cli
        .or(config.fields.as_deref())
        .ok_or(ConfigError::MissingFields)?;
    Ok(ExpectedFields::parse(list)?)
}

/// Document extension from the CLI, falling back to the config file, then `pdf`.
pub fn resolve_extension(cli: Option<&str>, config: &Config) -> String {
    cli.or(config.extension.as_deref())
        .unwrap_or(DEFAULT_EXTENSION)
        .to_string()
}

/// Export path from the CLI, falling back to the config file, then `all.csv`.
pub fn resolve_output(cli: Option<&Path>, config: &Config) -> PathBuf {
    match (cli, config.output.as_deref()) {
        (Some(path), _) => path.to_path_buf(),
        (None, Some(path)) => config.resolve_path(path),
        (None, None) => PathBuf::from(DEFAULT_EXPORT_FILE),
    }
}

/// Read the base prompt, read once per run and used verbatim.
pub fn read_base_prompt(cli: Option<&Path>, config: &Config) -> Result<String, ConfigError> {
    let path = match (cli, config.base_prompt_file.as_deref()) {
        (Some(path), _) => path.to_path_buf(),
        (None, Some(path)) => config.resolve_path(path),
        (None, None) => return Err(ConfigError::MissingPromptFile),
    };
    std::fs::read_to_string(&path).map_err(|source| ConfigError::PromptUnreadable { path, source })
}

/// Everything the `extract` command needs, validated up front.
#[derive(Debug, Clone)]
pub struct ExtractSettings {
    pub dir: PathBuf,
    pub base_prompt: String,
    pub fields: ExpectedFields,
    pub extension: String,
    pub output: PathBuf,
    pub llm: LlmConfig,
    pub ocr: OcrConfig,
}

/// CLI inputs for the `extract` command.
#[derive(Debug, Clone, Default)]
pub struct ExtractArgs {
    pub dir: Option<PathBuf>,
    pub base_prompt_file: Option<PathBuf>,
    pub fields: Option<String>,
    pub extension: Option<String>,
    pub output: Option<PathBuf>,
}

impl ExtractSettings {
    pub fn resolve(
        args: &ExtractArgs,
        config: &Config,
        llm: &LlmOverrides,
    ) -> Result<Self, ConfigError> {
        let dir = resolve_dir(args.dir.as_deref())?;
        let base_prompt = read_base_prompt(args.base_prompt_file.as_deref(), config)?;
        let fields = resolve_fields(args.fields.as_deref(), config)?;

        Ok(Self {
            dir,
            base_prompt,
            fields,
            extension: resolve_extension(args.extension.as_deref(), config),
            output: resolve_output(args.output.as_deref(), config),
            llm: resolve_llm(config, llm),
            ocr: config.ocr.clone(),
        })
    }
}
