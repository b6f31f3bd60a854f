use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::translation::orchestrator::BatchOptions;
use crate::translation::prompts::TranslationStyle;
use crate::verification::coordinator::VerificationOptions;
use crate::verification::scanner::ScanOptions;

/// Application configuration module
/// This module handles loading, validating and saving the JSON configuration
/// file and turns its sections into the option structs of the library.

/// Environment variable consulted when the config file holds no API key
pub const API_KEY_ENV: &str = "SUBTRANS_API_KEY";

/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Target language (ISO code or English name)
    pub target_language: String,

    /// LLM provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Batch translation settings
    #[serde(default)]
    pub translation: TranslationSettings,

    /// Verification and approval settings
    #[serde(default)]
    pub verification: VerificationSettings,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
///
/// All three speak the OpenAI `chat/completions` dialect.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: Mistral AI
    #[default]
    Mistral,
    // @provider: OpenAI
    OpenAI,
    // @provider: OpenRouter
    OpenRouter,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Mistral => "Mistral",
            Self::OpenAI => "OpenAI",
            Self::OpenRouter => "OpenRouter",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Mistral => "mistral".to_string(),
            Self::OpenAI => "openai".to_string(),
            Self::OpenRouter => "openrouter".to_string(),
        }
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mistral" => Ok(Self::Mistral),
            "openai" => Ok(Self::OpenAI),
            "openrouter" => Ok(Self::OpenRouter),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type", default)]
    pub provider_type: TranslationProvider,

    // @field: Model name, provider default when empty
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key, falls back to SUBTRANS_API_KEY when empty
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL, provider default when empty
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Retries after the first attempt
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    // @field: Base backoff, doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    // @field: Rate limit (requests per minute)
    #[serde(default)]
    pub rate_limit: Option<u32>,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        let rate_limit = match provider_type {
            TranslationProvider::Mistral => default_mistral_rate_limit(),
            TranslationProvider::OpenAI => default_openai_rate_limit(),
            TranslationProvider::OpenRouter => default_openrouter_rate_limit(),
        };
        Self {
            provider_type,
            model: String::new(),
            api_key: String::new(),
            endpoint: String::new(),
            timeout_secs: default_timeout_secs(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            rate_limit,
        }
    }

    /// Get the model, falling back to the provider default
    pub fn get_model(&self) -> String {
        if !self.model.is_empty() {
            return self.model.clone();
        }
        match self.provider_type {
            TranslationProvider::Mistral => default_mistral_model(),
            TranslationProvider::OpenAI => default_openai_model(),
            TranslationProvider::OpenRouter => default_openrouter_model(),
        }
    }

    /// Get the endpoint, falling back to the provider default
    pub fn get_endpoint(&self) -> String {
        if !self.endpoint.is_empty() {
            return self.endpoint.clone();
        }
        match self.provider_type {
            TranslationProvider::Mistral => default_mistral_endpoint(),
            TranslationProvider::OpenAI => default_openai_endpoint(),
            TranslationProvider::OpenRouter => default_openrouter_endpoint(),
        }
    }

    /// Get the API key, falling back to the environment
    pub fn get_api_key(&self) -> String {
        if !self.api_key.is_empty() {
            return self.api_key.clone();
        }
        std::env::var(API_KEY_ENV).unwrap_or_default()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::new(TranslationProvider::default())
    }
}

/// Context window preset
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContextSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl ContextSize {
    // @returns: (context before, context after, batch size)
    pub fn window(&self) -> (usize, usize, usize) {
        match self {
            Self::Small => (15, 15, 30),
            Self::Medium => (20, 20, 50),
            Self::Large => (30, 30, 80),
        }
    }
}

impl std::str::FromStr for ContextSize {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            _ => Err(anyhow!("Invalid context size: {} (expected small, medium or large)", s)),
        }
    }
}

/// Batch translation settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationSettings {
    /// Translation style
    #[serde(default)]
    pub style: TranslationStyle,

    /// Context window preset
    #[serde(default)]
    pub context_size: ContextSize,

    /// Overrides the preset batch size
    #[serde(default)]
    pub batch_size: Option<usize>,

    /// Overrides the preset context-before size
    #[serde(default)]
    pub context_before: Option<usize>,

    /// Overrides the preset context-after size
    #[serde(default)]
    pub context_after: Option<usize>,

    /// Delay between windows in milliseconds
    #[serde(default = "default_pacing_delay_ms")]
    pub pacing_delay_ms: u64,

    /// Fixed sampling seed; a random one is drawn per job when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

impl TranslationSettings {
    /// Orchestrator options after applying overrides to the preset
    pub fn batch_options(&self) -> BatchOptions {
        let (before, after, batch) = self.context_size.window();
        BatchOptions {
            batch_size: self.batch_size.unwrap_or(batch),
            context_before: self.context_before.unwrap_or(before),
            context_after: self.context_after.unwrap_or(after),
            pacing_delay: Duration::from_millis(self.pacing_delay_ms),
        }
    }
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            style: TranslationStyle::default(),
            context_size: ContextSize::default(),
            batch_size: None,
            context_before: None,
            context_after: None,
            pacing_delay_ms: default_pacing_delay_ms(),
            seed: None,
        }
    }
}

/// Verification and approval settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerificationSettings {
    /// Blocks per analysis window
    #[serde(default = "default_scan_window")]
    pub scan_window: usize,

    /// Blocks shared by consecutive analysis windows
    #[serde(default = "default_scan_overlap")]
    pub scan_overlap: usize,

    /// Largest block-number gap inside one issue group
    #[serde(default = "default_group_gap")]
    pub group_gap: usize,

    /// Blocks shown before an issue under review
    #[serde(default = "default_approval_context")]
    pub approval_context_before: usize,

    /// Blocks shown after an issue under review
    #[serde(default = "default_approval_context")]
    pub approval_context_after: usize,

    /// Buffered issues that trigger a re-translation round
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,

    /// Temperature for analysis and re-translation requests
    #[serde(default = "default_analysis_temperature")]
    pub analysis_temperature: f32,

    /// Top-p for analysis and re-translation requests
    #[serde(default = "default_analysis_top_p")]
    pub analysis_top_p: f32,

    /// Delay after each analysis or re-translation call in milliseconds
    #[serde(default = "default_pacing_delay_ms")]
    pub pacing_delay_ms: u64,
}

impl VerificationSettings {
    /// Coordinator options for these settings
    pub fn verification_options(&self) -> VerificationOptions {
        let pacing_delay = Duration::from_millis(self.pacing_delay_ms);
        VerificationOptions {
            scan: ScanOptions {
                window_size: self.scan_window,
                overlap: self.scan_overlap,
                pacing_delay,
            },
            group_gap: self.group_gap,
            context_before: self.approval_context_before,
            context_after: self.approval_context_after,
            flush_threshold: self.flush_threshold,
            pacing_delay,
        }
    }
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            scan_window: default_scan_window(),
            scan_overlap: default_scan_overlap(),
            group_gap: default_group_gap(),
            approval_context_before: default_approval_context(),
            approval_context_after: default_approval_context(),
            flush_threshold: default_flush_threshold(),
            analysis_temperature: default_analysis_temperature(),
            analysis_top_p: default_analysis_top_p(),
            pacing_delay_ms: default_pacing_delay_ms(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(anyhow!("Invalid log level: {}", s)),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000 // doubled on each retry
}

fn default_pacing_delay_ms() -> u64 {
    1000
}

fn default_scan_window() -> usize {
    10
}

fn default_scan_overlap() -> usize {
    3
}

fn default_group_gap() -> usize {
    2
}

fn default_approval_context() -> usize {
    2
}

fn default_flush_threshold() -> usize {
    3
}

fn default_analysis_temperature() -> f32 {
    0.1
}

fn default_analysis_top_p() -> f32 {
    0.9
}

fn default_mistral_endpoint() -> String {
    "https://api.mistral.ai/v1".to_string()
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openrouter_endpoint() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_mistral_model() -> String {
    "mistral-large-latest".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openrouter_model() -> String {
    "deepseek/deepseek-chat-v3-0324:free".to_string()
}

fn default_mistral_rate_limit() -> Option<u32> {
    Some(60)
}

fn default_openai_rate_limit() -> Option<u32> {
    Some(60)
}

fn default_openrouter_rate_limit() -> Option<u32> {
    Some(20) // free-tier models are throttled hard
}

impl Config {
    /// Load the configuration from `path`, writing defaults there when the file is missing
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file {} not found, creating it with defaults", path.display());
            let config = Config::default();
            config.save(path)?;
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        crate::language_utils::resolve_language_name(&self.target_language)?;

        if self.provider.get_api_key().is_empty() {
            return Err(anyhow!(
                "API key is required for the {} provider (set provider.api_key or {})",
                self.provider.provider_type.display_name(),
                API_KEY_ENV
            ));
        }

        let batch = self.translation.batch_options();
        if batch.batch_size == 0 {
            return Err(anyhow!("translation.batch_size must be at least 1"));
        }

        let verification = &self.verification;
        if verification.scan_window == 0 {
            return Err(anyhow!("verification.scan_window must be at least 1"));
        }
        if verification.scan_overlap >= verification.scan_window {
            return Err(anyhow!(
                "verification.scan_overlap ({}) must be smaller than scan_window ({})",
                verification.scan_overlap, verification.scan_window
            ));
        }
        if verification.flush_threshold == 0 {
            return Err(anyhow!("verification.flush_threshold must be at least 1"));
        }
        if !(0.0..=2.0).contains(&verification.analysis_temperature) {
            return Err(anyhow!("verification.analysis_temperature must be between 0.0 and 2.0"));
        }
        if !(0.0..=1.0).contains(&verification.analysis_top_p) {
            return Err(anyhow!("verification.analysis_top_p must be between 0.0 and 1.0"));
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            target_language: "ru".to_string(),
            provider: ProviderConfig::default(),
            translation: TranslationSettings::default(),
            verification: VerificationSettings::default(),
            log_level: LogLevel::default(),
        }
    }
}
