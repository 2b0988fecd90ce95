use crate::cache::{CacheConfig, CachingDefinitionSource};
use crate::cli::{Cli, OutputFormat, VerbosityLevel};
use crate::file_discovery::FileDiscovery;
use crate::http_client::{HttpClientConfig, HttpDefinitionSource};
use crate::loader::LoaderConfig;
use crate::reader::DEFAULT_MAX_DEPTH;
use crate::source::{ChainedDefinitionSource, DefinitionSource, DirectoryDefinitionSource};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Prefix of every environment variable the tool reads
pub const ENV_PREFIX: &str = "XML_TUPLES_";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub definitions: DefinitionsConfig,
    pub resolver: ResolverConfig,
    pub network: NetworkConfig,
    pub cache: DiskCacheConfig,
    pub reader: ReaderConfig,
    pub output: OutputConfig,
    pub files: FileConfig,
}

/// Where type definitions come from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DefinitionsConfig {
    /// Directories searched for `<local-name>.xml`, in order
    pub directories: Vec<PathBuf>,
    /// Base URL for definitions not found locally
    pub base_url: Option<String>,
}

/// How documents are resolved and loaded
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResolverConfig {
    /// Documents loaded concurrently (defaults to the CPU count)
    pub threads: Option<usize>,
    /// Limit for one document, including definition loading
    pub document_timeout_seconds: u64,
    /// Stop after the first failing document
    pub fail_fast: bool,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// HTTP request timeout in seconds
    pub timeout_seconds: u64,
    /// Number of retry attempts for failed downloads
    pub retry_attempts: u32,
    /// Retry delay in milliseconds
    pub retry_delay_ms: u64,
}

/// Disk cache for remote definitions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiskCacheConfig {
    pub enabled: bool,
    pub directory: PathBuf,
    /// Time-to-live for cached definitions in hours
    pub ttl_hours: u64,
}

/// Tuple reader settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReaderConfig {
    pub max_depth: usize,
    /// Freeze tuples once read
    pub freeze_tuples: bool,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormatConfig,
    pub verbose: bool,
    pub quiet: bool,
}

/// File processing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    pub extensions: Vec<String>,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    /// Directory depth below the scanned path
    pub max_depth: Option<usize>,
    pub follow_symlinks: bool,
}

/// Output format configuration (serializable version of CLI OutputFormat)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormatConfig {
    Human,
    Json,
    Summary,
}

impl FromStr for OutputFormatConfig {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(OutputFormatConfig::Human),
            "json" => Ok(OutputFormatConfig::Json),
            "summary" => Ok(OutputFormatConfig::Summary),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

impl From<OutputFormat> for OutputFormatConfig {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Human => OutputFormatConfig::Human,
            OutputFormat::Json => OutputFormatConfig::Json,
            OutputFormat::Summary => OutputFormatConfig::Summary,
        }
    }
}

impl From<OutputFormatConfig> for OutputFormat {
    fn from(format: OutputFormatConfig) -> Self {
        match format {
            OutputFormatConfig::Human => OutputFormat::Human,
            OutputFormatConfig::Json => OutputFormat::Json,
            OutputFormatConfig::Summary => OutputFormat::Summary,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            threads: None,
            document_timeout_seconds: 60,
            fail_fast: false,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for DiskCacheConfig {
    fn default() -> Self {
        let defaults = CacheConfig::default();
        Self {
            enabled: true,
            directory: defaults.directory,
            ttl_hours: defaults.ttl_hours,
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            freeze_tuples: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormatConfig::Human,
            verbose: false,
            quiet: false,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["xml".to_string()],
            include_patterns: vec![],
            exclude_patterns: vec![],
            max_depth: None,
            follow_symlinks: false,
        }
    }
}

impl Config {
    pub fn thread_count(&self) -> usize {
        self.resolver.threads.unwrap_or_else(num_cpus::get)
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.output.quiet {
            VerbosityLevel::Quiet
        } else if self.output.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            max_concurrent: self.thread_count(),
            timeout: Duration::from_secs(self.resolver.document_timeout_seconds),
            fail_fast: self.resolver.fail_fast,
            freeze_tuples: self.reader.freeze_tuples,
            max_depth: self.reader.max_depth,
            include_composite: self.output.format == OutputFormatConfig::Json,
        }
    }

    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            base_url: self.definitions.base_url.clone(),
            timeout_seconds: self.network.timeout_seconds,
            retry_attempts: self.network.retry_attempts,
            retry_delay_ms: self.network.retry_delay_ms,
            ..Default::default()
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            directory: self.cache.directory.clone(),
            ttl_hours: self.cache.ttl_hours,
        }
    }

    /// Local directories first, then HTTP (behind the disk cache when enabled)
    pub fn definition_source(&self) -> crate::error::Result<Arc<dyn DefinitionSource>> {
        let mut chain = ChainedDefinitionSource::new(Vec::new());
        if !self.definitions.directories.is_empty() {
            chain.push(Arc::new(DirectoryDefinitionSource::new(
                self.definitions.directories.clone(),
            )));
        }

        let http: Arc<dyn DefinitionSource> =
            Arc::new(HttpDefinitionSource::new(self.http_client_config())?);
        if self.cache.enabled {
            chain.push(Arc::new(CachingDefinitionSource::new(
                http,
                &self.cache_config(),
            )));
        } else {
            chain.push(http);
        }

        Ok(Arc::new(chain))
    }

    pub fn file_discovery(&self) -> crate::error::Result<FileDiscovery> {
        Ok(FileDiscovery::new()
            .with_extensions(self.files.extensions.clone())
            .with_include_patterns(self.files.include_patterns.clone())?
            .with_exclude_patterns(self.files.exclude_patterns.clone())?
            .with_max_depth(self.files.max_depth)
            .with_follow_symlinks(self.files.follow_symlinks))
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: defaults -> file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        Self::load_config_with(cli, &SystemEnvProvider).await
    }

    pub async fn load_config_with(cli: &Cli, env: &impl EnvProvider) -> Result<Config> {
        let mut config = match &cli.config {
            Some(config_path) => Self::load_from_file(config_path).await?,
            None => Self::find_config_file().await?.unwrap_or_default(),
        };

        config = Self::apply_environment_overrides_with(env, config)?;
        config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON); missing keys take defaults
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => match toml::from_str::<Config>(&content) {
                Ok(config) => Ok(config),
                Err(_) => Ok(serde_json::from_str(&content)?),
            },
        }
    }

    /// Find a configuration file in the current directory, then the user config directory
    pub async fn find_config_file() -> Result<Option<Config>> {
        let config_names = [
            "xml-tuples.toml",
            "xml-tuples.json",
            ".xml-tuples.toml",
            ".xml-tuples.json",
        ];

        let mut candidates: Vec<PathBuf> = config_names.iter().map(PathBuf::from).collect();
        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("xml-tuples");
            candidates.extend(config_names.iter().map(|name| app_config_dir.join(name)));
        }

        for path in candidates {
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }
        Ok(None)
    }

    /// Apply `XML_TUPLES_*` overrides from a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        if let Some(directories) = env.get(&env_key("DEFINITIONS")) {
            config.definitions.directories = std::env::split_paths(&directories).collect();
        }
        if let Some(base_url) = env.get(&env_key("BASE_URL")) {
            config.definitions.base_url = Some(base_url);
        }

        if let Some(threads) = parse_env(env, "THREADS")? {
            config.resolver.threads = Some(threads);
        }
        if let Some(fail_fast) = parse_env(env, "FAIL_FAST")? {
            config.resolver.fail_fast = fail_fast;
        }

        if let Some(timeout) = parse_env(env, "TIMEOUT")? {
            config.network.timeout_seconds = timeout;
        }
        if let Some(retry_attempts) = parse_env(env, "RETRY_ATTEMPTS")? {
            config.network.retry_attempts = retry_attempts;
        }

        if let Some(cache_dir) = env.get(&env_key("CACHE_DIR")) {
            config.cache.directory = PathBuf::from(cache_dir);
        }
        if let Some(cache_ttl) = parse_env(env, "CACHE_TTL")? {
            config.cache.ttl_hours = cache_ttl;
        }
        if let Some(enabled) = parse_env(env, "CACHE_ENABLED")? {
            config.cache.enabled = enabled;
        }

        if let Some(max_depth) = parse_env(env, "MAX_DEPTH")? {
            config.reader.max_depth = max_depth;
        }
        if let Some(freeze) = parse_env(env, "FREEZE")? {
            config.reader.freeze_tuples = freeze;
        }

        if let Some(verbose) = parse_env(env, "VERBOSE")? {
            config.output.verbose = verbose;
        }
        if let Some(quiet) = parse_env(env, "QUIET")? {
            config.output.quiet = quiet;
        }
        if let Some(format) = parse_env(env, "FORMAT")? {
            config.output.format = format;
        }

        if let Some(extensions) = env.get(&env_key("EXTENSIONS")) {
            config.files.extensions = extensions
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration; only flags actually given override
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if !cli.definitions.is_empty() {
            config.definitions.directories = cli.definitions.clone();
        }
        if let Some(base_url) = &cli.base_url {
            config.definitions.base_url = Some(base_url.clone());
        }

        if cli.threads.is_some() {
            config.resolver.threads = cli.threads;
        }
        if cli.fail_fast {
            config.resolver.fail_fast = true;
        }

        if let Some(timeout) = cli.timeout {
            config.network.timeout_seconds = timeout;
        }
        if let Some(retry_attempts) = cli.retry_attempts {
            config.network.retry_attempts = retry_attempts;
        }

        if let Some(cache_dir) = &cli.cache_dir {
            config.cache.directory = cache_dir.clone();
        }
        if let Some(cache_ttl) = cli.cache_ttl {
            config.cache.ttl_hours = cache_ttl;
        }
        if cli.no_cache {
            config.cache.enabled = false;
        }

        if let Some(max_depth) = cli.max_depth {
            config.reader.max_depth = max_depth;
        }
        if cli.freeze {
            config.reader.freeze_tuples = true;
        }

        if let Some(format) = cli.format {
            config.output.format = format.into();
        }
        if cli.verbose > 0 {
            config.output.verbose = true;
            config.output.quiet = false;
        }
        if cli.quiet {
            config.output.quiet = true;
            config.output.verbose = false;
        }

        if let Some(extensions) = cli.get_extensions() {
            config.files.extensions = extensions;
        }
        if !cli.include_patterns.is_empty() {
            config.files.include_patterns = cli.include_patterns.clone();
        }
        if !cli.exclude_patterns.is_empty() {
            config.files.exclude_patterns = cli.exclude_patterns.clone();
        }

        config
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if let Some(threads) = config.resolver.threads {
            if threads == 0 {
                return Err(ConfigError::Validation(
                    "Number of threads must be greater than 0".to_string(),
                ));
            }
            if threads > 1000 {
                return Err(ConfigError::Validation(
                    "Number of threads cannot exceed 1000".to_string(),
                ));
            }
        }
        if config.resolver.document_timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Document timeout must be greater than 0".to_string(),
            ));
        }

        if let Some(base_url) = &config.definitions.base_url
            && !(base_url.starts_with("http://") || base_url.starts_with("https://"))
        {
            return Err(ConfigError::Validation(format!(
                "Base URL must be http or https: {}",
                base_url
            )));
        }

        if config.cache.enabled && config.cache.ttl_hours == 0 {
            return Err(ConfigError::Validation(
                "Cache TTL must be greater than 0".to_string(),
            ));
        }

        if config.network.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }
        if config.network.retry_attempts > 10 {
            return Err(ConfigError::Validation(
                "Retry attempts cannot exceed 10".to_string(),
            ));
        }

        if config.reader.max_depth == 0 {
            return Err(ConfigError::Validation(
                "Maximum nesting depth must be greater than 0".to_string(),
            ));
        }

        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        if config.files.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "At least one file extension must be specified".to_string(),
            ));
        }
        for ext in &config.files.extensions {
            if ext.contains('/') || ext.contains('\\') || ext.contains('.') {
                return Err(ConfigError::Validation(format!(
                    "Invalid file extension: {}",
                    ext
                )));
            }
        }

        Ok(())
    }
}

fn env_key(name: &str) -> String {
    format!("{}{}", ENV_PREFIX, name)
}

fn parse_env<T: FromStr>(env: &impl EnvProvider, name: &str) -> Result<Option<T>> {
    let key = env_key(name);
    env.get(&key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Environment(format!("Invalid {} value: {}", key, value)))
        })
        .transpose()
}
