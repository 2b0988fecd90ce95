use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show failures
    Quiet,
    /// Show every document and a summary
    #[default]
    Normal,
    /// Add error locations and resolver statistics
    Verbose,
    /// Show all available debugging information
    Debug,
}

impl VerbosityLevel {
    /// Default `tracing` filter directive for this level
    pub fn log_directive(self) -> &'static str {
        match self {
            VerbosityLevel::Quiet => "xml_tuples=error",
            VerbosityLevel::Normal => "xml_tuples=warn",
            VerbosityLevel::Verbose => "xml_tuples=info",
            VerbosityLevel::Debug => "xml_tuples=debug",
        }
    }
}

/// Result output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One line per document plus a summary
    #[default]
    Human,
    /// Root tuples in composite form
    Json,
    /// A single summary line
    Summary,
}

/// Read markup documents into typed tuples
#[derive(Parser, Debug, Clone)]
#[command(name = "xml-tuples")]
#[command(about = "Read structural markup documents into typed tuples, resolving type definitions on demand")]
#[command(version)]
pub struct Cli {
    /// Directory or file to load
    #[arg(help = "Directory or file to load")]
    pub path: PathBuf,

    /// Directories searched for `<local-name>.xml` definitions
    #[arg(short = 'd', long = "definitions", action = clap::ArgAction::Append)]
    pub definitions: Vec<PathBuf>,

    /// Base URL for fetching definitions over HTTP
    #[arg(long = "base-url")]
    pub base_url: Option<String>,

    /// Output format
    #[arg(short = 'f', long = "format", value_enum)]
    pub format: Option<OutputFormat>,

    /// Number of documents loaded concurrently
    #[arg(short = 't', long = "threads")]
    pub threads: Option<usize>,

    /// File extensions to process (comma-separated)
    #[arg(
        short = 'e',
        long = "extensions",
        help = "File extensions to process (e.g., 'xml,tuple')"
    )]
    pub extensions: Option<String>,

    /// Include file patterns (glob syntax)
    #[arg(long = "include", action = clap::ArgAction::Append)]
    pub include_patterns: Vec<String>,

    /// Exclude file patterns (glob syntax)
    #[arg(long = "exclude", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Stop at the first document that fails
    #[arg(long = "fail-fast")]
    pub fail_fast: bool,

    /// Freeze tuples once read
    #[arg(long = "freeze")]
    pub freeze: bool,

    /// Maximum element nesting depth
    #[arg(long = "max-depth")]
    pub max_depth: Option<usize>,

    /// Cache directory for downloaded definitions
    #[arg(long = "cache-dir")]
    pub cache_dir: Option<PathBuf>,

    /// Cache TTL in hours
    #[arg(long = "cache-ttl")]
    pub cache_ttl: Option<u64>,

    /// Disable the definition cache
    #[arg(long = "no-cache")]
    pub no_cache: bool,

    /// HTTP request timeout in seconds
    #[arg(long = "timeout")]
    pub timeout: Option<u64>,

    /// Number of retry attempts for failed downloads
    #[arg(long = "retry-attempts")]
    pub retry_attempts: Option<u32>,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (failures only)
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Quiet mode",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// Configuration file (TOML or JSON)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Extensions given on the command line, if any
    pub fn get_extensions(&self) -> Option<Vec<String>> {
        self.extensions.as_ref().map(|extensions| {
            extensions
                .split(',')
                .map(|s| s.trim().trim_start_matches('.').to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else {
            match self.verbose {
                0 => VerbosityLevel::Normal,
                1 => VerbosityLevel::Verbose,
                _ => VerbosityLevel::Debug,
            }
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.path.exists() {
            return Err(format!("Path does not exist: {}", self.path.display()));
        }
        if let Some(threads) = self.threads
            && threads == 0
        {
            return Err("Number of threads must be greater than 0".to_string());
        }
        if let Some(directory) = self.definitions.iter().find(|d| !d.is_dir()) {
            return Err(format!(
                "Definitions directory does not exist: {}",
                directory.display()
            ));
        }
        Ok(())
    }
}
