use clap::Parser;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.1:latest";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_GROQ_MODEL: &str = "mixtral-8x7b-32768";
pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com";

/// Command line of the generator. Every option is backed by an environment
/// variable, so running without flags is driven purely by the environment.
#[derive(Parser, Debug)]
#[command(author, version, about = "Append AI-flavoured dummy log lines to a file until interrupted", long_about = None)]
pub struct Cli {
    /// Text generation backend: "ollama" or "groq"
    #[arg(long, env = "LLM_PROVIDER", default_value = "ollama")]
    pub provider: String,

    /// API key used when the provider is groq
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    pub groq_api_key: Option<String>,

    #[arg(long, env = "GROQ_MODEL", default_value = DEFAULT_GROQ_MODEL)]
    pub groq_model: String,

    #[arg(long, env = "GROQ_BASE_URL", default_value = DEFAULT_GROQ_BASE_URL)]
    pub groq_base_url: String,

    #[arg(long, env = "OLLAMA_MODEL", default_value = DEFAULT_OLLAMA_MODEL)]
    pub ollama_model: String,

    #[arg(long, env = "OLLAMA_BASE_URL", default_value = DEFAULT_OLLAMA_BASE_URL)]
    pub ollama_base_url: String,

    /// Directory holding the output file, created if missing
    #[arg(long, env = "LOG_DIR", default_value = "log")]
    pub log_dir: PathBuf,

    #[arg(long, env = "LOG_FILE", default_value = "dummy_app.log")]
    pub log_file: String,

    /// Stop after this many lines instead of running until Ctrl+C
    #[arg(long, env = "LOG_MAX_LINES")]
    pub max_lines: Option<u64>,

    /// Lower bound of the random pause between two lines
    #[arg(long, env = "LOG_DELAY_MIN_MS", default_value_t = 0)]
    pub delay_min_ms: u64,

    /// Upper bound of the random pause between two lines (0 disables pausing)
    #[arg(long, env = "LOG_DELAY_MAX_MS", default_value_t = 0)]
    pub delay_max_ms: u64,

    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderKind {
    Ollama,
    Groq,
    Unknown(String),
}

impl ProviderKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "ollama" => ProviderKind::Ollama,
            "groq" => ProviderKind::Groq,
            other => ProviderKind::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Ollama => write!(f, "ollama"),
            ProviderKind::Groq => write!(f, "groq"),
            ProviderKind::Unknown(raw) => write!(f, "{raw}"),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub provider: ProviderKind,
    pub ollama_model: String,
    pub ollama_base_url: String,
    pub groq_api_key: Option<String>,
    pub groq_model: String,
    pub groq_base_url: String,
}

// Manual impl so the API key never lands in a debug log.
impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("provider", &self.provider)
            .field("ollama_model", &self.ollama_model)
            .field("ollama_base_url", &self.ollama_base_url)
            .field("groq_api_key", &self.groq_api_key.as_ref().map(|_| "***"))
            .field("groq_model", &self.groq_model)
            .field("groq_base_url", &self.groq_base_url)
            .finish()
    }
}

impl BackendConfig {
    pub fn with_provider(provider: ProviderKind) -> Self {
        Self {
            provider,
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            ollama_base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            groq_api_key: None,
            groq_model: DEFAULT_GROQ_MODEL.to_string(),
            groq_base_url: DEFAULT_GROQ_BASE_URL.to_string(),
        }
    }
}

/// Inclusive bounds of the pause between lines, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pacing {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Pacing {
    pub fn new(a: u64, b: u64) -> Self {
        Self {
            min_ms: a.min(b),
            max_ms: a.max(b),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_ms > 0
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub backend: BackendConfig,
    pub log_dir: PathBuf,
    pub log_file: String,
    pub max_lines: Option<u64>,
    pub pacing: Pacing,
    pub verbose: bool,
}

impl Settings {
    pub fn output_path(&self) -> PathBuf {
        self.log_dir.join(&self.log_file)
    }
}

impl From<Cli> for Settings {
    fn from(cli: Cli) -> Self {
        // An exported-but-empty key counts as missing.
        let groq_api_key = cli.groq_api_key.filter(|k| !k.trim().is_empty());

        Settings {
            backend: BackendConfig {
                provider: ProviderKind::parse(&cli.provider),
                ollama_model: cli.ollama_model,
                ollama_base_url: cli.ollama_base_url,
                groq_api_key,
                groq_model: cli.groq_model,
                groq_base_url: cli.groq_base_url,
            },
            log_dir: cli.log_dir,
            log_file: cli.log_file,
            max_lines: cli.max_lines,
            pacing: Pacing::new(cli.delay_min_ms, cli.delay_max_ms),
            verbose: cli.verbose,
        }
    }
}
