use crate::config::{BackendConfig, ProviderKind};
use crate::line::Level;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, error, info, warn};

/// Message used whenever no backend could be set up.
pub const NOT_CONFIGURED_MESSAGE: &str = "This is a sample log message (AI not configured/failed).";

const GROQ_TEMPERATURE: f32 = 0.7;
const GROQ_MAX_TOKENS: u32 = 80;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("no text generation backend configured")]
    NotConfigured,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("backend returned an empty message")]
    EmptyResponse,
}

/// Anything able to turn a prompt into a piece of text.
pub trait TextGenerator {
    fn provider_name(&self) -> &str;

    fn is_configured(&self) -> bool {
        true
    }

    fn generate(
        &self,
        prompt: &str,
    ) -> impl Future<Output = Result<String, GenerationError>> + Send;
}

fn decode_error(e: reqwest::Error) -> GenerationError {
    if e.is_decode() {
        GenerationError::MalformedResponse(e.to_string())
    } else {
        GenerationError::Http(e)
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize, Debug)]
struct OllamaResponse {
    response: String,
}

/// Client for a local Ollama server (`/api/generate`, non streaming).
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/api/generate", self.base_url);
        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let reply: OllamaResponse = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(decode_error)?;

        Ok(reply.response)
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize, Debug)]
struct ChatReply {
    content: Option<String>,
}

/// Client for Groq's OpenAI compatible chat completion endpoint.
#[derive(Clone)]
pub struct GroqClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for GroqClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroqClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GroqClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/openai/v1/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: GROQ_TEMPERATURE,
            max_tokens: GROQ_MAX_TOKENS,
        };

        let reply: ChatResponse = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(decode_error)?;

        reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::MalformedResponse("no choices in completion".into()))
    }
}

/// The text generation backend picked once at startup.
#[derive(Debug, Clone)]
pub enum Backend {
    Disabled,
    Ollama(OllamaClient),
    Groq(GroqClient),
}

impl Backend {
    /// Builds the backend named by the configuration. Incomplete or unknown
    /// configuration degrades to [`Backend::Disabled`] with a warning.
    pub fn from_config(config: &BackendConfig) -> Self {
        match &config.provider {
            ProviderKind::Groq => {
                let Some(key) = config.groq_api_key.as_deref() else {
                    warn!(
                        "LLM_PROVIDER is 'groq' but GROQ_API_KEY is not set. AI-generated log messages will be basic."
                    );
                    return Backend::Disabled;
                };
                match GroqClient::new(&config.groq_base_url, key, &config.groq_model) {
                    Ok(client) => {
                        info!(model = %client.model(), "Using Groq for AI log generation.");
                        Backend::Groq(client)
                    }
                    Err(e) => {
                        warn!("Could not initialize Groq client: {e}. AI-generated logs will be basic.");
                        Backend::Disabled
                    }
                }
            }
            ProviderKind::Ollama => {
                match OllamaClient::new(&config.ollama_base_url, &config.ollama_model) {
                    Ok(client) => {
                        info!(
                            model = %client.model(),
                            url = %client.base_url(),
                            "Using Ollama for AI log generation."
                        );
                        Backend::Ollama(client)
                    }
                    Err(e) => {
                        warn!("Could not initialize Ollama client: {e}. AI-generated logs will be basic.");
                        Backend::Disabled
                    }
                }
            }
            ProviderKind::Unknown(raw) => {
                warn!(
                    "Unknown LLM_PROVIDER '{raw}'. AI-generated log messages will be basic. Set LLM_PROVIDER to 'ollama' or 'groq'."
                );
                Backend::Disabled
            }
        }
    }
}

impl TextGenerator for Backend {
    fn provider_name(&self) -> &str {
        match self {
            Backend::Disabled => "none",
            Backend::Ollama(_) => "ollama",
            Backend::Groq(_) => "groq",
        }
    }

    fn is_configured(&self) -> bool {
        !matches!(self, Backend::Disabled)
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        match self {
            Backend::Disabled => Err(GenerationError::NotConfigured),
            Backend::Ollama(client) => client.generate(prompt).await,
            Backend::Groq(client) => client.generate(prompt).await,
        }
    }
}

/// What the message is about. Only shapes the prompt.
#[derive(Debug, Clone, Copy)]
pub struct MessageContext<'a> {
    pub level: Level,
    pub source_file: &'a str,
}

pub fn build_prompt(ctx: &MessageContext<'_>) -> String {
    format!(
        "Generate a dummy log message for a Python application. \
         Do not return any thinking process or explanation, only the log message itself on a single line. \
         The log level is '{}' and the message is emitted from '{}'; it should be a realistic log message. \
         Example: Error occurred while uploading file doc.zip. \
         OR Successfully connected to database at localhost:5432.",
        ctx.level, ctx.source_file
    )
}

/// Collapses every run of whitespace or control characters into one space so
/// a message can never break the one-record-per-line layout.
pub fn sanitize_message(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn failure_message(provider: &str) -> String {
    format!("AI log generation failed with {provider}. (Using fallback message)")
}

/// Produces the free-text part of a log line, never failing.
#[derive(Debug)]
pub struct MessageGenerator<G> {
    backend: G,
}

impl<G: TextGenerator> MessageGenerator<G> {
    pub fn new(backend: G) -> Self {
        Self { backend }
    }

    #[cfg(test)]
    pub(crate) fn backend(&self) -> &G {
        &self.backend
    }

    pub async fn generate_message(&self, ctx: &MessageContext<'_>) -> String {
        if !self.backend.is_configured() {
            return NOT_CONFIGURED_MESSAGE.to_string();
        }

        let prompt = build_prompt(ctx);
        let outcome = match self.backend.generate(&prompt).await {
            Ok(raw) => {
                let message = sanitize_message(&raw);
                if message.is_empty() {
                    Err(GenerationError::EmptyResponse)
                } else {
                    Ok(message)
                }
            }
            Err(e) => Err(e),
        };

        let provider = self.backend.provider_name();
        match outcome {
            Ok(message) => {
                debug!(provider, level = %ctx.level, "generated message");
                message
            }
            Err(e) => {
                error!(provider, "Error calling {provider} API: {e}");
                failure_message(provider)
            }
        }
    }
}
