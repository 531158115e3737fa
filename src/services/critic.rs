use crate::schema::{CritiqueStyle, SuggestionMode};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.edenai.run/v2/multimodal/chat";
pub const DEFAULT_PROVIDER: &str = "anthropic/claude-3-7-sonnet-20250219";
const EXCERPT_CHARS: usize = 500;
pub const EMPTY_SUMMARY: &str = "No files were analyzed.";

/// Remote text generation for critiques. Failures come back as readable text, never as errors.
#[async_trait]
pub trait CritiqueEngine: Send + Sync {
    async fn critique(
        &self,
        code: &str,
        file_path: &str,
        style: CritiqueStyle,
        focus: Option<&str>,
    ) -> String;

    async fn suggestions(&self, code: &str, file_path: &str, mode: SuggestionMode) -> String;

    /// `pairs` are `(path, critique)`.
    async fn summarize(&self, pairs: &[(String, String)]) -> String;
}

#[derive(Debug, Clone)]
pub struct CritiqueClientConfig {
    pub api_key: String,
    pub api_url: String,
    pub provider: String,
    pub timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteServiceError {
    #[error("API error: {status} - {body}")]
    Status { status: u16, body: String },
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("{0}")]
    Decode(#[from] serde_json::Error),
    #[error("unexpected response format")]
    Malformed(Value),
}

#[derive(Clone, Copy)]
enum CallKind {
    Critique,
    Suggestions,
    Summary,
}

impl CallKind {
    fn render_failure(self, err: &RemoteServiceError) -> String {
        match (self, err) {
            (_, RemoteServiceError::Status { .. }) => err.to_string(),
            (Self::Critique, RemoteServiceError::Malformed(raw)) => {
                format!("API returned an unexpected format. Raw response: {raw}")
            }
            (Self::Suggestions, RemoteServiceError::Malformed(_)) => {
                "Failed to generate suggestions from API response.".to_string()
            }
            (Self::Summary, RemoteServiceError::Malformed(_)) => {
                "Failed to generate summary from API response.".to_string()
            }
            (Self::Critique, _) => format!("Error sending code to LLM: {err}"),
            (Self::Suggestions, _) => format!("Error generating suggestions: {err}"),
            (Self::Summary, _) => format!("Error generating summary: {err}"),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Critique => "critique",
            Self::Suggestions => "suggestions",
            Self::Summary => "summary",
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    providers: [&'a str; 1],
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: [ContentPart<'a>; 1],
}

#[derive(Serialize)]
struct ContentPart<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    content: TextContent<'a>,
}

#[derive(Serialize)]
struct TextContent<'a> {
    text: &'a str,
}

/// Client for an EdenAI-style multimodal chat endpoint.
pub struct EdenAiClient {
    client: reqwest::Client,
    config: CritiqueClientConfig,
}

impl EdenAiClient {
    pub fn new(config: CritiqueClientConfig) -> Result<Self, RemoteServiceError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    async fn generate(&self, kind: CallKind, prompt: &str) -> String {
        match self.send_request(prompt).await {
            Ok(text) => text,
            Err(err) => {
                tracing::error!(call = kind.label(), error = %err, "critique service call failed");
                kind.render_failure(&err)
            }
        }
    }

    async fn send_request(&self, prompt: &str) -> Result<String, RemoteServiceError> {
        let request = ChatRequest {
            providers: [self.config.provider.as_str()],
            messages: [ChatMessage {
                role: "user",
                content: [ContentPart {
                    kind: "text",
                    content: TextContent { text: prompt },
                }],
            }],
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let payload: Value = serde_json::from_str(&body)?;
        tracing::debug!(provider = %self.config.provider, bytes = body.len(), "critique service responded");

        extract_text(&payload, &self.config.provider).ok_or(RemoteServiceError::Malformed(payload))
    }
}

#[async_trait]
impl CritiqueEngine for EdenAiClient {
    async fn critique(
        &self,
        code: &str,
        file_path: &str,
        style: CritiqueStyle,
        focus: Option<&str>,
    ) -> String {
        let prompt = critique_prompt(code, file_path, style, focus);
        self.generate(CallKind::Critique, &prompt).await
    }

    async fn suggestions(&self, code: &str, file_path: &str, mode: SuggestionMode) -> String {
        let Some(prompt) = suggestions_prompt(code, file_path, mode) else {
            return String::new();
        };
        self.generate(CallKind::Suggestions, &prompt).await
    }

    async fn summarize(&self, pairs: &[(String, String)]) -> String {
        if pairs.is_empty() {
            return EMPTY_SUMMARY.to_string();
        }
        self.generate(CallKind::Summary, &summary_prompt(pairs)).await
    }
}

/// Provider text from `payload[provider]`, trying `message.content`, then
/// `generated_text`, then `response`.
fn extract_text(payload: &Value, provider: &str) -> Option<String> {
    let result = payload.get(provider)?;

    match result.get("message").and_then(|m| m.get("content")) {
        Some(Value::String(text)) => return Some(text.clone()),
        Some(Value::Array(parts)) => {
            let joined = parts
                .iter()
                .filter(|part| part.get("type").and_then(Value::as_str) == Some("text"))
                .map(|part| part.get("text").and_then(Value::as_str).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(" ");
            return Some(joined);
        }
        _ => {}
    }

    ["generated_text", "response"]
        .iter()
        .find_map(|key| result.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn file_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

fn style_preamble(style: CritiqueStyle) -> &'static str {
    match style {
        CritiqueStyle::Brutal => {
            "You are a code reviewer with no patience and a sharp sense of humor. Tear this code \
             apart: call out bad practices, wasted effort and questionable style, and make it funny."
        }
        CritiqueStyle::Constructive => {
            "You are an experienced engineer doing a code review. Point out the problems in this \
             code directly but professionally and pair each one with a concrete improvement and \
             the reason it matters."
        }
        CritiqueStyle::Educational => {
            "You are teaching a programming course and reviewing a student's submission. Explain \
             what is wrong with this code in terms of established practices and design patterns, \
             aiming to teach rather than scold."
        }
        CritiqueStyle::Funny => {
            "You are a stand-up comedian who is also an excellent programmer. Write a critique of \
             this code that gets real laughs while staying technically accurate; lean on \
             analogies and exaggeration."
        }
        CritiqueStyle::Security => {
            "You are an application security specialist. Review this code for vulnerabilities, \
             exploitable behavior and violations of secure coding practice, and recommend \
             specific fixes."
        }
    }
}

pub fn critique_prompt(
    code: &str,
    file_path: &str,
    style: CritiqueStyle,
    focus: Option<&str>,
) -> String {
    let mut prompt = style_preamble(style).to_string();
    if let Some(focus) = focus.map(str::trim).filter(|f| !f.is_empty()) {
        prompt.push_str(&format!(" Focus particularly on {focus}."));
    }
    format!(
        "{prompt} The code below comes from the file '{}' in a repository:\n\n{code}",
        file_name(file_path)
    )
}

/// `None` when suggestions are switched off.
pub fn suggestions_prompt(code: &str, file_path: &str, mode: SuggestionMode) -> Option<String> {
    let name = file_name(file_path);
    let instructions = match mode {
        SuggestionMode::None => return None,
        SuggestionMode::Basic => {
            "Suggest the most valuable improvements for this code. Keep it short: a handful of \
             bullet points, each naming the change and why it helps."
        }
        SuggestionMode::Detailed => {
            "Propose detailed improvements for this code. Include:\n\n\
             1. Concrete code changes with before and after snippets\n\
             2. An explanation of why each change is better\n\
             3. Design or architecture recommendations where they apply\n\
             4. Performance improvements\n\
             5. Security hardening where relevant"
        }
    };
    Some(format!(
        "{instructions}\n\nThe code is from the file '{name}':\n\n{code}"
    ))
}

/// Per-file excerpts fed to the summary prompt.
pub fn summary_excerpts(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(path, critique)| {
            let excerpt: String = critique.chars().take(EXCERPT_CHARS).collect();
            format!("File: {}\nCritique: {excerpt}...", file_name(path))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn summary_prompt(pairs: &[(String, String)]) -> String {
    format!(
        "Below are critiques of several files from one codebase. Identify the issues and \
         anti-patterns that recur across files or stand out as serious, and keep the advice \
         actionable for the codebase as a whole.\n\n\
         Critiques:\n{}\n\n\
         Respond with:\n\
         1. The most important shared problems\n\
         2. Codebase-wide improvements worth making\n\
         3. Good patterns that should be kept",
        summary_excerpts(pairs)
    )
}
