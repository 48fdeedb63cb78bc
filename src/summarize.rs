//! Page synopsis and tags from an OpenAI-compatible chat-completions endpoint.
//!
//! Summaries are best effort: without an API key, on HTTP failure or when the
//! reply holds no JSON object, [`fallback_summary`] derives both from the title.

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::memory::page::truncate_chars;

const MAX_PROMPT_CONTENT_CHARS: usize = 3000;
const TEMPERATURE: f32 = 0.3;

static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid JSON span regex"));

const SYSTEM_PROMPT: &str = "You write short summaries and tags for web pages so they are easy \
to find later. Mention the country, region or language of a site when it is clear. Reply with \
JSON only.";

/// Publishers recognised by title, with the region tags they get.
const REGIONS: &[(&[&str], &str, &[&str])] = &[
    (
        &["handelsblatt", "bild", "zeit", "spiegel"],
        "German",
        &["german", "germany", "news"],
    ),
    (
        &["bbc", "guardian", "telegraph"],
        "UK",
        &["uk", "british", "english", "news"],
    ),
    (
        &["lemonde", "figaro", "liberation"],
        "French",
        &["french", "france", "news"],
    ),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSummary {
    pub synopsis: String,
    pub tags: Vec<String>,
}

/// Title-derived summary used whenever the model cannot be asked.
pub fn fallback_summary(title: &str) -> PageSummary {
    let lower = title.to_lowercase();
    let mut tags = vec![lower.clone()];

    let region = REGIONS
        .iter()
        .find(|(markers, _, _)| markers.iter().any(|m| lower.contains(m)));
    let synopsis = match region {
        Some((_, label, extra)) => {
            tags.extend(extra.iter().map(|t| t.to_string()));
            format!("{label} website about {title}")
        }
        None => format!("Website about {title}"),
    };

    PageSummary { synopsis, tags }
}

#[derive(Debug, Deserialize)]
struct SummaryReply {
    synopsis: Option<String>,
    tags: Option<Vec<String>>,
}

/// Pull the first `{...}` span out of a model reply.
pub fn parse_summary_reply(reply: &str, title: &str) -> Option<PageSummary> {
    let span = JSON_OBJECT.find(reply)?.as_str();
    let parsed: SummaryReply = serde_json::from_str(span).ok()?;
    Some(PageSummary {
        synopsis: parsed
            .synopsis
            .unwrap_or_else(|| format!("Website about {title}")),
        tags: parsed.tags.unwrap_or_else(|| vec![title.to_lowercase()]),
    })
}

fn user_prompt(content: &str, title: &str) -> String {
    let content = truncate_chars(content, MAX_PROMPT_CONTENT_CHARS);
    format!(
        "Summarize this web page.\n\
         1. synopsis: 2-3 sentences on what the page is for, with geographic or language \
         context when relevant.\n\
         2. tags: 5-8 keywords covering category, topic, language or country, and site type.\n\n\
         Title: {title}\n\
         Content: {content}\n\n\
         Return JSON: {{\"synopsis\": \"...\", \"tags\": [\"...\"]}}"
    )
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

pub struct LlmSummarizer {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl LlmSummarizer {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Synopsis and tags for a page. Never fails.
    pub async fn summarize(&self, content: &str, title: &str) -> PageSummary {
        if !self.is_configured() {
            tracing::debug!(title, "no LLM API key, using title summary");
            return fallback_summary(title);
        }
        match self.request_summary(content, title).await {
            Ok(Some(summary)) => summary,
            Ok(None) => {
                tracing::warn!(title, "LLM reply held no JSON object");
                fallback_summary(title)
            }
            Err(e) => {
                tracing::warn!(title, error = %e, "summary request failed");
                fallback_summary(title)
            }
        }
    }

    async fn request_summary(&self, content: &str, title: &str) -> Result<Option<PageSummary>> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: SYSTEM_PROMPT.into(),
                },
                ChatMessage {
                    role: "user".into(),
                    content: user_prompt(content, title),
                },
            ],
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.as_deref().unwrap_or_default())
            .json(&request)
            .send()
            .await
            .context("failed to send LLM request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM API error ({status}): {body}");
        }

        let chat: ChatResponse = response
            .json()
            .await
            .context("failed to parse LLM response")?;
        let reply = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .context("LLM response has no choices")?;

        Ok(parse_summary_reply(&reply, title))
    }

    /// Check that the endpoint answers an authenticated model listing.
    pub async fn ping(&self) -> Result<()> {
        let key = self
            .api_key
            .as_deref()
            .context("no LLM API key configured")?;
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(key)
            .send()
            .await
            .context("LLM endpoint unreachable")?;
        anyhow::ensure!(
            response.status().is_success(),
            "LLM endpoint returned HTTP {}",
            response.status()
        );
        Ok(())
    }
}
