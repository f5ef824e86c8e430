//! OpenAI-compatible chat client and the collaborators built on it.
//!
//! Both requirement extraction and explanation are plain chat completions.
//! The reply is untrusted text: reasoning blocks are stripped and, for
//! extraction, only the first JSON object in the reply is used.

use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::assembler::OutputRecord;
use crate::error::InterpretError;
use crate::request::TravelRequest;
use crate::traits::{Explainer, RequestInterpreter};

#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Base URL up to and including `/v1`.
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub enable_thinking: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/v1".to_string(),
            model: "Qwen/Qwen3-1.7B".to_string(),
            api_key: None,
            timeout_secs: 30,
            enable_thinking: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatClient {
    config: ChatConfig,
    client: reqwest::blocking::Client,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl ChatClient {
    pub fn new(config: ChatConfig) -> Result<Self, InterpretError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| InterpretError::Llm(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// One system + user exchange. Returns the assistant text with any
    /// reasoning block removed.
    pub fn complete(&self, system: &str, user: &str) -> Result<String, InterpretError> {
        let url = format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'));
        let body = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "temperature": 0.1,
            "chat_template_kwargs": {"enable_thinking": self.config.enable_thinking}
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().map_err(|e| InterpretError::Llm(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(InterpretError::Llm(format!("status {}: {}", status, text)));
        }

        let parsed: ChatResponse = response.json().map_err(|e| InterpretError::Llm(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| InterpretError::Llm("reply had no content".to_string()))?;

        debug!(model = %self.config.model, chars = content.len(), "chat completion");
        Ok(strip_thinking(&content))
    }
}

/// Remove `<think>...</think>` blocks, including an unterminated trailing one.
pub fn strip_thinking(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<think>") {
        out.push_str(&rest[..start]);
        match rest[start..].find("</think>") {
            Some(end) => rest = &rest[start + end + "</think>".len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

/// The first balanced `{...}` object in `text`, ignoring braces inside
/// string literals.
pub fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

const EXTRACTION_PROMPT: &str = r#"You convert travel requests into JSON. Reply with one JSON object and nothing else.
Fields:
- "origins": list of 3-letter IATA codes
- "destinations": list of lists of IATA codes, one inner list per city
- "topology": one of "one_way", "round_trip", "open_jaw", "multi_city_ordered", "multi_city_unordered"
- "dates": {"kind": "window", "earliest": "YYYY-MM-DD", "latest": "YYYY-MM-DD"}
  or {"kind": "fuzzy", "trip_days": N, "season": {"kind": "summer"}} (season kinds: month with "month", spring, summer, fall, winter, next_weeks with "weeks")
- "stays": optional list of {"min_days": N, "max_days": N}, one per destination
- "filters": optional {"max_stops", "include_airlines", "exclude_airlines", "carry_on_bags", "checked_bags", "max_price", "max_layover_minutes", "excluded_connections"}
- "airline_preferences": optional {"avoid": [...], "avoid_low_cost": bool}
Cities with several airports list all of them, e.g. Paris -> ["CDG", "ORY"]."#;

pub struct LlmInterpreter {
    client: ChatClient,
    today: NaiveDate,
}

impl LlmInterpreter {
    pub fn new(client: ChatClient, today: NaiveDate) -> Self {
        Self { client, today }
    }
}

/// Parse a model reply into a validated request.
pub fn parse_request_reply(reply: &str, today: NaiveDate) -> Result<TravelRequest, InterpretError> {
    let object = first_json_object(reply)
        .ok_or_else(|| InterpretError::Unrecognized("reply contained no JSON object".to_string()))?;
    let mut request: TravelRequest = serde_json::from_str(object)?;
    if request.reference_date.is_none() {
        request.reference_date = Some(today);
    }
    request.validate()?;
    Ok(request)
}

impl RequestInterpreter for LlmInterpreter {
    fn interpret(&self, text: &str) -> Result<TravelRequest, InterpretError> {
        let user = format!("Today is {}.\nRequest: {}", self.today, text);
        let reply = self.client.complete(EXTRACTION_PROMPT, &user)?;
        parse_request_reply(&reply, self.today)
    }
}

const EXPLANATION_PROMPT: &str = "You are a travel assistant. For each ranked flight option give its pros, \
cons and trade-offs in two or three short bullet points, then name the best pick and why. \
Do not change the order or invent options.";

pub struct LlmExplainer {
    client: ChatClient,
}

impl LlmExplainer {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }
}

impl Explainer for LlmExplainer {
    fn explain(&self, records: &[OutputRecord]) -> Result<String, InterpretError> {
        if records.is_empty() {
            return Ok(String::new());
        }
        let options = serde_json::to_string_pretty(records)?;
        self.client.complete(EXPLANATION_PROMPT, &options)
    }
}

/// Explainer that adds nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExplanation;

impl Explainer for NoExplanation {
    fn explain(&self, _records: &[OutputRecord]) -> Result<String, InterpretError> {
        Ok(String::new())
    }
}
