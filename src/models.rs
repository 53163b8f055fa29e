use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

// Additional vendor fields (max_tokens, stop, ...), kept key-sorted
pub type Extra = BTreeMap<String, Value>;

// Which vendor endpoint a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Complete,
    Chat,
    Edit,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Complete => "complete",
            Mode::Chat => "chat",
            Mode::Edit => "edit",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "complete" => Ok(Mode::Complete),
            "chat" => Ok(Mode::Chat),
            "edit" => Ok(Mode::Edit),
            other => Err(Error::UnsupportedMode(format!(
                "{other} is not a valid value for the mode parameter, choose from 'chat', 'complete', or 'edit'"
            ))),
        }
    }
}

// One chat turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    // string, array of content parts, or null on tool-call turns; a missing
    // field reads as null
    #[serde(default)]
    pub content: Value,
    // name, tool_call_id and friends pass through untouched
    #[serde(flatten)]
    pub extra: Extra,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Value::String(content.into()),
            extra: Extra::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Plain text of the message.
    ///
    /// Content parts contribute their `text` fields joined by newlines;
    /// null or any other shape yields an empty string.
    pub fn text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            Value::Array(parts) => parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => String::new(),
        }
    }
}

fn check_temperature(temperature: f64) -> Result<f64> {
    if !temperature.is_finite() || temperature < 0.0 {
        return Err(Error::validation(format!(
            "temperature must be a non-negative number, got {temperature}"
        )));
    }
    Ok(temperature)
}

fn check_model(model: String) -> Result<String> {
    if model.trim().is_empty() {
        return Err(Error::validation("model must not be empty"));
    }
    Ok(model)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatParams {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    extra: Extra,
}

impl ChatParams {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>, temperature: f64) -> Result<Self> {
        if messages.is_empty() {
            return Err(Error::validation("chat requests need at least one message"));
        }
        Ok(Self {
            model: check_model(model.into())?,
            messages,
            temperature: check_temperature(temperature)?,
            extra: Extra::new(),
        })
    }

    /// Single-turn chat request carrying `prompt` as the only user message.
    pub fn from_prompt(model: impl Into<String>, prompt: impl Into<String>, temperature: f64) -> Result<Self> {
        Self::new(model, vec![ChatMessage::user(prompt)], temperature)
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionParams {
    model: String,
    prompt: String,
    temperature: f64,
    extra: Extra,
}

impl CompletionParams {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, temperature: f64) -> Result<Self> {
        Ok(Self {
            model: check_model(model.into())?,
            prompt: prompt.into(),
            temperature: check_temperature(temperature)?,
            extra: Extra::new(),
        })
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditParams {
    model: String,
    input: Option<String>,
    instruction: String,
    temperature: f64,
    extra: Extra,
}

impl EditParams {
    pub fn new(
        model: impl Into<String>,
        input: Option<String>,
        instruction: impl Into<String>,
        temperature: f64,
    ) -> Result<Self> {
        Ok(Self {
            model: check_model(model.into())?,
            input,
            instruction: instruction.into(),
            temperature: check_temperature(temperature)?,
            extra: Extra::new(),
        })
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Request payload, one variant per mode.
///
/// The payload is both what gets sent to the vendor and what the cache
/// fingerprint is computed over.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestParameters {
    Chat(ChatParams),
    Completion(CompletionParams),
    Edit(EditParams),
}

impl From<ChatParams> for RequestParameters {
    fn from(params: ChatParams) -> Self {
        RequestParameters::Chat(params)
    }
}

impl From<CompletionParams> for RequestParameters {
    fn from(params: CompletionParams) -> Self {
        RequestParameters::Completion(params)
    }
}

impl From<EditParams> for RequestParameters {
    fn from(params: EditParams) -> Self {
        RequestParameters::Edit(params)
    }
}

fn take_string(object: &mut Map<String, Value>, key: &str) -> Result<String> {
    match object.remove(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(Error::validation(format!("`{key}` must be a string, got {other}"))),
        None => Err(Error::validation(format!("missing required field `{key}`"))),
    }
}

impl RequestParameters {
    /// Builds typed parameters from a loosely-typed JSON object.
    ///
    /// Fields other than the required ones for `mode` end up in the extra map.
    pub fn from_json(mode: Mode, value: Value) -> Result<Self> {
        let Value::Object(mut object) = value else {
            return Err(Error::validation("request parameters must be a JSON object"));
        };

        let temperature = match object.remove("temperature") {
            Some(t) => t
                .as_f64()
                .ok_or_else(|| Error::validation(format!("`temperature` must be a number, got {t}")))?,
            None => return Err(Error::validation("missing required field `temperature`")),
        };
        let model = take_string(&mut object, "model")?;

        let params = match mode {
            Mode::Chat => {
                let messages = object
                    .remove("messages")
                    .ok_or_else(|| Error::validation("missing required field `messages`"))?;
                let messages: Vec<ChatMessage> = serde_json::from_value(messages)
                    .map_err(|e| Error::validation(format!("invalid `messages`: {e}")))?;
                let mut params = ChatParams::new(model, messages, temperature)?;
                params.extra = object.into_iter().collect();
                RequestParameters::Chat(params)
            }
            Mode::Complete => {
                let prompt = take_string(&mut object, "prompt")?;
                let mut params = CompletionParams::new(model, prompt, temperature)?;
                params.extra = object.into_iter().collect();
                RequestParameters::Completion(params)
            }
            Mode::Edit => {
                let instruction = take_string(&mut object, "instruction")?;
                let input = match object.remove("input") {
                    Some(Value::String(s)) => Some(s),
                    Some(Value::Null) | None => None,
                    Some(other) => {
                        return Err(Error::validation(format!("`input` must be a string, got {other}")));
                    }
                };
                let mut params = EditParams::new(model, input, instruction, temperature)?;
                params.extra = object.into_iter().collect();
                RequestParameters::Edit(params)
            }
        };
        Ok(params)
    }

    pub fn mode(&self) -> Mode {
        match self {
            RequestParameters::Chat(_) => Mode::Chat,
            RequestParameters::Completion(_) => Mode::Complete,
            RequestParameters::Edit(_) => Mode::Edit,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            RequestParameters::Chat(p) => &p.model,
            RequestParameters::Completion(p) => &p.model,
            RequestParameters::Edit(p) => &p.model,
        }
    }

    pub fn temperature(&self) -> f64 {
        match self {
            RequestParameters::Chat(p) => p.temperature,
            RequestParameters::Completion(p) => p.temperature,
            RequestParameters::Edit(p) => p.temperature,
        }
    }

    /// The text recorded as `prompt` in cache entries.
    pub fn prompt(&self) -> String {
        match self {
            // messages is never empty, checked in ChatParams::new
            RequestParameters::Chat(p) => p.messages.last().map(ChatMessage::text).unwrap_or_default(),
            RequestParameters::Completion(p) => p.prompt.clone(),
            RequestParameters::Edit(p) => p.instruction.clone(),
        }
    }

    /// JSON object sent to the vendor.
    pub fn to_payload(&self) -> Value {
        let mut object = Map::new();
        let (extra, model, temperature) = match self {
            RequestParameters::Chat(p) => (&p.extra, &p.model, p.temperature),
            RequestParameters::Completion(p) => (&p.extra, &p.model, p.temperature),
            RequestParameters::Edit(p) => (&p.extra, &p.model, p.temperature),
        };
        for (key, value) in extra {
            object.insert(key.clone(), value.clone());
        }

        // required fields win over anything smuggled in through extra
        object.insert("model".into(), Value::String(model.clone()));
        object.insert("temperature".into(), Value::from(temperature));
        match self {
            RequestParameters::Chat(p) => {
                let messages = p
                    .messages
                    .iter()
                    .map(|m| serde_json::to_value(m).unwrap_or(Value::Null))
                    .collect();
                object.insert("messages".into(), Value::Array(messages));
            }
            RequestParameters::Completion(p) => {
                object.insert("prompt".into(), Value::String(p.prompt.clone()));
            }
            RequestParameters::Edit(p) => {
                if let Some(input) = &p.input {
                    object.insert("input".into(), Value::String(input.clone()));
                }
                object.insert("instruction".into(), Value::String(p.instruction.clone()));
            }
        }
        Value::Object(object)
    }
}

/// What gets returned to callers and persisted in the cache.
///
/// `response` is the vendor's response body verbatim, or `None` when the
/// prompt did not fit in the model's context window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub prompt: String,
    pub response: Option<Value>,
}
