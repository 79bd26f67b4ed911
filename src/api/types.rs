//! Request and response bodies for the HTTP API.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /embed`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbedRequest {
    #[serde(default)]
    pub text: Option<String>,

    /// `query`, `passage`, or absent. Any other JSON value is accepted and
    /// treated as unrecognized. See [`TextKind`].
    #[serde(default, rename = "type")]
    pub kind: Option<Value>,
}

/// Body of `POST /batch-embed`. A `type` field, if sent, is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchEmbedRequest {
    #[serde(default)]
    pub texts: Option<Vec<String>>,
}

/// The role an input plays for an e5 model, taken from the `type` field.
///
/// e5 models are trained with `query: ` / `passage: ` markers in front of
/// the text and expect the same at inference time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextKind {
    /// No `type` given; the text is encoded as-is.
    Plain,
    Query,
    Passage,
    /// A `type` other than `query`/`passage`. Non-string values are kept in
    /// their JSON form, e.g. `5` or `{}`.
    Unrecognized(String),
}

impl TextKind {
    #[must_use]
    pub fn from_field(field: Option<&Value>) -> Self {
        match field {
            None | Some(Value::Null) => TextKind::Plain,
            Some(Value::String(s)) => match s.as_str() {
                "query" => TextKind::Query,
                "passage" => TextKind::Passage,
                other => TextKind::Unrecognized(other.to_string()),
            },
            Some(other) => TextKind::Unrecognized(other.to_string()),
        }
    }

    /// Marker prepended to the text, if any.
    #[must_use]
    pub fn prefix(&self) -> Option<&'static str> {
        match self {
            TextKind::Query => Some("query: "),
            TextKind::Passage => Some("passage: "),
            TextKind::Plain | TextKind::Unrecognized(_) => None,
        }
    }

    /// The string actually handed to the model.
    #[must_use]
    pub fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        match self.prefix() {
            Some(prefix) => Cow::Owned(format!("{prefix}{text}")),
            None => Cow::Borrowed(text),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub embedding: Vec<f32>,
    pub dimension: usize,
}

impl From<Vec<f32>> for EmbedResponse {
    fn from(embedding: Vec<f32>) -> Self {
        Self {
            dimension: embedding.len(),
            embedding,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEmbedResponse {
    pub embeddings: Vec<Vec<f32>>,
    pub count: usize,
    /// Length of the first vector, 0 when there are none.
    pub dimension: usize,
}

impl From<Vec<Vec<f32>>> for BatchEmbedResponse {
    fn from(embeddings: Vec<Vec<f32>>) -> Self {
        Self {
            count: embeddings.len(),
            dimension: embeddings.first().map_or(0, Vec::len),
            embeddings,
        }
    }
}
