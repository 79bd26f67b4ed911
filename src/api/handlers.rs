//! Route handlers.
//!
//! Bodies are taken as raw bytes and parsed here rather than through the
//! `Json` extractor, so a bad body (unparsable, or over the size limit) is
//! reported as `{"error": ...}` with status 500 like every other processing
//! failure.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::AppState;
use super::error::ApiError;
use super::types::{
    BatchEmbedRequest, BatchEmbedResponse, EmbedRequest, EmbedResponse, HealthResponse, TextKind,
};

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

/// `POST /embed`
pub async fn embed(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<EmbedResponse>, ApiError> {
    let req: EmbedRequest = parse_body(&body?)?;

    let text = req
        .text
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Validation("No text provided".to_string()))?;

    let kind = TextKind::from_field(req.kind.as_ref());
    if let TextKind::Unrecognized(value) = &kind {
        if state.reject_unknown_type {
            return Err(ApiError::Validation(format!("Unsupported type: {value}")));
        }
        warn!(kind = %value, "unrecognized type, encoding text without prefix");
    }

    let input = kind.apply(&text).into_owned();
    debug!(chars = input.len(), ?kind, "embed");

    let embedder = state.embedder.clone();
    let embedding = tokio::task::spawn_blocking(move || embedder.embed(&input)).await??;

    Ok(Json(EmbedResponse::from(embedding)))
}

/// `POST /batch-embed`
///
/// Texts are encoded exactly as given; no `query: `/`passage: ` prefix is
/// applied here.
pub async fn batch_embed(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<BatchEmbedResponse>, ApiError> {
    let req: BatchEmbedRequest = parse_body(&body?)?;

    let texts = req
        .texts
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Validation("No texts provided".to_string()))?;

    if let Some(max) = state.max_batch_size {
        if texts.len() > max {
            return Err(ApiError::Validation(format!(
                "Too many texts: {} (max {max})",
                texts.len()
            )));
        }
    }

    debug!(count = texts.len(), "batch embed");

    let embedder = state.embedder.clone();
    let embeddings = tokio::task::spawn_blocking(move || {
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        embedder.embed_batch(&refs)
    })
    .await??;

    Ok(Json(BatchEmbedResponse::from(embeddings)))
}

/// Parse a request body that must be a JSON object.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let value: serde_json::Value = serde_json::from_slice(body)?;
    if !value.is_object() {
        return Err(ApiError::Processing(
            "request body must be a JSON object".to_string(),
        ));
    }
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_body_object() {
        let req: EmbedRequest = parse_body(br#"{"text": "hello"}"#).unwrap();
        assert_eq!(req.text.as_deref(), Some("hello"));
    }

    #[test]
    fn test_parse_body_rejects_array() {
        let result: Result<EmbedRequest, _> = parse_body(br#"["hello", "query"]"#);
        assert!(matches!(result, Err(ApiError::Processing(_))));
    }

    #[test]
    fn test_parse_body_rejects_empty() {
        let result: Result<BatchEmbedRequest, _> = parse_body(b"");
        assert!(matches!(result, Err(ApiError::Processing(ref m)) if !m.is_empty()));
    }
}
