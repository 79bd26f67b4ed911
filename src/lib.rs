//! # e5-embed-server: multilingual-e5 embeddings over HTTP
//!
//! Loads a multilingual-e5 sentence-embedding model once at startup and
//! serves single and batch embedding requests as JSON.
//!
//! ## Architecture
//!
//! - **[`config`]**: Configuration loading, defaults, and validation
//! - **[`embedder`]**: Text embedding via ONNX Runtime, model download, mock
//! - **[`api`]**: axum router, handlers, error mapping, server loop

pub mod api;
pub mod config;
pub mod embedder;
