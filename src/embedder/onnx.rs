/// ONNX Runtime embedder using the `ort` crate.
///
/// Loads a multilingual-e5 ONNX export, runs chunked batch inference, applies
/// mean pooling with attention mask, and L2-normalizes the result, which is
/// the sentence-transformers pipeline the e5 models are published with.
use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

use super::tokenizer::{BertTokenizer, TokenizerOutput};
use super::{Embedder, EmbedderError, l2_normalize};
use crate::config::ModelConfig;

/// ONNX-backed embedder implementing the `Embedder` trait.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: BertTokenizer,
    dimensions: usize,
    batch_size: usize,
    pad_id: i64,
    token_type_ids: bool,
}

impl OnnxEmbedder {
    /// Create a new `OnnxEmbedder` from the model section of the config.
    ///
    /// Expects `model.onnx` and `tokenizer.json` in `config.dir`. One test
    /// sentence is embedded and its width checked against `config.dimensions`.
    pub fn new(config: &ModelConfig) -> Result<Self, EmbedderError> {
        let model_dir: &Path = &config.dir;
        let model_path = model_dir.join("model.onnx");

        if !model_path.exists() {
            return Err(EmbedderError::ModelLoadFailed(format!(
                "model.onnx not found in {}",
                model_dir.display()
            )));
        }

        info!("Initializing ONNX Runtime...");

        let session = Session::builder()
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("session builder error: {e}")))?
            .with_intra_threads(config.intra_threads)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("thread config error: {e}")))?
            .commit_from_file(&model_path)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("model load error: {e}")))?;

        info!("ONNX model loaded from {}", model_path.display());

        let tokenizer = BertTokenizer::from_model_dir(model_dir, config.max_length)
            .map_err(|e| EmbedderError::ModelLoadFailed(e.to_string()))?;

        info!(
            "Tokenizer loaded (vocab size: {}, max length: {})",
            tokenizer.vocab_size(),
            tokenizer.max_length()
        );

        let pad_id = tokenizer.pad_id();
        let embedder = Self {
            session: Mutex::new(session),
            tokenizer,
            dimensions: config.dimensions,
            batch_size: config.batch_size.max(1),
            pad_id,
            token_type_ids: config.token_type_ids,
        };

        let sample = embedder
            .embed("query: dimension check")
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("test inference: {e}")))?;
        if sample.len() != config.dimensions {
            return Err(EmbedderError::ModelLoadFailed(format!(
                "model produces {}-dimensional vectors, config expects {}",
                sample.len(),
                config.dimensions
            )));
        }

        Ok(embedder)
    }

    /// Run one session call over already-tokenized inputs, padded to the
    /// longest sequence.
    fn infer(&self, tokens: &[TokenizerOutput]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let PaddedBatch {
            batch,
            seq_len,
            input_ids,
            attention_mask,
        } = pad_batch(tokens, self.pad_id);

        debug!(batch, seq_len, "running inference");

        // (shape, data) tuple form avoids ndarray version coupling with ort
        let input_ids_val = Tensor::from_array(([batch, seq_len], input_ids))
            .map_err(|e| EmbedderError::InferenceFailed(format!("input_ids error: {e}")))?;
        let attention_mask_val = Tensor::from_array(([batch, seq_len], attention_mask.clone()))
            .map_err(|e| EmbedderError::InferenceFailed(format!("attention_mask error: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| EmbedderError::InferenceFailed(format!("lock poisoned: {e}")))?;

        let outputs = if self.token_type_ids {
            let token_type_ids_val =
                Tensor::from_array(([batch, seq_len], vec![0i64; batch * seq_len])).map_err(
                    |e| EmbedderError::InferenceFailed(format!("token_type_ids error: {e}")),
                )?;
            session.run(ort::inputs![
                "input_ids" => input_ids_val,
                "attention_mask" => attention_mask_val,
                "token_type_ids" => token_type_ids_val,
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => input_ids_val,
                "attention_mask" => attention_mask_val,
            ])
        }
        .map_err(|e| EmbedderError::InferenceFailed(format!("inference failed: {e}")))?;

        // last_hidden_state: [batch, seq_len, hidden_size]
        let (shape, hidden_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("output extraction: {e}")))?;

        if shape.len() != 3 {
            return Err(EmbedderError::InferenceFailed(format!(
                "expected rank-3 hidden states, got shape {shape:?}"
            )));
        }
        let hidden_size = usize::try_from(shape[2])
            .map_err(|_| EmbedderError::InferenceFailed(format!("bad output shape {shape:?}")))?;
        let stride = seq_len * hidden_size;

        let embeddings = (0..batch)
            .map(|b| {
                let mut pooled = mean_pooling(
                    &hidden_data[b * stride..(b + 1) * stride],
                    &attention_mask[b * seq_len..(b + 1) * seq_len],
                    seq_len,
                    hidden_size,
                );
                l2_normalize(&mut pooled);
                pooled
            })
            .collect();

        Ok(embeddings)
    }
}

impl Embedder for OnnxEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let tokens = self.tokenizer.tokenize(text)?;
        self.infer(std::slice::from_ref(&tokens))?
            .pop()
            .ok_or_else(|| EmbedderError::InferenceFailed("model returned no output".to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let tokens = self.tokenizer.tokenize_batch(texts)?;
        in_chunks(&tokens, self.batch_size, |chunk| self.infer(chunk))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Row-major `[batch, seq_len]` model inputs.
#[derive(Debug, PartialEq)]
struct PaddedBatch {
    batch: usize,
    seq_len: usize,
    input_ids: Vec<i64>,
    attention_mask: Vec<i64>,
}

/// Right-pad every sequence to the longest one with `pad_id` (mask 0).
fn pad_batch(tokens: &[TokenizerOutput], pad_id: i64) -> PaddedBatch {
    let batch = tokens.len();
    let seq_len = tokens.iter().map(TokenizerOutput::len).max().unwrap_or(0);

    let mut input_ids = Vec::with_capacity(batch * seq_len);
    let mut attention_mask = Vec::with_capacity(batch * seq_len);
    for t in tokens {
        let pad = seq_len - t.len();
        input_ids.extend_from_slice(&t.input_ids);
        input_ids.extend(std::iter::repeat_n(pad_id, pad));
        attention_mask.extend_from_slice(&t.attention_mask);
        attention_mask.extend(std::iter::repeat_n(0i64, pad));
    }

    PaddedBatch {
        batch,
        seq_len,
        input_ids,
        attention_mask,
    }
}

/// Run `run` over consecutive chunks of at most `chunk_size` items and
/// concatenate the results in input order.
fn in_chunks<T, F>(
    items: &[T],
    chunk_size: usize,
    mut run: F,
) -> Result<Vec<Vec<f32>>, EmbedderError>
where
    F: FnMut(&[T]) -> Result<Vec<Vec<f32>>, EmbedderError>,
{
    let mut out = Vec::with_capacity(items.len());
    for chunk in items.chunks(chunk_size.max(1)) {
        out.extend(run(chunk)?);
    }
    Ok(out)
}

/// Mean pooling over hidden states weighted by attention mask.
///
/// `hidden_data` is a flat array with shape `[seq_len, hidden_size]`.
fn mean_pooling(
    hidden_data: &[f32],
    attention_mask: &[i64],
    seq_len: usize,
    hidden_size: usize,
) -> Vec<f32> {
    let mut result = vec![0.0f32; hidden_size];
    let mut mask_sum: f32 = 0.0;

    for t in 0..seq_len {
        let mask = attention_mask[t] as f32;
        if mask == 0.0 {
            continue;
        }
        mask_sum += mask;

        let row = &hidden_data[t * hidden_size..(t + 1) * hidden_size];
        for (acc, h) in result.iter_mut().zip(row) {
            *acc += h * mask;
        }
    }

    if mask_sum > 0.0 {
        for v in &mut result {
            *v /= mask_sum;
        }
    }

    result
}
