/// Tokenizer wrapper around HuggingFace `tokenizers` crate.
///
/// Provides tokenization with attention masks for the ONNX embedder.
use std::path::Path;

use tokenizers::{Encoding, Tokenizer, TruncationParams};

use super::EmbedderError;

/// Wrapper around the HuggingFace tokenizer for BERT/XLM-R style models.
pub struct BertTokenizer {
    inner: Tokenizer,
    max_length: usize,
}

/// Output of a tokenization operation.
#[derive(Debug, Clone)]
pub struct TokenizerOutput {
    /// Token IDs (input_ids for the model).
    pub input_ids: Vec<i64>,
    /// Attention mask (1 for real tokens, 0 for padding).
    pub attention_mask: Vec<i64>,
}

impl TokenizerOutput {
    fn from_encoding(encoding: &Encoding) -> Self {
        Self {
            input_ids: encoding.get_ids().iter().map(|&id| i64::from(id)).collect(),
            attention_mask: encoding
                .get_attention_mask()
                .iter()
                .map(|&m| i64::from(m))
                .collect(),
        }
    }

    /// Number of tokens, including special tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

impl BertTokenizer {
    /// Load a tokenizer from a `tokenizer.json` file in the model directory.
    ///
    /// Sequences are truncated to `max_length` tokens. Padding is left off;
    /// batches are padded by the embedder to their longest member.
    pub fn from_model_dir(model_dir: &Path, max_length: usize) -> Result<Self, EmbedderError> {
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !tokenizer_path.exists() {
            return Err(EmbedderError::TokenizerError(format!(
                "tokenizer.json not found in {}",
                model_dir.display()
            )));
        }

        let mut inner = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbedderError::TokenizerError(format!("failed to load tokenizer: {e}")))?;

        inner
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| EmbedderError::TokenizerError(format!("truncation config: {e}")))?;
        inner.with_padding(None);

        Ok(Self { inner, max_length })
    }

    /// Tokenize a single text, returning input IDs and attention mask.
    pub fn tokenize(&self, text: &str) -> Result<TokenizerOutput, EmbedderError> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| EmbedderError::TokenizerError(format!("failed to encode text: {e}")))?;

        Ok(TokenizerOutput::from_encoding(&encoding))
    }

    /// Tokenize multiple texts in a batch.
    pub fn tokenize_batch(&self, texts: &[&str]) -> Result<Vec<TokenizerOutput>, EmbedderError> {
        let encodings = self
            .inner
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbedderError::TokenizerError(format!("failed to encode batch: {e}")))?;

        Ok(encodings.iter().map(TokenizerOutput::from_encoding).collect())
    }

    /// Get the vocabulary size.
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(false)
    }

    /// Id of the padding token (`<pad>` for XLM-R, `[PAD]` for BERT),
    /// falling back to 0 when the vocabulary has neither.
    #[must_use]
    pub fn pad_id(&self) -> i64 {
        self.inner
            .token_to_id("<pad>")
            .or_else(|| self.inner.token_to_id("[PAD]"))
            .map_or(0, i64::from)
    }

    /// Get the configured maximum sequence length.
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// This test requires the actual tokenizer.json file.
    /// Run with: cargo test tokenizer -- --ignored
    #[test]
    #[ignore]
    fn test_tokenize_with_real_model() {
        let model_dir = Path::new("models/multilingual-e5-base");
        if !model_dir.join("tokenizer.json").exists() {
            eprintln!("Skipping: model files not downloaded");
            return;
        }

        let tokenizer = BertTokenizer::from_model_dir(model_dir, 512).unwrap();
        let output = tokenizer.tokenize("query: Hello, world!").unwrap();

        assert!(!output.is_empty());
        assert_eq!(output.input_ids.len(), output.attention_mask.len());
        // <s> ... </s>
        assert!(output.len() >= 3);
    }

    #[test]
    #[ignore]
    fn test_tokenize_batch_truncates() {
        let model_dir = Path::new("models/multilingual-e5-base");
        if !model_dir.join("tokenizer.json").exists() {
            return;
        }

        let tokenizer = BertTokenizer::from_model_dir(model_dir, 16).unwrap();
        let long = "word ".repeat(100);
        let outputs = tokenizer.tokenize_batch(&["short", &long]).unwrap();

        assert_eq!(outputs.len(), 2);
        assert!(outputs[0].len() < outputs[1].len());
        assert_eq!(outputs[1].len(), 16);
    }

    #[test]
    #[ignore]
    fn test_pad_id_with_real_model() {
        let model_dir = Path::new("models/multilingual-e5-base");
        if !model_dir.join("tokenizer.json").exists() {
            return;
        }

        let tokenizer = BertTokenizer::from_model_dir(model_dir, 512).unwrap();
        // XLM-R: <s>=0, <pad>=1
        assert_eq!(tokenizer.pad_id(), 1);
    }

    #[test]
    fn test_tokenizer_missing_file() {
        let result = BertTokenizer::from_model_dir(Path::new("/nonexistent/path"), 512);
        assert!(matches!(result, Err(EmbedderError::TokenizerError(_))));
    }
}
