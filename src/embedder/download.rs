/// Model file auto-download from HuggingFace.
///
/// Downloads the required ONNX model and tokenizer files if they don't
/// already exist locally.
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// Files `OnnxEmbedder::new` reads, with their paths inside the HF repo.
pub const MODEL_FILES: &[(&str, &str)] = &[
    ("model.onnx", "onnx/model.onnx"),
    ("tokenizer.json", "tokenizer.json"),
];

/// Base URL for files of the HuggingFace model `model_id`.
#[must_use]
pub fn hf_base_url(model_id: &str) -> String {
    format!("https://huggingface.co/{model_id}/resolve/main")
}

/// Check whether all required model files exist in `model_dir`.
#[must_use]
pub fn all_files_present(model_dir: &Path) -> bool {
    MODEL_FILES
        .iter()
        .all(|(name, _)| model_dir.join(name).exists())
}

/// Download model files for `model_id` from HuggingFace if any are missing.
///
/// Creates the model directory if it doesn't exist.
/// Skips individual files that are already present.
pub fn download_model_files(model_id: &str, model_dir: &Path) -> Result<()> {
    info!("Checking model files in {}", model_dir.display());

    fs::create_dir_all(model_dir)
        .with_context(|| format!("failed to create models directory: {}", model_dir.display()))?;

    if all_files_present(model_dir) {
        info!("All model files found, skipping download");
        return Ok(());
    }

    info!("Downloading {model_id} from HuggingFace (one-time, ~1GB)...");

    let base = hf_base_url(model_id);
    for &(filename, url_path) in MODEL_FILES {
        let dest = model_dir.join(filename);

        if dest.exists() {
            info!("File already exists: {filename}");
            continue;
        }

        let url = format!("{base}/{url_path}");
        info!("Downloading {filename}...");
        download_file(&dest, &url).with_context(|| format!("failed to download {filename}"))?;
        info!("Downloaded {filename}");
    }

    info!("Model download complete");
    Ok(())
}

/// Download a single file with a progress bar.
///
/// Streams into a `.part` file that is renamed into place once complete.
/// Uses blocking I/O; call it off the async runtime.
fn download_file(dest: &Path, url: &str) -> Result<()> {
    let mut resp =
        reqwest::blocking::get(url).with_context(|| format!("HTTP request failed: {url}"))?;

    if !resp.status().is_success() {
        anyhow::bail!("bad status: {} for {url}", resp.status());
    }

    let total = resp.content_length().unwrap_or(0);

    let pb = if total > 0 {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {bar:40.cyan/blue} {percent}% ({bytes}/{total_bytes}) {msg}")
                .context("invalid progress template")?
                .progress_chars("█▓░"),
        );
        pb
    } else {
        ProgressBar::new_spinner()
    };

    let result = write_streamed(&mut resp, dest, &pb);
    pb.finish_and_clear();
    result
}

/// Copy `reader` into `<dest>.part`, then rename it to `dest`.
///
/// On any error the `.part` file is removed and `dest` is left untouched.
fn write_streamed(reader: &mut impl Read, dest: &Path, pb: &ProgressBar) -> Result<()> {
    let part = dest.with_extension("part");

    let result = (|| -> Result<()> {
        let mut file = fs::File::create(&part)
            .with_context(|| format!("failed to create file: {}", part.display()))?;

        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf).context("failed to read response body")?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n]).context("failed to write file")?;
            pb.inc(n as u64);
        }
        file.flush().context("failed to flush file")?;
        drop(file);

        fs::rename(&part, dest)
            .with_context(|| format!("failed to move {} into place", part.display()))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&part);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_all_files_present_empty_dir() {
        let dir = tempdir().unwrap();
        assert!(!all_files_present(dir.path()));
    }

    #[test]
    fn test_all_files_present_complete() {
        let dir = tempdir().unwrap();

        for &(name, _) in MODEL_FILES {
            fs::write(dir.path().join(name), "dummy").unwrap();
        }

        assert!(all_files_present(dir.path()));
    }

    #[test]
    fn test_all_files_present_needs_only_onnx_and_tokenizer() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("model.onnx"), "dummy").unwrap();
        fs::write(dir.path().join("tokenizer.json"), "dummy").unwrap();

        assert!(all_files_present(dir.path()));
    }

    /// Yields `ok_bytes` bytes, then fails.
    struct BrokenReader {
        ok_bytes: usize,
    }

    impl Read for BrokenReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.ok_bytes == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset",
                ));
            }
            let n = self.ok_bytes.min(buf.len());
            buf[..n].fill(b'x');
            self.ok_bytes -= n;
            Ok(n)
        }
    }

    #[test]
    fn test_write_streamed_cleans_up_on_error() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("model.onnx");

        let mut reader = BrokenReader { ok_bytes: 1000 };
        let result = write_streamed(&mut reader, &dest, &ProgressBar::hidden());

        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(!dir.path().join("model.part").exists());
    }

    #[test]
    fn test_write_streamed_success() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("tokenizer.json");

        let mut reader: &[u8] = b"{\"model\": {}}";
        write_streamed(&mut reader, &dest, &ProgressBar::hidden()).unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "{\"model\": {}}");
        assert!(!dir.path().join("tokenizer.part").exists());
    }

    #[test]
    fn test_all_files_present_partial() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("tokenizer.json"), "dummy").unwrap();

        assert!(!all_files_present(dir.path()));
    }

    #[test]
    fn test_download_skipped_when_complete() {
        let dir = tempdir().unwrap();
        for &(name, _) in MODEL_FILES {
            fs::write(dir.path().join(name), "dummy").unwrap();
        }

        // No network access happens when every file is already present.
        download_model_files("intfloat/multilingual-e5-base", dir.path()).unwrap();
    }

    #[test]
    fn test_hf_base_url() {
        assert_eq!(
            hf_base_url("intfloat/multilingual-e5-base"),
            "https://huggingface.co/intfloat/multilingual-e5-base/resolve/main"
        );
    }
}
