//! Known model artifacts and fetching them on first use.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Whisper,
    Vad,
}

/// Download source for a known model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    pub kind: ModelKind,

    /// Friendly name (e.g. `"large-v3-turbo"`).
    pub name: &'static str,

    /// File name on disk (e.g. `"ggml-large-v3-turbo.bin"`).
    pub filename: &'static str,

    pub url: &'static str,
}

/// Artifacts we know how to fetch. The turbo variants are the multilingual models the meeting
/// transcriptions are tuned for.
pub static KNOWN_MODELS: &[ModelSpec] = &[
    ModelSpec {
        kind: ModelKind::Whisper,
        name: "large-v3-turbo",
        filename: "ggml-large-v3-turbo.bin",
        url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-large-v3-turbo.bin",
    },
    ModelSpec {
        kind: ModelKind::Whisper,
        name: "large-v3-turbo-q5_0",
        filename: "ggml-large-v3-turbo-q5_0.bin",
        url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-large-v3-turbo-q5_0.bin",
    },
    ModelSpec {
        kind: ModelKind::Whisper,
        name: "large-v3-turbo-q8_0",
        filename: "ggml-large-v3-turbo-q8_0.bin",
        url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-large-v3-turbo-q8_0.bin",
    },
    ModelSpec {
        kind: ModelKind::Vad,
        name: "silero-v6.2.0",
        filename: "ggml-silero-v6.2.0.bin",
        url: "https://huggingface.co/ggml-org/whisper-vad/resolve/main/ggml-silero-v6.2.0.bin",
    },
];

pub fn lookup_by_filename(filename: &str) -> Option<&'static ModelSpec> {
    KNOWN_MODELS.iter().find(|m| m.filename == filename)
}

/// Make sure `path` exists, downloading it when its file name is a known artifact.
pub fn ensure_model(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }

    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("model path has no file name: '{}'", path.display()))?;

    let spec = lookup_by_filename(filename).ok_or_else(|| {
        anyhow!(
            "model not found at '{}' and '{filename}' is not a known downloadable model",
            path.display()
        )
    })?;

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create model dir: {}", dir.display()))?;
    }

    info!(name = spec.name, url = spec.url, dest = %path.display(), "downloading model");

    let client = Client::builder()
        .user_agent(concat!("mom-transcribe/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;

    let resp = client
        .get(spec.url)
        .send()
        .with_context(|| format!("request failed: {}", spec.url))?
        .error_for_status()
        .with_context(|| format!("download failed (bad status): {}", spec.url))?;

    let total = resp.content_length();
    download_to_path(resp, total, path)?;

    info!(dest = %path.display(), "model saved");
    Ok(())
}

/// Stream `reader` into `dest_path`.
///
/// Bytes land in `dest_path.part` first and are renamed into place only after an fsync, so a
/// half-written model is never picked up by the next run.
fn download_to_path<R: Read>(
    mut reader: R,
    total_bytes: Option<u64>,
    dest_path: &Path,
) -> Result<()> {
    let pb = match total_bytes {
        Some(total) if total > 0 => ProgressBar::new(total),
        _ => ProgressBar::new_spinner(),
    };
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} {bytes}/{total_bytes} {bar:40.cyan/blue} {eta}",
        )
        .context("invalid progress template")?
        .progress_chars("#>-"),
    );

    let tmp_path = part_path(dest_path);

    let result = (|| -> Result<()> {
        let mut file = fs::File::create(&tmp_path)
            .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;

        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf).context("failed reading download body")?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])?;
            pb.inc(n as u64);
        }

        file.sync_all()?;
        fs::rename(&tmp_path, dest_path)
            .with_context(|| format!("failed to move into place: {}", dest_path.display()))?;
        Ok(())
    })();

    pb.finish_and_clear();
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }

    result
}

fn part_path(dest_path: &Path) -> PathBuf {
    let mut name = dest_path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_default_models() {
        let whisper = lookup_by_filename("ggml-large-v3-turbo.bin").expect("turbo spec");
        assert_eq!(whisper.kind, ModelKind::Whisper);
        assert_eq!(whisper.name, "large-v3-turbo");

        let vad = lookup_by_filename("ggml-silero-v6.2.0.bin").expect("silero spec");
        assert_eq!(vad.kind, ModelKind::Vad);
        assert_eq!(vad.name, "silero-v6.2.0");

        assert!(lookup_by_filename("ggml-tiny.bin").is_none());
    }

    #[test]
    fn default_paths_are_downloadable() {
        for path in [crate::opts::DEFAULT_MODEL_PATH, crate::opts::DEFAULT_VAD_MODEL_PATH] {
            let filename = Path::new(path).file_name().and_then(|n| n.to_str()).unwrap();
            assert!(lookup_by_filename(filename).is_some(), "{path}");
        }
    }

    #[test]
    fn ensure_model_is_noop_for_existing_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("custom-model.bin");
        fs::write(&path, b"weights")?;
        ensure_model(&path)?;
        assert_eq!(fs::read(&path)?, b"weights");
        Ok(())
    }

    #[test]
    fn ensure_model_rejects_unknown_names() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let err = ensure_model(&dir.path().join("ggml-mystery.bin")).unwrap_err();
        assert!(err.to_string().contains("not a known downloadable model"));
        Ok(())
    }

    #[test]
    fn download_writes_and_renames() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let dest = dir.path().join("model.bin");

        let bytes = b"abc123".to_vec();
        download_to_path(std::io::Cursor::new(bytes.clone()), Some(6), &dest)?;

        assert_eq!(fs::read(&dest)?, bytes);
        assert!(!part_path(&dest).exists());
        Ok(())
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("connection reset"))
        }
    }

    #[test]
    fn download_cleans_up_part_file_on_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let dest = dir.path().join("model.bin");

        assert!(download_to_path(FailingReader, None, &dest).is_err());
        assert!(!dest.exists());
        assert!(!part_path(&dest).exists());
        Ok(())
    }
}
