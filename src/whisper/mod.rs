//! [`SpeechModel`] backed by `whisper-rs` / whisper.cpp.

use std::path::Path;

use anyhow::{Context, Result, anyhow, ensure};
use tracing::{debug, info};
use whisper_rs::{WhisperContext, WhisperContextParameters};

use crate::audio::TARGET_SAMPLE_RATE;
use crate::model::{LanguageInfo, Segment, SpeechModel};
use crate::opts::Opts;

mod logging;
mod segments;

pub(crate) use logging::init_whisper_logging;
use segments::{DecodeSettings, collect_segments, run_whisper_full};

/// Whisper looks at 30 seconds of audio when identifying the language.
const LANGUAGE_PROBE_SAMPLES: usize = TARGET_SAMPLE_RATE as usize * 30;

/// A loaded whisper.cpp model with fixed decoding settings.
pub struct WhisperModel {
    ctx: WhisperContext,
    settings: DecodeSettings,
}

impl WhisperModel {
    /// Load the model named by `opts.model_path`.
    pub fn load(opts: &Opts) -> Result<Self> {
        let model_path = opts.model_path.as_str();
        ensure!(!model_path.trim().is_empty(), "model path must be provided");
        ensure!(Path::new(model_path).is_file(), "model not found at '{model_path}'");

        init_whisper_logging();

        let mut ctx_params = WhisperContextParameters::default();
        ctx_params.use_gpu(opts.use_gpu);

        let ctx = WhisperContext::new_with_params(model_path, ctx_params)
            .with_context(|| format!("failed to load model from path: {model_path}"))?;

        info!(
            model_path,
            use_gpu = opts.use_gpu,
            threads = opts.threads,
            multilingual = ctx.is_multilingual(),
            "loaded whisper model"
        );

        Ok(Self {
            ctx,
            settings: DecodeSettings {
                threads: opts.threads.max(1),
                initial_prompt: opts.initial_prompt.clone(),
            },
        })
    }
}

impl SpeechModel for WhisperModel {
    fn detect_language(&mut self, samples: &[f32]) -> Result<LanguageInfo> {
        if !self.ctx.is_multilingual() {
            return Ok(LanguageInfo {
                language: "en".to_owned(),
                probability: 1.0,
            });
        }

        let probe = &samples[..samples.len().min(LANGUAGE_PROBE_SAMPLES)];
        let threads = self.settings.threads;

        let mut state = self
            .ctx
            .create_state()
            .context("failed to create whisper state")?;
        state
            .pcm_to_mel(probe, threads)
            .context("failed to compute mel spectrogram")?;
        let (lang_id, probs) = state
            .lang_detect(0, threads)
            .context("language detection failed")?;

        let info = language_from_probs(lang_id, &probs)?;
        debug!(language = %info.language, probability = info.probability, "detected language");
        Ok(info)
    }

    fn transcribe_window(&mut self, samples: &[f32], language: &str) -> Result<Vec<Segment>> {
        let state = run_whisper_full(&self.ctx, &self.settings, language, samples)?;
        collect_segments(&state)
    }
}

fn language_from_probs(lang_id: i32, probs: &[f32]) -> Result<LanguageInfo> {
    let language = whisper_rs::get_lang_str(lang_id)
        .ok_or_else(|| anyhow!("whisper returned unknown language id {lang_id}"))?;

    let probability = usize::try_from(lang_id)
        .ok()
        .and_then(|idx| probs.get(idx))
        .copied()
        .unwrap_or(0.0);

    Ok(LanguageInfo {
        language: language.to_owned(),
        probability,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_rejects_missing_model() {
        let opts = Opts {
            model_path: "/nope/ggml-large-v3-turbo.bin".into(),
            ..Opts::default()
        };
        let err = WhisperModel::load(&opts)
            .err()
            .expect("expected missing model error");
        assert!(err.to_string().contains("model not found"));
    }

    #[test]
    fn load_rejects_empty_path() {
        let opts = Opts {
            model_path: "  ".into(),
            ..Opts::default()
        };
        let err = WhisperModel::load(&opts)
            .err()
            .expect("expected empty path error");
        assert!(err.to_string().contains("must be provided"));
    }

    #[test]
    fn language_probability_comes_from_detected_id() -> anyhow::Result<()> {
        // Whisper's language table starts "en", "zh", "de", ...
        let info = language_from_probs(0, &[0.9, 0.05, 0.05])?;
        assert_eq!(info.language, "en");
        assert_eq!(info.probability, 0.9);
        Ok(())
    }

    #[test]
    fn unknown_language_id_is_an_error() {
        assert!(language_from_probs(-1, &[]).is_err());
    }
}
