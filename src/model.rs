use anyhow::Result;

/// A time-bounded span of recognized speech.
///
/// Times are seconds relative to the first sample of the buffer the model was given.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
}

/// Result of spoken-language identification.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageInfo {
    /// Whisper language code (e.g. `"en"`, `"hi"`, `"gu"`).
    pub language: String,

    /// Model confidence for `language`, in `[0, 1]`.
    pub probability: f32,
}

/// Pluggable speech-recognition model used by [`crate::Transcriber`].
///
/// Implementations receive mono `f32` samples at [`crate::audio::TARGET_SAMPLE_RATE`].
/// Decoding parameters (sampling strategy, prompt, threads) are fixed when the model is
/// loaded; callers only choose which samples to decode and in which language.
pub trait SpeechModel {
    /// Identify the spoken language from the start of `samples`.
    fn detect_language(&mut self, samples: &[f32]) -> Result<LanguageInfo>;

    /// Decode one window of audio.
    ///
    /// Segments come back in time order with window-relative timestamps.
    fn transcribe_window(&mut self, samples: &[f32], language: &str) -> Result<Vec<Segment>>;
}

impl<M: SpeechModel + ?Sized> SpeechModel for &mut M {
    fn detect_language(&mut self, samples: &[f32]) -> Result<LanguageInfo> {
        (**self).detect_language(samples)
    }

    fn transcribe_window(&mut self, samples: &[f32], language: &str) -> Result<Vec<Segment>> {
        (**self).transcribe_window(samples, language)
    }
}
