/// Default Whisper model, relative to the working directory of the parent process.
pub const DEFAULT_MODEL_PATH: &str = "./models/ggml-large-v3-turbo.bin";

/// Default whisper.cpp VAD (silero) model.
pub const DEFAULT_VAD_MODEL_PATH: &str = "./models/ggml-silero-v6.2.0.bin";

/// Prompt fed to the decoder to bias vocabulary and script towards the meetings we transcribe.
pub const MEETING_PROMPT: &str =
    "This is a business meeting in India involving English, Hindi, and Gujarati speakers.";

/// Options that control how a transcription is performed.
///
/// This is library-level configuration, not CLI flags directly. The binary maps its
/// arguments and environment into this type; tests and other frontends build it directly.
#[derive(Debug, Clone)]
pub struct Opts {
    /// Path to a whisper.cpp GGML model.
    pub model_path: String,

    /// Path to a whisper.cpp VAD model. Only loaded when VAD is enabled.
    pub vad_model_path: String,

    /// Ask whisper.cpp to offload to the GPU when it was built with a GPU backend.
    pub use_gpu: bool,

    /// Attenuate non-speech regions before decoding and skip fully silent windows.
    pub enable_voice_activity_detection: bool,

    /// Pin the spoken language (e.g. `"hi"`). `None` auto-detects.
    pub language: Option<String>,

    /// Decoder prompt. Empty disables it.
    pub initial_prompt: String,

    /// Threads for whisper.cpp's CPU work.
    pub threads: usize,

    /// Fetch known model artifacts that are missing on disk before loading them.
    pub download_missing: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            model_path: DEFAULT_MODEL_PATH.to_owned(),
            vad_model_path: DEFAULT_VAD_MODEL_PATH.to_owned(),
            use_gpu: true,
            enable_voice_activity_detection: true,
            language: None,
            initial_prompt: MEETING_PROMPT.to_owned(),
            threads: thread_count(num_cpus::get()),
            download_missing: false,
        }
    }
}

/// Threads to hand the model: three quarters of the logical CPUs, never fewer than one.
pub fn thread_count(cpus: usize) -> usize {
    (cpus.saturating_mul(3) / 4).max(1)
}
