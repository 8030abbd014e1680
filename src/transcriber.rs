//! High-level API: one audio file in, a stream of protocol events out.
//!
//! `Transcriber` owns the long-lived resources (the speech model and, when enabled, the VAD
//! model) and wires up decode → VAD → language detection → windowed decoding → events.

use std::path::Path;

use tracing::{debug, info, info_span};

use crate::audio;
use crate::event::Event;
use crate::event_writer::EventSink;
use crate::model::{LanguageInfo, SpeechModel};
use crate::opts::Opts;
use crate::vad::{SpeechDetector, SpeechFilter};
use crate::whisper::WhisperModel;
use crate::windowed::WindowedTranscriber;
use crate::{Error, Result};

pub struct Transcriber<M: SpeechModel = WhisperModel> {
    model: M,
    vad: Option<Box<dyn SpeechDetector>>,
    language: Option<String>,
}

impl Transcriber<WhisperModel> {
    /// Load the Whisper model (and the VAD model when VAD is enabled) described by `opts`.
    pub fn new(opts: &Opts) -> Result<Self> {
        #[cfg(feature = "download")]
        if opts.download_missing {
            crate::fetch::ensure_model(Path::new(&opts.model_path))?;
            if opts.enable_voice_activity_detection {
                crate::fetch::ensure_model(Path::new(&opts.vad_model_path))?;
            }
        }

        let model = WhisperModel::load(opts)?;
        let vad: Option<Box<dyn SpeechDetector>> = if opts.enable_voice_activity_detection {
            Some(Box::new(SpeechFilter::load(&opts.vad_model_path)?))
        } else {
            None
        };

        Ok(Self::with_model(model, vad, opts.language.clone()))
    }
}

impl<M: SpeechModel> Transcriber<M> {
    /// Build a transcriber around any [`SpeechModel`].
    ///
    /// `language` pins the spoken language and skips detection.
    pub fn with_model(
        model: M,
        vad: Option<Box<dyn SpeechDetector>>,
        language: Option<String>,
    ) -> Self {
        Self {
            model,
            vad,
            language,
        }
    }

    /// Transcribe the file at `path`, emitting one `meta` event and then `segment` events.
    ///
    /// Errors are returned, not emitted; the caller decides how to report them.
    pub fn transcribe_file(&mut self, path: &Path, sink: &mut dyn EventSink) -> Result<()> {
        let _span = info_span!("transcribe_file", path = %path.display()).entered();

        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }

        let samples = audio::load_samples(path)?;
        self.transcribe_samples(samples, sink)
    }

    /// Same as [`Self::transcribe_file`] for mono samples already at
    /// [`audio::TARGET_SAMPLE_RATE`].
    pub fn transcribe_samples(
        &mut self,
        mut samples: Vec<f32>,
        sink: &mut dyn EventSink,
    ) -> Result<()> {
        if samples.is_empty() {
            return Err(Error::msg("audio contains no samples"));
        }

        // `None`: VAD disabled. `Some(None)`: VAD ran and found no speech.
        let speech = match self.vad.as_mut() {
            Some(vad) => Some(vad.apply(&mut samples)?),
            None => None,
        };

        let probe_from = match &speech {
            Some(Some(ranges)) => ranges.first_sample(),
            _ => 0,
        };
        let info = self.language_info(&samples[probe_from..])?;

        info!(
            language = %info.language,
            probability = info.probability,
            "language selected"
        );
        sink.emit(&Event::meta(info.language.as_str(), info.probability))?;

        if matches!(speech, Some(None)) {
            debug!("no speech detected; nothing to decode");
            return Ok(());
        }

        let mut emitted = 0usize;
        WindowedTranscriber::new(&mut self.model).run(&samples, &info.language, &mut |seg| {
            sink.emit(&Event::Segment {
                start: seg.start_seconds,
                end: seg.end_seconds,
                text: seg.text,
            })?;
            emitted += 1;
            Ok(())
        })?;

        info!(segments = emitted, "transcription complete");
        Ok(())
    }

    fn language_info(&mut self, samples: &[f32]) -> Result<LanguageInfo> {
        if let Some(language) = &self.language {
            return Ok(LanguageInfo {
                language: language.clone(),
                probability: 1.0,
            });
        }
        Ok(self.model.detect_language(samples)?)
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}
