//! Segment streaming over a long, fully decoded buffer.
//!
//! whisper.cpp decodes a buffer in one call and only returns segments at the end, which would
//! hold back every result for an hour-long recording until the very end. Instead we walk the
//! buffer in Whisper-sized windows:
//! - run the model on `[head, head + window)`
//! - emit every segment except the last (it may be cut by the window edge)
//! - advance `head` to the end of the last emitted segment and repeat
//!
//! At the end of the buffer everything is emitted.

use anyhow::{Context, Result, ensure};
use tracing::debug;

use crate::audio::TARGET_SAMPLE_RATE;
use crate::model::{Segment, SpeechModel};

/// Whisper's native context length.
pub const DEFAULT_WINDOW_SECONDS: usize = 30;

/// Feeds windows of a sample buffer to a [`SpeechModel`] and hands out absolute-time segments.
pub struct WindowedTranscriber<M> {
    model: M,
    window_samples: usize,
}

impl<M: SpeechModel> WindowedTranscriber<M> {
    pub fn new(model: M) -> Self {
        Self::with_window(model, TARGET_SAMPLE_RATE as usize * DEFAULT_WINDOW_SECONDS)
    }

    pub fn with_window(model: M, window_samples: usize) -> Self {
        Self {
            model,
            window_samples: window_samples.max(1),
        }
    }

    /// Transcribe `samples` in `language`, calling `on_segment` as soon as each segment is final.
    ///
    /// Segments arrive in time order with timestamps relative to `samples[0]`.
    pub fn run(
        &mut self,
        samples: &[f32],
        language: &str,
        on_segment: &mut dyn FnMut(Segment) -> Result<()>,
    ) -> Result<()> {
        let mut head = 0usize;
        let mut windows = 0usize;

        while head < samples.len() {
            let end = (head + self.window_samples).min(samples.len());
            let end_of_stream = end == samples.len();
            let window = &samples[head..end];

            if is_silent(window) {
                debug!(head, len = window.len(), "skipping silent window");
                head = end;
                continue;
            }

            let segments = self
                .model
                .transcribe_window(window, language)
                .with_context(|| format!("transcription failed at {:.2}s", seconds(head)))?;
            windows += 1;

            let mut emit_count = match segments.len() {
                n if end_of_stream => n,
                0 | 1 => segments.len(),
                n => n - 1,
            };

            // Holding back the tail only helps if the next window starts past `head`.
            if emit_count > 0
                && emit_count < segments.len()
                && end_sample(segments[emit_count - 1].end_seconds)? == 0
            {
                emit_count = segments.len();
            }

            debug!(
                head,
                len = window.len(),
                returned = segments.len(),
                emit_count,
                end_of_stream,
                "window decoded"
            );

            let offset = seconds(head);
            let mut advance_to = None;

            for segment in segments.into_iter().take(emit_count) {
                advance_to = Some(segment.end_seconds);
                on_segment(offset_segment(segment, offset))?;
            }

            if end_of_stream {
                break;
            }

            head += match advance_to {
                Some(end_seconds) => advance_samples(end_seconds, window.len())?,
                None => window.len(),
            };
        }

        debug!(windows, "transcription finished");
        Ok(())
    }

    pub fn into_inner(self) -> M {
        self.model
    }
}

/// VAD zeroes non-speech, so an all-zero window has nothing to decode.
fn is_silent(window: &[f32]) -> bool {
    window.iter().all(|&s| s == 0.0)
}

fn seconds(samples: usize) -> f64 {
    samples as f64 / f64::from(TARGET_SAMPLE_RATE)
}

fn offset_segment(mut segment: Segment, offset: f64) -> Segment {
    segment.start_seconds += offset;
    segment.end_seconds = (segment.end_seconds + offset).max(segment.start_seconds);
    segment
}

/// Samples to move past, given the window-relative end of the last emitted segment.
///
/// Always at least one sample and never past the window.
fn advance_samples(end_seconds: f64, window_len: usize) -> Result<usize> {
    let end = end_sample(end_seconds)?;
    if end == 0 {
        // A degenerate segment at the window start would stall us; skip the window instead.
        return Ok(window_len);
    }
    Ok(end.min(window_len))
}

/// Window-relative sample index of a segment end.
fn end_sample(end_seconds: f64) -> Result<usize> {
    ensure!(
        end_seconds.is_finite() && end_seconds >= 0.0,
        "model returned invalid segment end: {end_seconds}"
    );
    Ok((end_seconds * f64::from(TARGET_SAMPLE_RATE)).round() as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LanguageInfo;
    use std::collections::VecDeque;

    const SR: usize = TARGET_SAMPLE_RATE as usize;

    /// Returns scripted segment lists (window-relative) and records the windows it saw.
    struct ScriptedModel {
        replies: VecDeque<Vec<Segment>>,
        seen: Vec<(usize, String)>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Vec<Segment>>) -> Self {
            Self {
                replies: replies.into(),
                seen: Vec::new(),
            }
        }
    }

    impl SpeechModel for ScriptedModel {
        fn detect_language(&mut self, _samples: &[f32]) -> Result<LanguageInfo> {
            Ok(LanguageInfo {
                language: "en".into(),
                probability: 1.0,
            })
        }

        fn transcribe_window(&mut self, samples: &[f32], language: &str) -> Result<Vec<Segment>> {
            self.seen.push((samples.len(), language.to_owned()));
            Ok(self.replies.pop_front().unwrap_or_default())
        }
    }

    fn seg(start: f64, end: f64, text: &str) -> Segment {
        Segment {
            start_seconds: start,
            end_seconds: end,
            text: text.into(),
        }
    }

    fn run(model: ScriptedModel, samples: &[f32], window: usize) -> (Vec<Segment>, ScriptedModel) {
        let mut wt = WindowedTranscriber::with_window(model, window);
        let mut out = Vec::new();
        wt.run(samples, "hi", &mut |s| {
            out.push(s);
            Ok(())
        })
        .expect("run should succeed");
        (out, wt.into_inner())
    }

    #[test]
    fn single_window_emits_everything() {
        let model = ScriptedModel::new(vec![vec![seg(0.0, 1.0, "a"), seg(1.0, 2.0, "b")]]);
        let (out, model) = run(model, &vec![0.1; 3 * SR], 10 * SR);

        assert_eq!(out, vec![seg(0.0, 1.0, "a"), seg(1.0, 2.0, "b")]);
        assert_eq!(model.seen, vec![(3 * SR, "hi".to_string())]);
    }

    #[test]
    fn trailing_segment_is_redecoded_in_next_window() {
        // 14s of audio, 10s windows.
        let model = ScriptedModel::new(vec![
            // window @0s: "a" final, "b" cut at the edge.
            vec![seg(0.0, 4.0, "a"), seg(4.0, 10.0, "b")],
            // window @4s reaches the end: re-decoded "b" plus the rest.
            vec![seg(0.0, 6.0, "b"), seg(6.0, 10.0, "c")],
        ]);
        let (out, model) = run(model, &vec![0.1; 14 * SR], 10 * SR);

        assert_eq!(
            out,
            vec![seg(0.0, 4.0, "a"), seg(4.0, 10.0, "b"), seg(10.0, 14.0, "c")]
        );
        assert_eq!(model.seen.len(), 2);
        assert_eq!(model.seen[1].0, 10 * SR);
    }

    #[test]
    fn window_without_segments_is_skipped_whole() {
        let model = ScriptedModel::new(vec![vec![], vec![seg(0.5, 1.0, "late")]]);
        let (out, model) = run(model, &vec![0.1; 12 * SR], 10 * SR);

        assert_eq!(out, vec![seg(10.5, 11.0, "late")]);
        assert_eq!(model.seen.len(), 2);
        assert_eq!(model.seen[1].0, 2 * SR);
    }

    #[test]
    fn silent_windows_never_reach_the_model() {
        let mut samples = vec![0.0; 25 * SR];
        samples[21 * SR] = 0.3;
        let model = ScriptedModel::new(vec![vec![seg(1.0, 2.0, "x")]]);
        let (out, model) = run(model, &samples, 10 * SR);

        assert_eq!(model.seen, vec![(5 * SR, "hi".to_string())]);
        assert_eq!(out, vec![seg(21.0, 22.0, "x")]);
    }

    #[test]
    fn all_silence_emits_nothing() {
        let model = ScriptedModel::new(vec![]);
        let (out, model) = run(model, &vec![0.0; 5 * SR], 10 * SR);
        assert!(out.is_empty());
        assert!(model.seen.is_empty());
    }

    #[test]
    fn degenerate_segment_still_makes_progress() {
        // A single zero-length segment at the window start must not loop forever.
        let model = ScriptedModel::new(vec![vec![seg(0.0, 0.0, "")], vec![]]);
        let (out, model) = run(model, &vec![0.1; 12 * SR], 10 * SR);
        assert_eq!(out.len(), 1);
        assert_eq!(model.seen.len(), 2);
    }

    #[test]
    fn zero_length_head_does_not_drop_held_back_segments() {
        let model = ScriptedModel::new(vec![
            vec![seg(0.0, 0.0, "a"), seg(0.0, 3.0, "b")],
            vec![],
        ]);
        let (out, model) = run(model, &vec![0.1; 12 * SR], 10 * SR);

        assert_eq!(out, vec![seg(0.0, 0.0, "a"), seg(0.0, 3.0, "b")]);
        assert_eq!(model.seen.len(), 2);
        assert_eq!(model.seen[1].0, 9 * SR);
    }

    #[test]
    fn segments_are_ordered_and_well_formed() {
        let model = ScriptedModel::new(vec![
            vec![seg(0.0, 3.0, "a"), seg(3.0, 7.0, "b"), seg(7.0, 10.0, "c")],
            vec![seg(0.0, 2.0, "c"), seg(2.0, 1.0, "d")],
        ]);
        let (out, _) = run(model, &vec![0.1; 14 * SR], 10 * SR);

        for s in &out {
            assert!(s.start_seconds <= s.end_seconds, "{s:?}");
        }
        for pair in out.windows(2) {
            assert!(pair[0].start_seconds <= pair[1].start_seconds);
        }
    }

    #[test]
    fn model_errors_carry_position() {
        struct Failing;
        impl SpeechModel for Failing {
            fn detect_language(&mut self, _: &[f32]) -> Result<LanguageInfo> {
                unreachable!()
            }
            fn transcribe_window(&mut self, _: &[f32], _: &str) -> Result<Vec<Segment>> {
                anyhow::bail!("gpu fell over")
            }
        }

        let mut wt = WindowedTranscriber::new(Failing);
        let err = wt.run(&[0.2; 16], "en", &mut |_| Ok(())).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("transcription failed at 0.00s"));
        assert!(msg.contains("gpu fell over"));
    }

    #[test]
    fn advance_rejects_negative_end() {
        assert!(advance_samples(-1.0, 100).is_err());
        assert_eq!(advance_samples(0.5, 100).unwrap(), 100);
        assert_eq!(advance_samples(0.001, 100_000).unwrap(), 16);
    }
}
