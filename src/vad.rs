//! Voice-activity filtering.
//!
//! whisper.cpp's VAD (a silero model) finds speech time ranges. We pad, filter and merge
//! those ranges, then silence everything outside them in place. The buffer keeps its length,
//! so segment timestamps still refer to the original audio.

use std::path::Path;

use anyhow::{Context, Result, anyhow, ensure};
use tracing::{debug, info};
use whisper_rs::{WhisperVadContext, WhisperVadContextParams, WhisperVadParams, WhisperVadSegments};

use crate::audio::TARGET_SAMPLE_RATE;

/// Policy knobs for speech range selection, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadPolicy {
    /// Speech probability threshold (higher = more conservative).
    pub threshold: f32,

    /// Padding kept before each speech range.
    pub pre_pad_ms: u32,

    /// Padding kept after each speech range.
    pub post_pad_ms: u32,

    /// Ranges shorter than this are dropped.
    pub min_speech_ms: u32,

    /// Ranges separated by at most this gap are merged.
    pub gap_merge_ms: u32,

    /// Upper bound for a single speech range before whisper.cpp splits it.
    pub max_speech_ms: u32,

    /// Gain applied outside speech (0.0 = mute, 1.0 = unchanged).
    pub non_speech_gain: f32,
}

/// Keep speech with generous padding, mute the rest.
pub const DEFAULT_VAD_POLICY: VadPolicy = VadPolicy {
    threshold: 0.5,
    pre_pad_ms: 400,
    post_pad_ms: 400,
    min_speech_ms: 250,
    gap_merge_ms: 300,
    max_speech_ms: 30_000,
    non_speech_gain: 0.0,
};

/// Sorted, non-overlapping `[start, end)` sample ranges that contain speech.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRanges(Vec<(usize, usize)>);

impl SpeechRanges {
    /// Sort `ranges` by start and merge any that overlap.
    pub fn new(mut ranges: Vec<(usize, usize)>) -> Self {
        ranges.retain(|&(s, e)| s < e);
        ranges.sort_unstable();

        let mut merged: Vec<(usize, usize)> = Vec::with_capacity(ranges.len());
        for (s, e) in ranges {
            match merged.last_mut() {
                Some((_, prev_end)) if s <= *prev_end => *prev_end = (*prev_end).max(e),
                _ => merged.push((s, e)),
            }
        }
        Self(merged)
    }

    pub fn as_slice(&self) -> &[(usize, usize)] {
        &self.0
    }

    /// Index of the first sample of the first speech range.
    pub fn first_sample(&self) -> usize {
        self.0.first().map_or(0, |&(start, _)| start)
    }

    /// Total number of samples covered by speech.
    pub fn speech_samples(&self) -> usize {
        self.0.iter().map(|&(s, e)| e - s).sum()
    }
}

/// Finds speech in 16 kHz mono samples and silences the rest in place.
pub trait SpeechDetector {
    /// Returns the kept ranges, or `None` when there is no speech (the buffer is then left
    /// untouched).
    fn apply(&mut self, samples: &mut [f32]) -> Result<Option<SpeechRanges>>;
}

/// Owns a loaded VAD model and applies [`VadPolicy`] to sample buffers.
pub struct SpeechFilter {
    ctx: WhisperVadContext,
    policy: VadPolicy,
}

impl SpeechFilter {
    /// Load a whisper.cpp VAD model from disk.
    pub fn load(model_path: &str) -> Result<Self> {
        ensure!(!model_path.trim().is_empty(), "VAD model path must be provided");
        let path = Path::new(model_path);
        ensure!(path.exists(), "VAD model not found at '{model_path}'");
        ensure!(path.is_file(), "VAD model path is not a file: '{model_path}'");

        let ctx = WhisperVadContext::new(model_path, WhisperVadContextParams::default())
            .with_context(|| format!("failed to load VAD model from '{model_path}'"))?;

        info!(model_path, "loaded VAD model");
        Ok(Self {
            ctx,
            policy: DEFAULT_VAD_POLICY,
        })
    }
}

impl SpeechDetector for SpeechFilter {
    fn apply(&mut self, samples: &mut [f32]) -> Result<Option<SpeechRanges>> {
        if samples.is_empty() {
            return Ok(None);
        }

        let mut params = WhisperVadParams::default();
        params.set_threshold(self.policy.threshold);
        params.set_min_speech_duration(self.policy.min_speech_ms as i32);
        params.set_max_speech_duration(self.policy.max_speech_ms as f32 / 1000.0);

        let segments = self
            .ctx
            .segments_from_samples(params, samples)
            .context("VAD inference failed")?;

        let spans = collect_spans_cs(&segments)?;
        let ranges = speech_ranges(&spans, TARGET_SAMPLE_RATE, samples.len(), self.policy);

        let Some(ranges) = ranges else {
            debug!(spans = spans.len(), "VAD found no speech");
            return Ok(None);
        };

        apply_non_speech_gain(samples, &ranges, self.policy.non_speech_gain);
        debug!(
            ranges = ranges.as_slice().len(),
            speech_samples = ranges.speech_samples(),
            total_samples = samples.len(),
            "VAD applied"
        );
        Ok(Some(ranges))
    }
}

/// Read whisper.cpp's VAD segments as `(start, end)` pairs in centiseconds.
fn collect_spans_cs(segments: &WhisperVadSegments) -> Result<Vec<(f32, f32)>> {
    let n = segments.num_segments();
    let mut spans = Vec::with_capacity(n.max(0) as usize);

    for i in 0..n {
        let start = segments
            .get_segment_start_timestamp(i)
            .ok_or_else(|| anyhow!("missing start timestamp for VAD segment {i}"))?;
        let end = segments
            .get_segment_end_timestamp(i)
            .ok_or_else(|| anyhow!("missing end timestamp for VAD segment {i}"))?;
        spans.push((start, end));
    }

    Ok(spans)
}

/// Turn centisecond spans into padded, filtered, merged sample ranges.
fn speech_ranges(
    spans_cs: &[(f32, f32)],
    sample_rate_hz: u32,
    samples_len: usize,
    policy: VadPolicy,
) -> Option<SpeechRanges> {
    let sample_rate = sample_rate_hz as f32;

    let pre_pad = ms_to_samples(policy.pre_pad_ms, sample_rate);
    let post_pad = ms_to_samples(policy.post_pad_ms, sample_rate);
    let min_speech = ms_to_samples(policy.min_speech_ms, sample_rate);
    let gap_merge = ms_to_samples(policy.gap_merge_ms, sample_rate);

    let mut ranges: Vec<(usize, usize)> = Vec::new();

    for &(start_cs, end_cs) in spans_cs {
        // floor the start and ceil the end so the first and last speech samples are kept.
        let start = ((start_cs / 100.0) * sample_rate).floor().max(0.0) as usize;
        let end = ((end_cs / 100.0) * sample_rate).ceil().max(0.0) as usize;
        let start = start.min(samples_len);
        let end = end.min(samples_len).max(start);

        if end - start < min_speech {
            continue;
        }

        let start = start.saturating_sub(pre_pad);
        let end = (end + post_pad).min(samples_len);
        if start >= end {
            continue;
        }

        if let Some((_, prev_end)) = ranges.last_mut() {
            if start <= *prev_end || start - *prev_end <= gap_merge {
                *prev_end = (*prev_end).max(end);
                continue;
            }
        }

        ranges.push((start, end));
    }

    if ranges.is_empty() {
        None
    } else {
        Some(SpeechRanges::new(ranges))
    }
}

/// Scale every sample outside `ranges` by `gain` (clamped to `[0, 1]`).
fn apply_non_speech_gain(samples: &mut [f32], ranges: &SpeechRanges, gain: f32) {
    let gain = gain.clamp(0.0, 1.0);
    if (gain - 1.0).abs() < f32::EPSILON {
        return;
    }

    let mut cursor = 0usize;
    for &(s, e) in ranges.as_slice() {
        let s = s.min(samples.len());
        let e = e.min(samples.len());
        if s > cursor {
            scale(&mut samples[cursor..s], gain);
        }
        cursor = cursor.max(e);
    }

    if cursor < samples.len() {
        scale(&mut samples[cursor..], gain);
    }
}

fn scale(buf: &mut [f32], gain: f32) {
    if gain == 0.0 {
        buf.fill(0.0);
        return;
    }
    buf.iter_mut().for_each(|s| *s *= gain);
}

fn ms_to_samples(ms: u32, sample_rate: f32) -> usize {
    ((ms as f32 / 1000.0) * sample_rate).round() as usize
}
