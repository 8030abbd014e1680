use anyhow::{Context, Result};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperSegment, WhisperState};

use crate::model::Segment;

/// Decoder settings fixed for the lifetime of a loaded model.
#[derive(Debug, Clone)]
pub(super) struct DecodeSettings {
    pub threads: usize,
    pub initial_prompt: String,
}

fn build_full_params<'a>(settings: &'a DecodeSettings, language: &'a str) -> FullParams<'a, 'a> {
    // Greedy decoding: much faster than beam search, slightly worse on mumbled speech.
    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

    params.set_n_threads(i32::try_from(settings.threads).unwrap_or(i32::MAX));
    params.set_translate(false);
    params.set_language(Some(language));
    params.set_no_context(true);
    params.set_single_segment(false);

    if !settings.initial_prompt.is_empty() {
        params.set_initial_prompt(&settings.initial_prompt);
    }

    params.set_print_progress(false);
    params.set_print_special(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    params
}

pub(super) fn run_whisper_full(
    ctx: &WhisperContext,
    settings: &DecodeSettings,
    language: &str,
    samples: &[f32],
) -> Result<WhisperState> {
    let params = build_full_params(settings, language);

    let mut state = ctx
        .create_state()
        .context("failed to create whisper state")?;

    state
        .full(params, samples)
        .context("failed to run whisper full()")?;

    Ok(state)
}

pub(super) fn collect_segments(state: &WhisperState) -> Result<Vec<Segment>> {
    state.as_iter().map(to_segment).collect()
}

fn to_segment(segment: WhisperSegment) -> Result<Segment> {
    // Lossy: a multi-byte character split across tokens must not abort the whole run.
    let text = segment
        .to_str_lossy()
        .context("failed to get segment text")?
        .into_owned();

    Ok(segment_from_centiseconds(
        segment.start_timestamp(),
        segment.end_timestamp(),
        text,
    ))
}

/// whisper.cpp reports segment bounds in centiseconds and uses -1 for "unknown".
pub(super) fn segment_from_centiseconds(t0: i64, t1: i64, text: String) -> Segment {
    let start_seconds = centiseconds_to_seconds(t0);
    let end_seconds = centiseconds_to_seconds(t1).max(start_seconds);
    Segment {
        start_seconds,
        end_seconds,
        text,
    }
}

fn centiseconds_to_seconds(value: i64) -> f64 {
    if value < 0 { 0.0 } else { value as f64 / 100.0 }
}
