//! Decode an audio (or video) file into the sample format Whisper expects.
//!
//! Steps:
//! - probe the container and pick the first decodable audio track
//! - decode every packet of that track into interleaved `f32`
//! - downmix to mono
//! - resample to [`TARGET_SAMPLE_RATE`] when the source rate differs
//!
//! The whole file is decoded up front: VAD and language detection both need to look
//! across the buffer before the first segment can be emitted.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::{AudioBufferRef, SampleBuffer};
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Track};
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info};

/// Whisper's mono sample rate (Hz).
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Source frames fed to rubato per `process()` call.
const RESAMPLER_CHUNK_FRAMES: usize = 2048;

/// Load `path` and return mono samples at [`TARGET_SAMPLE_RATE`], normalized to `[-1.0, 1.0]`.
///
/// Fails if the file cannot be opened, has no audio track, or decodes to nothing.
pub fn load_samples(path: &Path) -> Result<Vec<f32>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open audio file '{}'", path.display()))?;

    let (mut format, track) = probe(file, path)?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| anyhow!(e))
        .context("failed to create decoder for audio track")?;

    let mut mono = MonoBuffer::default();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            // End of stream (or a truncated tail) ends decoding.
            Err(SymphoniaError::IoError(_)) => break,
            Err(e) => return Err(anyhow!(e)).context("failed reading packet"),
        };

        if packet.track_id() != track.id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => mono.push(decoded)?,
            Err(SymphoniaError::DecodeError(reason)) => {
                debug!(reason, "skipping undecodable frame");
            }
            Err(SymphoniaError::IoError(_)) => break,
            Err(e) => return Err(anyhow!(e)).context("decoder failure"),
        }
    }

    let Some(src_rate) = mono.rate else {
        bail!("no audio samples decoded from '{}'", path.display());
    };
    if mono.samples.is_empty() {
        bail!("no audio samples decoded from '{}'", path.display());
    }

    info!(src_rate, frames = mono.samples.len(), "decoded audio");

    if src_rate == TARGET_SAMPLE_RATE {
        return Ok(mono.samples);
    }

    resample(&mono.samples, src_rate, TARGET_SAMPLE_RATE)
}

fn probe(file: File, path: &Path) -> Result<(Box<dyn FormatReader>, Track)> {
    let mss = MediaSourceStream::new(
        Box::new(file),
        MediaSourceStreamOptions {
            buffer_len: 256 * 1024,
        },
    );

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| anyhow!(e))
        .context("failed to probe media file")?;

    let format = probed.format;

    // First track that looks decodable and knows its sample rate.
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
        .cloned()
        .ok_or_else(|| anyhow!("no audio track found"))?;

    Ok((format, track))
}

/// Accumulates decoded packets as mono samples at the source rate.
#[derive(Default)]
struct MonoBuffer {
    scratch: Option<SampleBuffer<f32>>,
    samples: Vec<f32>,
    rate: Option<u32>,
}

impl MonoBuffer {
    fn push(&mut self, decoded: AudioBufferRef<'_>) -> Result<()> {
        let spec = *decoded.spec();
        let channels = spec.channels.count();
        if channels == 0 {
            bail!("decoded audio had zero channels");
        }

        let frames = decoded.capacity() as u64;
        let needs_scratch = self
            .scratch
            .as_ref()
            .is_none_or(|buf| (buf.capacity() as u64) < frames * channels as u64);
        if needs_scratch {
            self.scratch = Some(SampleBuffer::<f32>::new(frames, spec));
        }

        let scratch = self
            .scratch
            .as_mut()
            .ok_or_else(|| anyhow!("sample buffer not initialized"))?;
        scratch.copy_interleaved_ref(decoded);

        self.rate.get_or_insert(spec.rate);
        downmix_into(scratch.samples(), channels, &mut self.samples);
        Ok(())
    }
}

/// Append the mono mix of `interleaved` to `out`, averaging channels with equal weight.
fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels == 1 {
        out.extend_from_slice(interleaved);
        return;
    }

    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}

/// Resample mono audio, compensating for the sinc filter delay so sample `n` of the output
/// lines up with time `n / to_rate` of the input.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    let ratio = f64::from(to_rate) / f64::from(from_rate);

    let mut rs = SincFixedIn::<f32>::new(
        ratio,
        2.0,
        SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        },
        RESAMPLER_CHUNK_FRAMES,
        1,
    )
    .map_err(|e| anyhow!(e))
    .context("failed to init resampler")?;

    let delay = rs.output_delay();
    let expected = (samples.len() as f64 * ratio).round() as usize;
    let mut out = Vec::with_capacity(expected + delay + RESAMPLER_CHUNK_FRAMES);

    let mut block = vec![0.0f32; RESAMPLER_CHUNK_FRAMES];
    let mut chunks = samples.chunks(RESAMPLER_CHUNK_FRAMES);

    // Keep feeding (zero padding once input runs out) until the delayed tail is out.
    while out.len() < expected + delay {
        block.fill(0.0);
        if let Some(chunk) = chunks.next() {
            block[..chunk.len()].copy_from_slice(chunk);
        }

        let processed = rs
            .process(&[block.as_slice()], None)
            .map_err(|e| anyhow!(e))
            .context("resampler process failed")?;

        let [channel] = processed.as_slice() else {
            bail!("expected mono output from resampler");
        };
        out.extend_from_slice(channel);
    }

    out.drain(..delay.min(out.len()));
    out.truncate(expected);

    debug!(from_rate, to_rate, frames = out.len(), "resampled audio");
    Ok(out)
}
