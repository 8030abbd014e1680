//! `mom-transcribe`: stream a Whisper transcription of one audio file as newline-delimited
//! JSON events.
//!
//! This crate provides:
//! - Audio decoding into Whisper's sample format
//! - Voice-activity filtering
//! - Language detection and windowed, streaming segment decoding
//! - The event protocol and its NDJSON writer
//!
//! The `mom-transcribe` binary is a thin wrapper meant to be spawned by a parent process that
//! reads events from its stdout.

mod error;

pub use error::{Error, Result};

// High-level API (most consumers should start here).
pub mod opts;
pub mod transcriber;

pub use transcriber::Transcriber;

// Output protocol.
pub mod event;
pub mod event_writer;

// Model seam and the built-in Whisper implementation.
pub mod model;
pub mod whisper;

// Audio preprocessing and streaming.
pub mod audio;
pub mod vad;
pub mod windowed;

#[cfg(feature = "download")]
pub mod fetch;

#[cfg(feature = "logging")]
pub mod logging;
