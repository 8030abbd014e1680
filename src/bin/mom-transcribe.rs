use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::builder::FalseyValueParser;
use clap::error::ErrorKind;
use clap::Parser;
use tracing::error;

use mom_transcribe::event::Event;
use mom_transcribe::event_writer::{EventSink, NdjsonWriter};
use mom_transcribe::opts::{DEFAULT_MODEL_PATH, DEFAULT_VAD_MODEL_PATH, Opts};
use mom_transcribe::{Error, Transcriber, logging};

fn main() -> ExitCode {
    // The parent only understands events on stdout; argument mistakes exit quietly.
    let params = match Params::try_parse() {
        Ok(params) => params,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(_) => return ExitCode::FAILURE,
    };

    logging::init();

    let stdout = io::stdout();
    let mut sink = NdjsonWriter::new(stdout.lock());

    match run(&params, &mut sink) {
        Ok(()) => match sink.close() {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                error!(error = %err, "failed to flush output");
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            error!(error = %err, path = %params.audio_path.display(), "transcription failed");
            if let Err(write_err) = sink.emit(&Event::error(err.to_string())) {
                error!(error = %write_err, "failed to write error event");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(params: &Params, sink: &mut dyn EventSink) -> mom_transcribe::Result<()> {
    // Check before loading anything: model load takes seconds.
    if !params.audio_path.exists() {
        return Err(Error::FileNotFound(params.audio_path.clone()));
    }

    let opts = params.to_opts();
    let mut transcriber = Transcriber::new(&opts)?;
    transcriber.transcribe_file(Path::new(&params.audio_path), sink)
}

#[derive(Parser, Debug)]
#[command(name = "mom-transcribe", version)]
#[command(about = "Transcribe one audio file and stream JSON events, one per line, on stdout")]
struct Params {
    /// Audio (or video) file to transcribe.
    audio_path: PathBuf,

    /// Whisper GGML model.
    #[arg(
        short = 'm',
        long = "model",
        env = "MOM_TRANSCRIBE_MODEL",
        default_value = DEFAULT_MODEL_PATH
    )]
    model_path: String,

    /// whisper.cpp VAD model.
    #[arg(
        long = "vad-model",
        env = "MOM_TRANSCRIBE_VAD_MODEL",
        default_value = DEFAULT_VAD_MODEL_PATH
    )]
    vad_model_path: String,

    /// Spoken language code (e.g. "hi"); detected when omitted.
    #[arg(short = 'l', long = "language", env = "MOM_TRANSCRIBE_LANGUAGE")]
    language: Option<String>,

    /// Keep whisper.cpp off the GPU.
    #[arg(long = "cpu", env = "MOM_TRANSCRIBE_CPU", value_parser = FalseyValueParser::new())]
    cpu_only: bool,

    /// Decode silence too instead of filtering it out.
    #[arg(long = "no-vad", default_value_t = false)]
    disable_voice_activity_detection: bool,

    /// Download the default models when they are missing.
    #[arg(
        long = "download-missing",
        env = "MOM_TRANSCRIBE_DOWNLOAD",
        value_parser = FalseyValueParser::new()
    )]
    download_missing: bool,
}

impl Params {
    fn to_opts(&self) -> Opts {
        Opts {
            model_path: self.model_path.clone(),
            vad_model_path: self.vad_model_path.clone(),
            use_gpu: !self.cpu_only,
            enable_voice_activity_detection: !self.disable_voice_activity_detection,
            language: self.language.clone().filter(|l| !l.trim().is_empty()),
            download_missing: self.download_missing,
            ..Opts::default()
        }
    }
}
