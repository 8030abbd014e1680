use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding the log filter directives.
pub const LOG_ENV_VAR: &str = "MOM_TRANSCRIBE_LOG";

/// Initialize structured JSON logging on stderr.
///
/// The parent process parses stdout line by line as events, so a single log line there would
/// corrupt the stream. Defaults to `error` unless `MOM_TRANSCRIBE_LOG` says otherwise
/// (e.g. `MOM_TRANSCRIBE_LOG=debug,whisper_cpp=trace`).
pub fn init() {
    let directives = std::env::var(LOG_ENV_VAR).ok();

    let _ = tracing_subscriber::registry()
        .with(build_filter(directives.as_deref()))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .with_span_list(true),
        )
        .try_init();
}

/// Invalid directives are skipped rather than failing startup.
fn build_filter(directives: Option<&str>) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::ERROR.into())
        .parse_lossy(directives.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init();
        init();
    }

    #[test]
    fn defaults_to_errors_only() {
        assert_eq!(build_filter(None).max_level_hint(), Some(LevelFilter::ERROR));
        assert_eq!(build_filter(Some("")).max_level_hint(), Some(LevelFilter::ERROR));
    }

    #[test]
    fn directives_raise_the_level() {
        let filter = build_filter(Some("debug,whisper_cpp=trace"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
    }
}
