use std::{io::IsTerminal as _, path::Path};

use rama::{
    error::{BoxError, ErrorContext as _},
    telemetry::tracing::{
        self,
        metadata::LevelFilter,
        subscriber::{EnvFilter, fmt::writer::BoxMakeWriter},
    },
};

/// Logging flags shared by all loadprobe commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetryConfig<'a> {
    pub verbose: bool,
    pub pretty: bool,
    pub output: Option<&'a Path>,
}

/// Set up loadprobe logging to stderr, or appended to `cfg.output` when given.
///
/// `RUST_LOG` refines the INFO (or DEBUG with `verbose`) default.
/// The http traffic dump goes to stdout and is not affected by this.
pub fn init_tracing(cfg: TelemetryConfig<'_>) -> Result<(), BoxError> {
    let directive = if cfg.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
    .into();

    let make_writer = match cfg.output {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .append(true)
                .create(true)
                .open(path)
                .context("open log file")
                .with_context_debug_field("path", || path.to_owned())?;

            BoxMakeWriter::new(file)
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let subscriber = tracing::subscriber::fmt()
        .with_ansi(cfg.output.is_none() && std::io::stderr().is_terminal())
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(directive)
                .from_env_lossy(),
        )
        .with_writer(make_writer);

    if cfg.pretty {
        subscriber.pretty().try_init()?;
    } else {
        subscriber.try_init()?;
    }

    tracing::info!(verbose = cfg.verbose, pretty = cfg.pretty, "loadprobe logging ready");
    Ok(())
}
