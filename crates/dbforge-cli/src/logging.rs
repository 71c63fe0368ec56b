use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use clap::ValueEnum;
use thiserror::Error;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("cannot open log file: {0}")]
    Io(#[from] io::Error),
    #[error("cannot install subscriber: {0}")]
    Init(String),
}

/// Format of the events written to stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Install the global subscriber.
///
/// Events go to stderr in `format`; when `log_file` is set they are also
/// appended to it as JSON lines. `RUST_LOG` overrides the default `info` level.
pub fn init_logging(format: LogFormat, log_file: Option<&Path>) -> Result<(), LoggingError> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let stderr = tracing_subscriber::fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_writer(io::stderr);
    layers.push(match format {
        LogFormat::Pretty => stderr.boxed(),
        LogFormat::Json => stderr.json().boxed(),
    });

    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let file = Arc::new(Mutex::new(file));
        let make_writer = BoxMakeWriter::new(move || SharedWriter {
            file: Arc::clone(&file),
        });
        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_timer(UtcTime::rfc_3339())
                .with_writer(make_writer)
                .boxed(),
        );
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|err| LoggingError::Init(err.to_string()))
}

struct SharedWriter {
    file: Arc<Mutex<std::fs::File>>,
}

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("failed to lock log file"))?;
        file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("failed to lock log file"))?;
        file.flush()
    }
}
