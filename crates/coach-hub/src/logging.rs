use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    path::Path,
    sync::{Arc, Mutex},
};

use tracing_subscriber::EnvFilter;

use crate::config::Config;

const LOG_FILE_NAME: &str = "coach-hub.log";

/// Log destination shared by every formatter: stdout, plus `coach-hub.log`
/// when a log directory is configured. Keep it alive for the process lifetime.
#[derive(Clone, Default)]
pub struct LogSink {
    file: Option<Arc<Mutex<File>>>,
}

impl LogSink {
    fn open(log_dir: &str) -> io::Result<Self> {
        if log_dir.is_empty() {
            return Ok(Self::default());
        }
        let dir = Path::new(log_dir);
        std::fs::create_dir_all(dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(LOG_FILE_NAME))?;
        Ok(Self {
            file: Some(Arc::new(Mutex::new(file))),
        })
    }

    fn with_file(&self, op: impl FnOnce(&mut File) -> io::Result<()>) {
        if let Some(Ok(mut file)) = self.file.as_ref().map(|file| file.lock()) {
            let _ = op(&mut *file);
        }
    }
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _ = io::stdout().write_all(buf);
        self.with_file(|file| file.write_all(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = io::stdout().flush();
        self.with_file(|file| file.flush());
        Ok(())
    }
}

/// `RUST_LOG` wins; otherwise `--debug`, then `COACH_LOG_LEVEL`, then `info`.
fn default_level(debug: bool, configured: Option<String>) -> String {
    if debug {
        return "debug".to_string();
    }
    configured
        .filter(|level| !level.trim().is_empty())
        .unwrap_or_else(|| "info".to_string())
}

pub fn init_logging(config: &Config) -> Option<LogSink> {
    let level = default_level(config.debug, std::env::var("COACH_LOG_LEVEL").ok());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let sink = LogSink::open(&config.log_dir).unwrap_or_else(|err| {
        eprintln!("log_file_error: {err}");
        LogSink::default()
    });

    let writer = sink.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok()?;
    Some(sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_prefers_debug_flag() {
        assert_eq!(default_level(true, Some("warn".into())), "debug");
        assert_eq!(default_level(false, Some("warn".into())), "warn");
        assert_eq!(default_level(false, Some(" ".into())), "info");
        assert_eq!(default_level(false, None), "info");
    }

    #[test]
    fn sink_without_dir_has_no_file() {
        let sink = LogSink::open("").expect("no dir");
        assert!(sink.file.is_none());
    }

    #[test]
    fn sink_appends_to_log_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut sink = LogSink::open(dir.path().to_str().expect("utf8")).expect("open");
        sink.write_all(b"event=hub_start\n").expect("write");
        sink.clone().write_all(b"event=hub_stop\n").expect("write");
        sink.flush().expect("flush");

        let written = std::fs::read_to_string(dir.path().join(LOG_FILE_NAME)).expect("read");
        assert_eq!(written, "event=hub_start\nevent=hub_stop\n");
    }
}
