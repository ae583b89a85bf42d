use std::{path::PathBuf, time::Duration};

use clap::Parser;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: String,
    pub debug: bool,
    pub log_dir: String,
    pub quotes_path: PathBuf,
    pub default_duration: Duration,
    pub write_timeout: Duration,
    pub queue_capacity: usize,
    pub record_store: Option<RecordStoreConfig>,
}

#[derive(Clone)]
pub struct RecordStoreConfig {
    pub url: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for RecordStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStoreConfig")
            .field("url", &self.url)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Parser, Debug)]
#[command(name = "coach-hub")]
pub struct Args {
    #[arg(long, env = "COACH_ADDR", default_value = "0.0.0.0:8080")]
    addr: String,
    #[arg(long, default_value_t = false)]
    debug: bool,
    #[arg(long, env = "COACH_LOG_DIR", default_value = "")]
    log_dir: String,
    #[arg(long, env = "COACH_QUOTES", default_value = "assets/quotes.txt")]
    quotes: PathBuf,
    #[arg(long, default_value_t = 30)]
    default_duration: u64,
    #[arg(long, default_value_t = 2)]
    write_timeout: u64,
    #[arg(long, default_value_t = 64)]
    queue_capacity: usize,
    #[arg(long, env = "PB_URL")]
    pb_url: Option<String>,
    #[arg(long, env = "PB_EMAIL")]
    pb_email: Option<String>,
    #[arg(long, env = "PB_PASSWORD", hide_env_values = true)]
    pb_password: Option<String>,
}

pub fn load_config() -> Config {
    let args = Args::parse();
    let debug = args.debug || env_true("COACH_DEBUG");
    Config::from_args(args, debug)
}

impl Config {
    fn from_args(args: Args, debug: bool) -> Self {
        let record_store = match (
            non_empty(args.pb_url),
            non_empty(args.pb_email),
            non_empty(args.pb_password),
        ) {
            (Some(url), Some(email), Some(password)) => Some(RecordStoreConfig {
                url,
                email,
                password,
            }),
            _ => None,
        };
        Config {
            addr: args.addr,
            debug,
            log_dir: args.log_dir.trim().to_string(),
            quotes_path: args.quotes,
            default_duration: Duration::from_secs(args.default_duration),
            write_timeout: Duration::from_secs(args.write_timeout),
            queue_capacity: args.queue_capacity.max(1),
            record_store,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn env_true(key: &str) -> bool {
    match std::env::var(key) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["coach-hub"];
        argv.extend_from_slice(args);
        let args = Args::try_parse_from(argv).expect("args");
        let debug = args.debug;
        Config::from_args(args, debug)
    }

    #[test]
    fn record_store_requires_all_credentials() {
        let config = parse(&[
            "--pb-url",
            "pb.local:8090",
            "--pb-email",
            "me@example.com",
            "--pb-password",
            "secret",
        ]);
        let store = config.record_store.expect("record store");
        assert_eq!(store.url, "pb.local:8090");
        assert!(!format!("{store:?}").contains("secret"));

        let partial = parse(&["--pb-url", "pb.local:8090", "--pb-password", " "]);
        assert!(partial.record_store.is_none());
    }

    #[test]
    fn durations_come_from_seconds() {
        let config = parse(&["--default-duration", "45", "--write-timeout", "5", "--debug"]);
        assert_eq!(config.default_duration, Duration::from_secs(45));
        assert_eq!(config.write_timeout, Duration::from_secs(5));
        assert!(config.debug);
    }
}
