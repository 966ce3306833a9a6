use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use sse::event_log::{RetentionPolicy, UnknownCursorPolicy};
use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;

/// Default name of the publisher; also names its durable store tree.
pub const DEFAULT_NAME: &str = "event-publisher";

#[derive(Clone, Debug, PartialEq)]
pub enum StoreKind {
    Memory,
    Sled,
}

#[derive(Debug, PartialEq, Eq)]
pub struct StoreKindParseError;

impl FromStr for StoreKind {
    type Err = StoreKindParseError;
    fn from_str(kind: &str) -> Result<StoreKind, Self::Err> {
        match kind.to_lowercase().as_str() {
            "memory" => Ok(StoreKind::Memory),
            "sled" => Ok(StoreKind::Sled),
            _ => Err(StoreKindParseError),
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreKind::Memory => write!(f, "memory"),
            StoreKind::Sled => write!(f, "sled"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:3000,https://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// Name of this event publisher, used in logs and as the durable store tree name.
    #[arg(long, env, default_value = DEFAULT_NAME)]
    pub name: String,

    /// Path template clients subscribe on. Supports `{name}` segments and whole-segment `*` wildcards.
    #[arg(long, env, default_value = "/events")]
    pub subscribe_path: String,

    /// Path that accepts inbound messages to publish.
    #[arg(long, env, default_value = "/publish")]
    pub publish_path: String,

    /// Reconnection delay in milliseconds advertised to each new subscriber.
    /// When unset no retry advisory is sent.
    #[arg(long, env)]
    pub retry: Option<u64>,

    /// Where published events are stored.
    #[arg(
        long,
        env,
        default_value_t = StoreKind::Memory,
        value_parser = clap::builder::PossibleValuesParser::new(["memory", "sled", "MEMORY", "SLED"])
            .map(|s| s.parse::<StoreKind>().unwrap()),
    )]
    pub store: StoreKind,

    /// Directory of the sled database when `--store sled` is used.
    #[arg(long, env, default_value = "./data/events")]
    pub store_path: PathBuf,

    /// Keep only this many of the newest events. Unbounded when unset.
    #[arg(long, env)]
    pub max_events: Option<NonZeroUsize>,

    /// What to replay when a client resumes from an id that is not in the log.
    #[arg(
        long,
        env,
        default_value_t = UnknownCursorPolicy::ReplayNothing,
        value_parser = clap::builder::PossibleValuesParser::new(["replay-nothing", "replay-all"])
            .map(|s| s.parse::<UnknownCursorPolicy>().unwrap()),
    )]
    pub unknown_cursor: UnknownCursorPolicy,

    /// Expression for the event type of each inbound message: a JSON pointer
    /// (`/kind`) resolved against the message, or a literal.
    #[arg(long, env)]
    pub event_expression: Option<String>,

    /// Expression for the event data of each inbound message: a JSON pointer
    /// (`/payload`) resolved against the message, or a literal.
    #[arg(long, env)]
    pub data_expression: Option<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,
}

impl Default for Config {
    /// Built-in defaults, still honouring environment variables.
    fn default() -> Self {
        Config::parse_from([clap::crate_name!()])
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn retention(&self) -> RetentionPolicy {
        match self.max_events {
            Some(max) => RetentionPolicy::MaxEvents(max),
            None => RetentionPolicy::Unbounded,
        }
    }

    /// Whether inbound messages go through an event builder.
    pub fn has_event_builder(&self) -> bool {
        self.event_expression.is_some() || self.data_expression.is_some()
    }

    pub fn bind_address(&self) -> String {
        format!(
            "{}:{}",
            self.interface.as_deref().unwrap_or("127.0.0.1"),
            self.port
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["event_publisher_rs"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_store_kind_from_str_is_case_insensitive() {
        assert_eq!("SLED".parse::<StoreKind>(), Ok(StoreKind::Sled));
        assert_eq!("memory".parse::<StoreKind>(), Ok(StoreKind::Memory));
        assert_eq!("redis".parse::<StoreKind>(), Err(StoreKindParseError));
    }

    #[test]
    fn test_retention_follows_max_events() {
        assert_eq!(parse(&[]).retention(), RetentionPolicy::Unbounded);
        assert_eq!(
            parse(&["--max-events", "5"]).retention(),
            RetentionPolicy::MaxEvents(NonZeroUsize::new(5).unwrap())
        );
    }

    #[test]
    fn test_max_events_rejects_zero() {
        assert!(Config::try_parse_from(["event_publisher_rs", "--max-events", "0"]).is_err());
    }

    #[test]
    fn test_store_and_cursor_flags() {
        let config = parse(&[
            "--store",
            "sled",
            "--unknown-cursor",
            "replay-all",
            "--retry",
            "10000",
        ]);

        assert_eq!(config.store, StoreKind::Sled);
        assert_eq!(config.unknown_cursor, UnknownCursorPolicy::ReplayAll);
        assert_eq!(config.retry, Some(10000));
    }

    #[test]
    fn test_event_builder_enabled_by_either_expression() {
        assert!(!parse(&[]).has_event_builder());
        assert!(parse(&["--data-expression", "/payload"]).has_event_builder());
    }

    #[test]
    fn test_bind_address() {
        assert_eq!(
            parse(&["--interface", "0.0.0.0", "--port", "8080"]).bind_address(),
            "0.0.0.0:8080"
        );
    }
}
