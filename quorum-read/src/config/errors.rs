use anyerror::AnyError;

/// Error variants related to configuration.
#[derive(Debug, thiserror::Error)]
#[derive(PartialEq, Eq)]
pub enum ConfigError {
    #[error("ParseError: {source} while parsing ({args:?})")]
    ParseError { source: AnyError, args: Vec<String> },

    /// The read timeout must leave room for at least one replica probe.
    #[error("read_timeout_ms({value}) must be > 0")]
    InvalidReadTimeout { value: u64 },
}
