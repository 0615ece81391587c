//! Runtime configuration for the quorum read engine.

use std::time::Duration;

use anyerror::AnyError;
use clap::Parser;

use crate::config::errors::ConfigError;

/// Configuration for a [`QuorumReader`](crate::QuorumReader).
///
/// The defaults match the backend's replication cadence: barrier retries are
/// paced in single-digit milliseconds locally and tens of milliseconds for
/// cross-region commit propagation, so the default overall read timeout of
/// ten seconds leaves ample room for the engine's bounded internal retries.
#[derive(Clone, Debug, Parser)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct Config {
    /// Use the legacy fixed-retry read barrier instead of the budgeted-delay
    /// one.
    ///
    /// The two are outcome-equivalent and differ only in retry pacing; this
    /// switch is kept for one release as a rollback valve. The value of this
    /// config is evaluated as follows:
    /// - being absent: false
    /// - `--legacy-read-barrier`: true
    /// - `--legacy-read-barrier=false`: false
    /// - env `QUORUM_READ_LEGACY_BARRIER=true`: true
    // clap 4 requires `num_args = 0..=1`, or it complains about missing arg
    // error https://github.com/clap-rs/clap/discussions/4374
    #[clap(long,
           env = "QUORUM_READ_LEGACY_BARRIER",
           default_value_t = false,
           action = clap::ArgAction::Set,
           num_args = 0..=1,
           default_missing_value = "true"
    )]
    pub legacy_read_barrier: bool,

    /// Overall time budget in milliseconds for one logical read, covering
    /// every internal retry, barrier attempt and primary fallback.
    #[clap(long, default_value = "10000")]
    pub read_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        <Self as Parser>::parse_from(Vec::<&'static str>::new())
    }
}

impl Config {
    /// Build a `Config` instance from a series of command line arguments.
    ///
    /// The first element in `args` must be the application name.
    pub fn build(args: &[&str]) -> Result<Config, ConfigError> {
        let config = <Self as Parser>::try_parse_from(args).map_err(|e| {
            ConfigError::ParseError {
                source: AnyError::from(&e),
                args: args.iter().map(|x| x.to_string()).collect(),
            }
        })?;
        config.validate()
    }

    /// Validate the state of this config.
    pub fn validate(self) -> Result<Config, ConfigError> {
        if self.read_timeout_ms == 0 {
            return Err(ConfigError::InvalidReadTimeout {
                value: self.read_timeout_ms,
            });
        }

        Ok(self)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}
