use crate::config::errors::ConfigError;
use crate::Config;

#[test]
fn test_config_defaults() {
    let cfg = Config::default();

    assert_eq!(false, cfg.legacy_read_barrier);
    assert_eq!(10_000, cfg.read_timeout_ms);
}

#[test]
fn test_zero_read_timeout_produces_expected_error() {
    let config = Config {
        read_timeout_ms: 0,
        ..Default::default()
    };

    let res = config.validate();
    let err = res.unwrap_err();
    assert_eq!(err, ConfigError::InvalidReadTimeout { value: 0 });
}

#[test]
fn test_build() -> anyhow::Result<()> {
    let config = Config::build(&[
        "foo",
        "--legacy-read-barrier=true",
        "--read-timeout-ms=2500",
    ])?;

    assert_eq!(true, config.legacy_read_barrier);
    assert_eq!(2500, config.read_timeout_ms);

    Ok(())
}

#[test]
fn test_build_rejects_unknown_flag() {
    let res = Config::build(&["foo", "--no-such-flag"]);
    assert!(matches!(res, Err(ConfigError::ParseError { .. })));
}
