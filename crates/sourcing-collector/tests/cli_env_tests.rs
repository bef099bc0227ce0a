//! Environment-variable fallbacks for `sourcing-collector run`

use clap::Parser;
use serial_test::serial;
use sourcing_collector::cli::{Cli, Commands};
use sourcing_collector::config::StorageTarget;
use sourcing_collector::ConfigError;
use sourcing_common::Environment;

const VARS: &[&str] = &[
    "FEED_GROUP",
    "SOURCE_URL",
    "ENVIRONMENT",
    "STORAGE_BACKEND",
    "S3_BUCKET",
    "S3_PREFIX",
    "S3_ENDPOINT",
    "S3_PATH_STYLE",
    "DEDUP_URL",
    "CONCURRENCY",
];

fn clear() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

fn run_args() -> sourcing_collector::cli::RunArgs {
    match Cli::try_parse_from(["sourcing-collector", "run"]).unwrap().command {
        Commands::Run(args) => *args,
    }
}

#[test]
#[serial]
fn test_run_configured_entirely_from_env() {
    clear();
    std::env::set_var("FEED_GROUP", "miso_binding_constraints");
    std::env::set_var("SOURCE_URL", "https://api.test/constraints");
    std::env::set_var("ENVIRONMENT", "staging");
    std::env::set_var("S3_BUCKET", "market-data");
    std::env::set_var("S3_PREFIX", "raw");
    std::env::set_var("S3_ENDPOINT", "http://localhost:9000");
    std::env::set_var("S3_PATH_STYLE", "true");
    std::env::set_var("CONCURRENCY", "8");

    let config = run_args().into_config().unwrap();
    clear();

    assert_eq!(config.environment, Environment::Staging);
    assert_eq!(config.concurrency, 8);
    assert_eq!(config.storage_prefix, "raw");
    match config.storage {
        StorageTarget::S3(s3) => {
            assert_eq!(s3.bucket, "market-data");
            assert_eq!(s3.endpoint.as_deref(), Some("http://localhost:9000"));
            assert!(s3.path_style);
        }
        other => panic!("expected S3 storage, got {other:?}"),
    }
}

#[test]
#[serial]
fn test_flags_override_env() {
    clear();
    std::env::set_var("FEED_GROUP", "from_env");
    std::env::set_var("SOURCE_URL", "https://api.test/x");

    let args = match Cli::try_parse_from([
        "sourcing-collector",
        "run",
        "--feed-group",
        "from_flag",
        "--storage",
        "local",
    ])
    .unwrap()
    .command
    {
        Commands::Run(args) => *args,
    };
    clear();

    assert_eq!(args.into_config().unwrap().feed_group, "from_flag");
}

#[test]
#[serial]
fn test_bad_dedup_url_from_env_is_rejected() {
    clear();
    std::env::set_var("FEED_GROUP", "feed");
    std::env::set_var("SOURCE_URL", "https://api.test/x");
    std::env::set_var("STORAGE_BACKEND", "local");
    std::env::set_var("DEDUP_URL", "redis://localhost:6379");

    let result = run_args().into_config();
    clear();

    assert!(matches!(
        result,
        Err(ConfigError::Invalid {
            field: "dedup-url",
            ..
        })
    ));
}
