use std::env;
use std::time::Duration;

/// Runtime configuration, read once at startup from `ADSERVER_*` environment
/// variables with development defaults.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: String,
    pub mongodb_uri: String,
    pub database_name: String,
    pub token_secret: String,
    pub token_ttl_seconds: i64,
    pub selection_timeout: Duration,
    pub timestamp_tolerance_seconds: i64,
    pub replay_guard_capacity: usize,
    pub seed_demo_data: bool,
}

impl Config {
    pub fn from_env() -> Config {
        Config {
            bind_address: var_or("ADSERVER_BIND_ADDRESS", "127.0.0.1:8080"),
            mongodb_uri: var_or("ADSERVER_MONGODB_URI", "mongodb://localhost:27017"),
            database_name: var_or("ADSERVER_DATABASE", "adserver"),
            token_secret: var_or(
                "ADSERVER_TOKEN_SECRET",
                "development-secret-change-in-production",
            ),
            token_ttl_seconds: parsed_var_or("ADSERVER_TOKEN_TTL_SECONDS", 300),
            selection_timeout: Duration::from_millis(parsed_var_or(
                "ADSERVER_SELECTION_TIMEOUT_MS",
                100,
            )),
            timestamp_tolerance_seconds: parsed_var_or("ADSERVER_TIMESTAMP_TOLERANCE_SECONDS", 300),
            replay_guard_capacity: parsed_var_or("ADSERVER_REPLAY_GUARD_CAPACITY", 10_000),
            seed_demo_data: parsed_var_or("ADSERVER_SEED_DEMO_DATA", false),
        }
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed_var_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
