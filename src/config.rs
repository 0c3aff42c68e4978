use crate::ledger::{CompletionPolicy, LedgerPolicy};
use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration as StdDuration};
use tracing::warn;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATA_PATH: &str = "data/state.json";
const DEFAULT_SWEEP_SECS: u64 = 60;
const DEFAULT_LOOKAHEAD_DAYS: i64 = 31;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_path: PathBuf,
    pub sweep_interval: StdDuration,
    pub policy: LedgerPolicy,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = parse_or(&lookup, "PORT", DEFAULT_PORT);
        let data_path = lookup("APP_DATA_PATH")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH));
        let sweep_secs = parse_or(&lookup, "APP_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_SECS).max(1);
        let lookahead_days = parse_or(&lookup, "APP_LOOKAHEAD_DAYS", DEFAULT_LOOKAHEAD_DAYS).max(0);
        let lookahead = chrono::Duration::try_days(lookahead_days).unwrap_or_else(|| {
            warn!("APP_LOOKAHEAD_DAYS={lookahead_days} is out of range, using {DEFAULT_LOOKAHEAD_DAYS}");
            chrono::Duration::days(DEFAULT_LOOKAHEAD_DAYS)
        });
        let completion = match lookup("APP_GRACE_MINUTES") {
            None => CompletionPolicy::UntilSweep,
            Some(_) => {
                let minutes = parse_or(&lookup, "APP_GRACE_MINUTES", 0i64).max(0);
                let grace = chrono::Duration::try_minutes(minutes).unwrap_or_else(|| {
                    warn!("APP_GRACE_MINUTES={minutes} is out of range, using 0");
                    chrono::Duration::zero()
                });
                CompletionPolicy::Grace(grace)
            }
        };

        Self {
            port,
            data_path,
            sweep_interval: StdDuration::from_secs(sweep_secs),
            policy: LedgerPolicy {
                completion,
                lookahead,
            },
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("ignoring {key}={raw:?}, using {default}");
            default
        }),
    }
}
