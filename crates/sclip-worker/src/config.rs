//! Worker configuration.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::retry::RetryPolicy;

/// How many records one scheduled run handles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// One record per tick
    #[default]
    Single,
    /// Every unprocessed record per tick
    Drain,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Single => "single",
            RunMode::Drain => "drain",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(RunMode::Single),
            "drain" => Ok(RunMode::Drain),
            other => Err(format!("unknown run mode '{}'", other)),
        }
    }
}

/// What to do when some clips of a record fail to publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublishFailurePolicy {
    /// Abort the record without committing
    #[default]
    RequireAll,
    /// Log the missing clips and commit anyway
    BestEffort,
}

impl PublishFailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishFailurePolicy::RequireAll => "require-all",
            PublishFailurePolicy::BestEffort => "best-effort",
        }
    }
}

impl fmt::Display for PublishFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublishFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "require-all" | "require_all" => Ok(PublishFailurePolicy::RequireAll),
            "best-effort" | "best_effort" => Ok(PublishFailurePolicy::BestEffort),
            other => Err(format!("unknown publish failure policy '{}'", other)),
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Parent directory for per-record working directories
    pub work_dir: PathBuf,
    /// Period between scheduled runs
    pub run_interval: Duration,
    pub run_mode: RunMode,
    /// Pause before restarting a drain after a store error
    pub drain_retry_delay: Duration,
    /// Drain restarts allowed per run
    pub drain_max_restarts: u32,
    /// Clip container extension
    pub clip_extension: String,
    /// Per-clip FFmpeg timeout
    pub ffmpeg_timeout_secs: u64,
    /// Probe source duration to close the final segment
    pub probe_duration: bool,
    pub publish_policy: PublishFailurePolicy,
    /// Total attempts for a store call
    pub store_retry_attempts: u32,
    pub store_retry_base: Duration,
    pub store_retry_max: Duration,
    /// Total attempts for one clip upload
    pub publish_retry_attempts: u32,
    /// Skip records that failed this many times
    pub max_record_failures: Option<u32>,
    /// Prometheus exporter listen address
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/sclip"),
            run_interval: Duration::from_secs(3600), // hourly
            run_mode: RunMode::Single,
            drain_retry_delay: Duration::from_secs(60),
            drain_max_restarts: 3,
            clip_extension: "mp4".to_string(),
            ffmpeg_timeout_secs: 1800,
            probe_duration: true,
            publish_policy: PublishFailurePolicy::RequireAll,
            store_retry_attempts: 5,
            store_retry_base: Duration::from_secs(4),
            store_retry_max: Duration::from_secs(10),
            publish_retry_attempts: 3,
            max_record_failures: None,
            metrics_addr: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            work_dir: std::env::var("WORKER_WORK_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            run_interval: Duration::from_secs(
                std::env::var("WORKER_RUN_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(3600),
            ),
            run_mode: parse_enum_var("WORKER_RUN_MODE", defaults.run_mode),
            drain_retry_delay: Duration::from_secs(
                std::env::var("WORKER_DRAIN_RETRY_DELAY_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            drain_max_restarts: std::env::var("WORKER_DRAIN_MAX_RESTARTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            clip_extension: std::env::var("WORKER_CLIP_EXTENSION")
                .ok()
                .map(|s| s.trim().trim_start_matches('.').to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.clip_extension),
            ffmpeg_timeout_secs: std::env::var("WORKER_FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1800),
            probe_duration: std::env::var("WORKER_PROBE_DURATION")
                .ok()
                .and_then(|s| parse_flag(&s))
                .unwrap_or(true),
            publish_policy: parse_enum_var("WORKER_PUBLISH_POLICY", defaults.publish_policy),
            store_retry_attempts: std::env::var("WORKER_STORE_RETRY_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(5),
            store_retry_base: Duration::from_secs(
                std::env::var("WORKER_STORE_RETRY_BASE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(4),
            ),
            store_retry_max: Duration::from_secs(
                std::env::var("WORKER_STORE_RETRY_MAX_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            publish_retry_attempts: std::env::var("WORKER_PUBLISH_RETRY_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(3),
            max_record_failures: std::env::var("WORKER_MAX_RECORD_FAILURES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0),
            metrics_addr: std::env::var("METRICS_ADDR").ok().and_then(|s| {
                s.parse()
                    .map_err(|e| warn!("Ignoring invalid METRICS_ADDR '{}': {}", s, e))
                    .ok()
            }),
        }
    }

    /// Retry policy around single record store calls.
    pub fn store_retry_policy(&self, operation: &str) -> RetryPolicy {
        RetryPolicy::new(operation)
            .with_max_attempts(self.store_retry_attempts)
            .with_base_delay(self.store_retry_base)
            .with_max_delay(self.store_retry_max)
    }

    /// Retry policy around one clip upload.
    pub fn publish_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new("publish_clip")
            .with_max_attempts(self.publish_retry_attempts)
            .with_base_delay(Duration::from_secs(1))
            .with_max_delay(self.store_retry_max)
    }
}

fn parse_enum_var<T>(name: &str, default: T) -> T
where
    T: FromStr<Err = String> + fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw.parse().unwrap_or_else(|e| {
            warn!("{}: {}, using {}", name, e, default);
            default
        }),
        _ => default,
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "WORKER_WORK_DIR",
        "WORKER_RUN_INTERVAL_SECS",
        "WORKER_RUN_MODE",
        "WORKER_CLIP_EXTENSION",
        "WORKER_PROBE_DURATION",
        "WORKER_PUBLISH_POLICY",
        "WORKER_STORE_RETRY_ATTEMPTS",
        "WORKER_MAX_RECORD_FAILURES",
        "METRICS_ADDR",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("drain".parse::<RunMode>().unwrap(), RunMode::Drain);
        assert_eq!(" Single ".parse::<RunMode>().unwrap(), RunMode::Single);
        assert!("batch".parse::<RunMode>().is_err());

        assert_eq!(
            "best-effort".parse::<PublishFailurePolicy>().unwrap(),
            PublishFailurePolicy::BestEffort
        );
        assert_eq!(
            "require_all".parse::<PublishFailurePolicy>().unwrap(),
            PublishFailurePolicy::RequireAll
        );
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        let config = WorkerConfig::from_env();

        assert_eq!(config.work_dir, PathBuf::from("/tmp/sclip"));
        assert_eq!(config.run_interval, Duration::from_secs(3600));
        assert_eq!(config.run_mode, RunMode::Single);
        assert_eq!(config.publish_policy, PublishFailurePolicy::RequireAll);
        assert_eq!(config.clip_extension, "mp4");
        assert!(config.probe_duration);
        assert_eq!(config.store_retry_attempts, 5);
        assert_eq!(config.max_record_failures, None);
        assert_eq!(config.metrics_addr, None);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        std::env::set_var("WORKER_RUN_MODE", "drain");
        std::env::set_var("WORKER_RUN_INTERVAL_SECS", "0");
        std::env::set_var("WORKER_CLIP_EXTENSION", ".mkv");
        std::env::set_var("WORKER_PROBE_DURATION", "off");
        std::env::set_var("WORKER_PUBLISH_POLICY", "nonsense");
        std::env::set_var("WORKER_MAX_RECORD_FAILURES", "3");
        std::env::set_var("METRICS_ADDR", "127.0.0.1:9100");

        let config = WorkerConfig::from_env();
        clear_env();

        assert_eq!(config.run_mode, RunMode::Drain);
        assert_eq!(config.run_interval, Duration::from_secs(3600));
        assert_eq!(config.clip_extension, "mkv");
        assert!(!config.probe_duration);
        assert_eq!(config.publish_policy, PublishFailurePolicy::RequireAll);
        assert_eq!(config.max_record_failures, Some(3));
        assert_eq!(config.metrics_addr, Some("127.0.0.1:9100".parse().unwrap()));
    }

    #[test]
    fn test_store_retry_policy() {
        let policy = WorkerConfig::default().store_retry_policy("claim");
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_secs(4));
        assert_eq!(policy.max_delay, Duration::from_secs(10));
        assert_eq!(policy.operation_name, "claim");
    }
}
