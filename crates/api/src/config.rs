use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use scriptrun_core::runs::launcher::LaunchSettings;
use scriptrun_core::runs::RunSettings;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `9855`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`). Applies until the
    /// response head is produced, so long-lived streams are unaffected.
    pub request_timeout_secs: u64,
    /// How long shutdown waits for active runs to drain (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Root directory of the script store.
    pub scripts_dir: PathBuf,
    /// Interpreter scripts are run with (default: `/bin/bash`).
    pub script_interpreter: PathBuf,
    /// Idle interval after which a stream emits a keep-alive event.
    pub stream_keepalive: Duration,
    /// How long finished runs stay resolvable. `None` keeps them forever.
    pub run_retention: Option<Duration>,
    /// Grace period between SIGTERM and SIGKILL on stop. `None` never escalates.
    pub stop_escalation: Option<Duration>,
    /// Whether the server runs inside a container (reported by `/info`).
    pub container: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                                 |
    /// |-------------------------|-----------------------------------------|
    /// | `HOST`                  | `0.0.0.0`                               |
    /// | `PORT`                  | `9855`                                  |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`                 |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                                    |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                                    |
    /// | `SCRIPTS_DIR`           | `$HOME/.local/share/scriptrun/scripts`  |
    /// | `SCRIPT_INTERPRETER`    | `/bin/bash`                             |
    /// | `STREAM_KEEPALIVE_SECS` | `30`                                    |
    /// | `RUN_RETENTION_SECS`    | `3600` (`0` keeps runs forever, capped at 100 years) |
    /// | `STOP_ESCALATION_SECS`  | `10` (`0` disables SIGKILL escalation)  |
    /// | `RUNNING_IN_CONTAINER`  | `1` forces container mode; otherwise detected from `/.dockerenv` |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env_parse("PORT", 9855);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env_parse("REQUEST_TIMEOUT_SECS", 30);
        let shutdown_timeout_secs: u64 = env_parse("SHUTDOWN_TIMEOUT_SECS", 30);

        let scripts_dir = std::env::var("SCRIPTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_scripts_dir());

        let script_interpreter = std::env::var("SCRIPT_INTERPRETER")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/bin/bash"));

        let stream_keepalive = Duration::from_secs(env_parse("STREAM_KEEPALIVE_SECS", 30));
        let run_retention = retention_from_secs(env_parse("RUN_RETENTION_SECS", 3600));
        let stop_escalation = optional_secs(env_parse("STOP_ESCALATION_SECS", 10));
        let container = std::env::var("RUNNING_IN_CONTAINER").is_ok_and(|v| v.trim() == "1")
            || std::path::Path::new("/.dockerenv").exists();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            scripts_dir,
            script_interpreter,
            stream_keepalive,
            run_retention,
            stop_escalation,
            container,
        }
    }

    /// Settings handed to the run engine.
    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            launch: LaunchSettings {
                interpreter: self.script_interpreter.clone(),
                ..LaunchSettings::default()
            },
            stop_escalation: self.stop_escalation,
        }
    }
}

/// Read and parse `key`, falling back to `default` when unset.
///
/// Panics on a malformed value; misconfiguration should fail at startup.
fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be a valid {}: {e}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}

fn optional_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Longest retention honoured; larger values are clamped to it.
pub const MAX_RUN_RETENTION: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

fn retention_from_secs(secs: u64) -> Option<Duration> {
    optional_secs(secs).map(|retention| retention.min(MAX_RUN_RETENTION))
}

fn default_scripts_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    PathBuf::from(home).join(".local/share/scriptrun/scripts")
}
