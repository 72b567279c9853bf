//! Runtime configuration read from `INTAKE_*` environment variables.
//!
//! Every setting has a default; malformed values are logged and replaced
//! by the default rather than aborting startup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// Application-level constants
pub const APP_NAME: &str = "InspectionIntake";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_OLLAMA_MODEL: &str = "llava";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,inspection_intake_lib=debug,hyper=warn,reqwest=warn"
}

/// Get the application data directory.
/// ~/InspectionIntake/ on all platforms, or the working directory when
/// no home directory can be resolved.
pub fn app_data_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(APP_NAME),
        None => {
            tracing::warn!("Cannot determine home directory, using working directory");
            PathBuf::from(APP_NAME)
        }
    }
}

/// Which vision model API the service talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VisionBackend {
    OpenAi,
    Ollama,
}

impl VisionBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi => DEFAULT_OPENAI_BASE_URL,
            Self::Ollama => DEFAULT_OLLAMA_BASE_URL,
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => DEFAULT_OPENAI_MODEL,
            Self::Ollama => DEFAULT_OLLAMA_MODEL,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub backend: VisionBackend,
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub request_timeout: Duration,
    pub session_ttl: Duration,
    pub sweep_interval: Duration,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_addr = parse_or_default("INTAKE_BIND_ADDR", get("INTAKE_BIND_ADDR"), || {
            SocketAddr::from(([127, 0, 0, 1], 8787))
        });

        let backend = match get("INTAKE_BACKEND") {
            Some(raw) => VisionBackend::parse(&raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "Unknown INTAKE_BACKEND, using openai");
                VisionBackend::OpenAi
            }),
            None => VisionBackend::OpenAi,
        };

        let data_dir = get("INTAKE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(app_data_dir);

        let base_url = get("INTAKE_BASE_URL")
            .unwrap_or_else(|| backend.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string();

        let api_key = get("INTAKE_API_KEY").or_else(|| get("OPENAI_API_KEY"));

        let model = get("INTAKE_MODEL").unwrap_or_else(|| backend.default_model().to_string());

        let request_timeout = secs_or_default(
            "INTAKE_REQUEST_TIMEOUT_SECS",
            get("INTAKE_REQUEST_TIMEOUT_SECS"),
            DEFAULT_REQUEST_TIMEOUT_SECS,
        );
        let session_ttl = secs_or_default(
            "INTAKE_SESSION_TTL_SECS",
            get("INTAKE_SESSION_TTL_SECS"),
            DEFAULT_SESSION_TTL_SECS,
        );
        let sweep_interval = secs_or_default(
            "INTAKE_SWEEP_INTERVAL_SECS",
            get("INTAKE_SWEEP_INTERVAL_SECS"),
            DEFAULT_SWEEP_INTERVAL_SECS,
        );

        Self {
            bind_addr,
            data_dir,
            backend,
            base_url,
            api_key,
            model,
            request_timeout,
            session_ttl,
            sweep_interval,
        }
    }

    /// Directory holding per-session photo folders.
    pub fn photos_dir(&self) -> PathBuf {
        self.data_dir.join("photos")
    }

    /// Directory receiving rendered conclusions.
    pub fn reports_dir(&self) -> PathBuf {
        self.data_dir.join("reports")
    }
}

fn parse_or_default<T, D>(key: &str, raw: Option<String>, default: D) -> T
where
    T: std::str::FromStr,
    D: FnOnce() -> T,
{
    match raw {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Invalid configuration value, using default");
            default()
        }),
        None => default(),
    }
}

fn secs_or_default(key: &str, raw: Option<String>, default_secs: u64) -> Duration {
    let secs: u64 = parse_or_default(key, raw, || default_secs);
    if secs == 0 {
        tracing::warn!(key, "Zero duration is not allowed, using default");
        return Duration::from_secs(default_secs);
    }
    Duration::from_secs(secs)
}
