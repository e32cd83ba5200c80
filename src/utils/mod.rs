pub mod clock;

pub use clock::{Clock, SystemClock};

use crate::workflow::ClaimStep;
use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use config::{Config as ConfigLoader, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Subscriber;
use tracing_subscriber::fmt::{self, format::Writer, time::FormatTime, MakeWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

pub const DEFAULT_CONFIG_FILE: &str = "edgeclaim";
const ENV_PREFIX: &str = "EDGECLAIM";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub files: FilesConfig,
    pub dispatch: DispatchConfig,
    pub schedule: ScheduleConfig,
    pub claims: ClaimsConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub api_base_url: String,
    pub dashboard_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    pub wallets: PathBuf,
    pub referral_codes: PathBuf,
    /// Empty path disables proxies entirely.
    pub proxies: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub cycle_interval_secs: u64,
    pub wallet_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimsConfig {
    #[serde(default = "ClaimStep::default_sequence")]
    pub steps: Vec<ClaimStep>,
    pub step_delay_ms: u64,
    pub claim_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
    pub log_file: String,
    /// Offset of the log timestamps from UTC. 420 = Asia/Jakarta.
    pub utc_offset_minutes: i32,
}

impl ScheduleConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn wallet_delay(&self) -> Duration {
        Duration::from_millis(self.wallet_delay_ms)
    }
}

impl ClaimsConfig {
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    pub fn claim_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.claim_interval_secs as i64)
    }
}

impl Config {
    /// Defaults, then `edgeclaim.toml` if present, then `EDGECLAIM__*` env vars.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        let mut builder = Self::defaults(ConfigLoader::builder())?;

        builder = match file {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("claims.steps")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize config")?;

        config.validate()?;
        Ok(config)
    }

    fn defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(builder
            .set_default("server.api_base_url", "https://referralapi.layeredge.io/api")?
            .set_default("server.dashboard_url", "https://dashboard.layeredge.io")?
            .set_default("files.wallets", "wallets.json")?
            .set_default("files.referral_codes", "reffCodes.json")?
            .set_default("files.proxies", "proxy.txt")?
            .set_default("dispatch.timeout_secs", 10)?
            .set_default("dispatch.max_attempts", 3)?
            .set_default("dispatch.retry_backoff_ms", 2_000)?
            .set_default("schedule.cycle_interval_secs", 24 * 60 * 60)?
            .set_default("schedule.wallet_delay_ms", 1_000)?
            .set_default("claims.step_delay_ms", 5_000)?
            .set_default("claims.claim_interval_secs", 24 * 60 * 60)?
            .set_default("monitoring.log_level", "info")?
            .set_default("monitoring.log_file", "log-layeredge.txt")?
            .set_default("monitoring.utc_offset_minutes", 7 * 60)?)
    }

    fn validate(&self) -> Result<()> {
        if self.server.api_base_url.is_empty() || self.server.dashboard_url.is_empty() {
            anyhow::bail!("Server URLs must be configured");
        }

        if self.dispatch.max_attempts == 0 {
            anyhow::bail!("dispatch.max_attempts must be at least 1");
        }

        if self.dispatch.timeout_secs == 0 {
            anyhow::bail!("dispatch.timeout_secs must be positive");
        }

        if self.claims.steps.is_empty() {
            tracing::warn!("⚠️ No claim steps enabled, eligible wallets will only be inspected");
        }

        Ok(())
    }

    pub fn proxy_file(&self) -> Option<&Path> {
        if self.files.proxies.as_os_str().is_empty() {
            None
        } else {
            Some(&self.files.proxies)
        }
    }
}

/// Timestamp prefix of every log line: `[HH:mm:ss | DD-MM-YYYY]`.
#[derive(Debug, Clone, Copy)]
pub struct LogTimer {
    offset: FixedOffset,
}

impl LogTimer {
    pub fn new(utc_offset_minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix());
        Self { offset }
    }

    pub fn stamp(&self, at: DateTime<Utc>) -> String {
        format!("[{}]", at.with_timezone(&self.offset).format("%H:%M:%S | %d-%m-%Y"))
    }
}

impl FormatTime for LogTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", self.stamp(Utc::now()))
    }
}

/// One log line: `[HH:mm:ss | DD-MM-YYYY] <message>`, no level or target.
pub fn log_layer<S, W>(timer: LogTimer, writer: W, ansi: bool) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_timer(timer)
        .with_level(false)
        .with_target(false)
}

/// Log to stdout and append the same lines to `log_file`.
pub fn setup_tracing(log_level: &str, log_file: &str, utc_offset_minutes: i32) {
    use tracing_subscriber::{prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let timer = LogTimer::new(utc_offset_minutes);

    let path = Path::new(log_file);
    let directory = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let file_appender = tracing_appender::rolling::never(
        directory,
        path.file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("edgeclaim.log")),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(log_layer(timer, std::io::stdout, true))
        .with(log_layer(timer, file_appender, false))
        .init();
}

/// Collects formatted log lines in memory.
#[cfg(test)]
pub(crate) fn capture_logs(f: impl FnOnce()) -> String {
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::prelude::*;

    #[derive(Clone)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Sink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let buf = Arc::new(Mutex::new(Vec::new()));
    let sink = Sink(buf.clone());
    let subscriber =
        tracing_subscriber::registry().with(log_layer(LogTimer::new(420), move || sink.clone(), false));
    tracing::subscriber::with_default(subscriber, f);

    let bytes = buf.lock().unwrap().clone();
    String::from_utf8(bytes).unwrap()
}
