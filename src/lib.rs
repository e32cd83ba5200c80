pub mod api;
pub mod dispatcher;
pub mod error;
pub mod proxy;
pub mod scheduler;
pub mod utils;
pub mod wallet;
pub mod workflow;

pub use api::{EdgeApiClient, WalletInfo};
pub use dispatcher::{ApiRequest, ApiResponse, Dispatcher, DispatcherConfig, ReqwestTransport, Transport};
pub use error::{ProxyError, RequestError, TransportError};
pub use proxy::{ProxyDescriptor, ProxyPool, ProxySource};
pub use scheduler::{CycleReport, CycleScheduler, JsonFileSource, WalletSource};
pub use utils::{setup_tracing, Clock, Config, SystemClock};
pub use wallet::{AttestationKind, SignedAttestation, WalletRecord, WalletSigner};
pub use workflow::{is_eligible, ClaimStep, ClaimWorkflow, WalletOutcome};

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Wire the production pieces together from `config`.
pub fn build_scheduler(config: &Config) -> Result<CycleScheduler> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let dispatcher_config = DispatcherConfig::from(&config.dispatch);
    let transport = ReqwestTransport::new(dispatcher_config.timeout, dispatcher::DEFAULT_HEADERS)
        .context("Failed to build HTTP transport")?;

    let proxies = match config.proxy_file() {
        Some(path) => ProxySource::File(path.to_path_buf()),
        None => ProxySource::None,
    };

    let dispatcher = Dispatcher::new(Arc::new(transport), proxies, clock.clone(), dispatcher_config);
    let api = EdgeApiClient::new(dispatcher, &config.server, clock.clone());
    let workflow = ClaimWorkflow::new(api, &config.claims, clock.clone());
    let source = Arc::new(JsonFileSource::from_config(&config.files));

    Ok(CycleScheduler::new(workflow, source, clock, &config.schedule))
}

fn log_startup(config: &Config) {
    info!("🚀 EdgeClaim starting");
    info!("✅ Configuration loaded successfully");
    info!("🔗 API: {}", config.server.api_base_url);
    info!(
        "📋 Claim steps: {}",
        config
            .claims
            .steps
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(" → ")
    );
    match config.proxy_file() {
        Some(path) => info!("🌐 Proxy list: {}", path.display()),
        None => info!("🌐 Proxies disabled, using direct connections"),
    }
}

pub async fn run() -> Result<()> {
    let config = Config::load()?;

    utils::setup_tracing(
        &config.monitoring.log_level,
        &config.monitoring.log_file,
        config.monitoring.utc_offset_minutes,
    );

    log_startup(&config);

    let mut scheduler = build_scheduler(&config)?;

    tokio::select! {
        _ = scheduler.run_forever() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Shutting down gracefully...");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_reports_loaded_config() {
        let config = Config::load_from(None).unwrap();
        let logged = utils::capture_logs(|| log_startup(&config));

        assert!(logged.contains("Configuration loaded successfully"));
        assert!(logged.contains("https://referralapi.layeredge.io/api"));
        assert!(logged.contains("daily_points"));
    }
}
