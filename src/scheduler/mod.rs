use crate::utils::{Clock, FilesConfig, ScheduleConfig};
use crate::wallet::{WalletRecord, WalletSigner};
use crate::workflow::{ClaimWorkflow, WalletOutcome};
use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Supplies the wallet list and referral-code pool at the start of every cycle.
pub trait WalletSource: Send + Sync {
    fn load_wallets(&self) -> Result<Vec<WalletRecord>>;

    fn load_referral_codes(&self) -> Result<Vec<String>>;
}

/// `wallets.json` / `reffCodes.json`. A missing file is an empty list.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    wallets: PathBuf,
    referral_codes: PathBuf,
}

impl JsonFileSource {
    pub fn new(wallets: impl Into<PathBuf>, referral_codes: impl Into<PathBuf>) -> Self {
        Self {
            wallets: wallets.into(),
            referral_codes: referral_codes.into(),
        }
    }

    pub fn from_config(files: &FilesConfig) -> Self {
        Self::new(&files.wallets, &files.referral_codes)
    }

    fn read_list<T: DeserializeOwned>(path: &Path, what: &str) -> Result<Vec<T>> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No {} found in {}", what, path.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

impl WalletSource for JsonFileSource {
    fn load_wallets(&self) -> Result<Vec<WalletRecord>> {
        Self::read_list(&self.wallets, "wallets")
    }

    fn load_referral_codes(&self) -> Result<Vec<String>> {
        Self::read_list(&self.referral_codes, "referral codes")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub wallets: usize,
    pub claimed: usize,
    pub not_eligible: usize,
    pub unregistered: usize,
    pub failed: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: &WalletOutcome) {
        match outcome {
            WalletOutcome::Claimed { .. } => self.claimed += 1,
            WalletOutcome::NotEligible { .. } => self.not_eligible += 1,
            WalletOutcome::NoReferralCode
            | WalletOutcome::InvalidReferral { .. }
            | WalletOutcome::RegistrationFailed => self.unregistered += 1,
        }
    }
}

impl std::fmt::Display for CycleReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cycle #{} | {} wallets | {} claimed | {} waiting | {} unregistered | {} failed",
            self.cycle, self.wallets, self.claimed, self.not_eligible, self.unregistered, self.failed
        )
    }
}

/// Runs every wallet once per cycle, then sleeps. Never exits on error.
pub struct CycleScheduler {
    workflow: ClaimWorkflow,
    source: Arc<dyn WalletSource>,
    clock: Arc<dyn Clock>,
    cycle_interval: Duration,
    wallet_delay: Duration,
    cycle: u64,
}

impl CycleScheduler {
    pub fn new(
        workflow: ClaimWorkflow,
        source: Arc<dyn WalletSource>,
        clock: Arc<dyn Clock>,
        schedule: &ScheduleConfig,
    ) -> Self {
        Self {
            workflow,
            source,
            clock,
            cycle_interval: schedule.cycle_interval(),
            wallet_delay: schedule.wallet_delay(),
            cycle: 0,
        }
    }

    /// One pass over the wallet list. Per-wallet failures are counted, not returned.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        self.cycle += 1;
        info!("🚀 Starting new processing cycle #{}", self.cycle);

        let wallets = self
            .source
            .load_wallets()
            .context("Failed to load wallet list")?;
        let codes = self
            .source
            .load_referral_codes()
            .context("Failed to load referral codes")?;

        if codes.is_empty() {
            warn!("⚠️ Referral code pool is empty, unregistered wallets will be skipped");
        }

        let mut report = CycleReport {
            cycle: self.cycle,
            wallets: wallets.len(),
            ..Default::default()
        };

        for (idx, record) in wallets.iter().enumerate() {
            let code = codes.choose(&mut rand::thread_rng()).map(String::as_str);

            match WalletSigner::from_private_key(&record.private_key) {
                Ok(signer) => {
                    info!("[{}] Processing {}", idx + 1, signer.address());
                    match self.workflow.process_wallet(&signer, code).await {
                        Ok(outcome) => report.record(&outcome),
                        Err(e) => {
                            error!("🚨 Error processing wallet {}: {:#}", signer.address(), e);
                            report.failed += 1;
                        }
                    }
                }
                Err(e) => {
                    error!("🚨 Wallet #{} has an unusable private key: {}", idx + 1, e);
                    report.failed += 1;
                }
            }

            self.clock.sleep(self.wallet_delay).await;
        }

        info!("📊 {}", report);
        Ok(report)
    }

    /// A cycle followed by its sleep. `None` when the cycle itself failed.
    pub async fn tick(&mut self) -> Option<CycleReport> {
        let hours = self.cycle_interval.as_secs_f64() / 3600.0;

        let report = match self.run_cycle().await {
            Ok(report) => {
                info!(
                    "✅ Cycle completed. Waiting {} hours before next cycle...",
                    hours
                );
                Some(report)
            }
            Err(e) => {
                error!("🚨 Cycle error: {:#}. Retrying in {} hours...", e, hours);
                None
            }
        };

        self.clock.sleep(self.cycle_interval).await;
        report
    }

    pub async fn run_cycles(&mut self, count: usize) -> Vec<Option<CycleReport>> {
        let mut reports = Vec::with_capacity(count);
        for _ in 0..count {
            reports.push(self.tick().await);
        }
        reports
    }

    pub async fn run_forever(&mut self) {
        loop {
            self.tick().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_files_are_empty_lists() {
        let source = JsonFileSource::new("/nope/wallets.json", "/nope/reffCodes.json");
        assert!(source.load_wallets().unwrap().is_empty());
        assert!(source.load_referral_codes().unwrap().is_empty());
    }

    #[test]
    fn test_reads_wallets_and_codes() {
        let dir = tempfile::tempdir().unwrap();
        let wallets = dir.path().join("wallets.json");
        let codes = dir.path().join("reffCodes.json");

        let mut f = std::fs::File::create(&wallets).unwrap();
        write!(f, r#"[{{"privateKey": "0xabc"}}, {{"privateKey": "0xdef"}}]"#).unwrap();
        let mut f = std::fs::File::create(&codes).unwrap();
        write!(f, r#"["CODE1", "CODE2", "CODE3"]"#).unwrap();

        let source = JsonFileSource::new(&wallets, &codes);
        let loaded = source.load_wallets().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].private_key, "0xdef");
        assert_eq!(source.load_referral_codes().unwrap(), vec!["CODE1", "CODE2", "CODE3"]);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let source = JsonFileSource::new(file.path(), "/nope/reffCodes.json");
        let err = source.load_wallets().unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_report_counts_outcomes() {
        let mut report = CycleReport::default();
        report.record(&WalletOutcome::Claimed {
            succeeded: vec![],
            failed: vec![],
        });
        report.record(&WalletOutcome::RegistrationFailed);
        report.record(&WalletOutcome::InvalidReferral { code: "X".into() });
        report.record(&WalletOutcome::NotEligible {
            node_points: 0.0,
            last_claimed: None,
            next_claim_at: None,
        });
        assert_eq!(report.claimed, 1);
        assert_eq!(report.unregistered, 2);
        assert_eq!(report.not_eligible, 1);
    }
}
