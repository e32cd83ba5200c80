//! Per-wallet claim workflow.
//!
//! Lookup → (register if unknown) → eligibility check → ordered claim steps.
//! The remote wallet record is the only source of truth for eligibility; nothing
//! is cached between cycles.

use crate::api::{EdgeApiClient, WalletInfo};
use crate::utils::{ClaimsConfig, Clock};
use crate::wallet::WalletSigner;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// One remote claim action. The configured list decides which run and in what order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStep {
    DailyPoints,
    StartNode,
    SubmitProof,
    ProofSubmissionTask,
    LightNodeTask,
}

impl ClaimStep {
    pub const ALL: [ClaimStep; 5] = [
        ClaimStep::DailyPoints,
        ClaimStep::StartNode,
        ClaimStep::SubmitProof,
        ClaimStep::ProofSubmissionTask,
        ClaimStep::LightNodeTask,
    ];

    pub fn default_sequence() -> Vec<Self> {
        Self::ALL.to_vec()
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClaimStep::DailyPoints => "daily_points",
            ClaimStep::StartNode => "start_node",
            ClaimStep::SubmitProof => "submit_proof",
            ClaimStep::ProofSubmissionTask => "proof_submission_task",
            ClaimStep::LightNodeTask => "light_node_task",
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            ClaimStep::DailyPoints => "claim daily points",
            ClaimStep::StartNode => "start node",
            ClaimStep::SubmitProof => "submit proof",
            ClaimStep::ProofSubmissionTask => "claim proof submission points",
            ClaimStep::LightNodeTask => "claim light node points",
        }
    }
}

impl fmt::Display for ClaimStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What happened to one wallet in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum WalletOutcome {
    NoReferralCode,
    InvalidReferral {
        code: String,
    },
    RegistrationFailed,
    NotEligible {
        node_points: f64,
        last_claimed: Option<DateTime<Utc>>,
        next_claim_at: Option<DateTime<Utc>>,
    },
    Claimed {
        succeeded: Vec<ClaimStep>,
        failed: Vec<ClaimStep>,
    },
}

/// True once `interval` has passed since the last claim. Never claimed → true.
pub fn is_eligible(
    last_claimed: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    interval: chrono::Duration,
) -> bool {
    match last_claimed {
        None => true,
        Some(last) => now.signed_duration_since(last) >= interval,
    }
}

pub struct ClaimWorkflow {
    api: EdgeApiClient,
    steps: Vec<ClaimStep>,
    step_delay: Duration,
    claim_interval: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl ClaimWorkflow {
    pub fn new(api: EdgeApiClient, claims: &ClaimsConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            api,
            steps: claims.steps.clone(),
            step_delay: claims.step_delay(),
            claim_interval: claims.claim_interval(),
            clock,
        }
    }

    pub fn steps(&self) -> &[ClaimStep] {
        &self.steps
    }

    /// Run the whole state machine for one wallet. Only lookup failures propagate;
    /// registration and claim-step failures are logged and folded into the outcome.
    pub async fn process_wallet(
        &self,
        signer: &WalletSigner,
        referral_code: Option<&str>,
    ) -> Result<WalletOutcome> {
        let address = signer.address();

        let info = match self.api.wallet_details(address).await? {
            Some(info) => info,
            None => {
                warn!("🚨 Wallet {} not registered. Registering now...", address);
                match self.register(address, referral_code).await? {
                    Ok(info) => info,
                    Err(outcome) => return Ok(outcome),
                }
            }
        };

        self.log_wallet_state(&info);

        let now = self.clock.now();
        if !is_eligible(info.last_claimed, now, self.claim_interval) {
            let next_claim_at = info.last_claimed.map(|last| last + self.claim_interval);
            if let Some(next) = next_claim_at {
                info!(
                    "⏳ {} not eligible yet, next claim after {}",
                    address,
                    next.format("%d/%m/%Y %H:%M:%S")
                );
            }
            return Ok(WalletOutcome::NotEligible {
                node_points: info.node_points,
                last_claimed: info.last_claimed,
                next_claim_at,
            });
        }

        Ok(self.run_claim_sequence(signer).await)
    }

    /// `Ok(Ok(info))` once registered, `Ok(Err(outcome))` when this wallet is done for the cycle.
    async fn register(
        &self,
        address: &str,
        referral_code: Option<&str>,
    ) -> Result<Result<WalletInfo, WalletOutcome>> {
        let Some(code) = referral_code else {
            warn!("⚠️ No referral codes available, cannot register {}", address);
            return Ok(Err(WalletOutcome::NoReferralCode));
        };

        if !self.api.verify_referral_code(code).await {
            warn!("🚨 Invite code {} is invalid.", code);
            return Ok(Err(WalletOutcome::InvalidReferral {
                code: code.to_string(),
            }));
        }

        match self.api.register_wallet(code, address).await {
            Ok(_) => info!("✅ Wallet {} registered successfully.", address),
            Err(e) => error!("🚨 Failed to register wallet: {}, {}", address, e),
        }

        match self.api.wallet_details(address).await? {
            Some(info) => Ok(Ok(info)),
            None => {
                error!("🚨 Failed execution for {}", address);
                Ok(Err(WalletOutcome::RegistrationFailed))
            }
        }
    }

    fn log_wallet_state(&self, info: &WalletInfo) {
        info!("Wallet Address: {}", info.wallet_address);
        info!("Node Points: {}", info.node_points);
        match info.last_claimed {
            Some(last) => info!("Last Claim Point: {}", last.format("%d/%m/%Y %H:%M:%S")),
            None => info!("Last Claim Point: never"),
        }
    }

    async fn run_claim_sequence(&self, signer: &WalletSigner) -> WalletOutcome {
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();

        for (idx, step) in self.steps.iter().enumerate() {
            if idx > 0 && !self.step_delay.is_zero() {
                self.clock.sleep(self.step_delay).await;
            }

            match self.run_step(*step, signer).await {
                Ok(_) => {
                    info!("✅ {} done for {}", step.describe(), signer.address());
                    succeeded.push(*step);
                }
                Err(e) => {
                    error!(
                        "🚨 Failed to {} for {}: {:#}",
                        step.describe(),
                        signer.address(),
                        e
                    );
                    failed.push(*step);
                }
            }
        }

        WalletOutcome::Claimed { succeeded, failed }
    }

    async fn run_step(&self, step: ClaimStep, signer: &WalletSigner) -> Result<Value> {
        match step {
            ClaimStep::DailyPoints => self.api.claim_node_points(signer).await,
            ClaimStep::StartNode => self.api.start_node(signer).await,
            ClaimStep::SubmitProof => self.api.submit_proof(signer).await,
            ClaimStep::ProofSubmissionTask => self.api.claim_proof_submission_points(signer).await,
            ClaimStep::LightNodeTask => self.api.claim_light_node_points(signer).await,
        }
    }
}
