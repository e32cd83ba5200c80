use crate::dispatcher::{ApiRequest, Dispatcher};
use crate::error::RequestError;
use crate::utils::{Clock, ServerConfig};
use crate::wallet::{AttestationKind, SignedAttestation, WalletSigner};
use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Server-side record of a registered wallet.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletInfo {
    #[serde(default)]
    pub wallet_address: String,
    #[serde(default)]
    pub node_points: f64,
    #[serde(default, deserialize_with = "deserialize_last_claimed")]
    pub last_claimed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
struct WalletDetailsResponse {
    data: WalletInfo,
}

// lastClaimed arrives as an ISO string, epoch millis, or null
fn deserialize_last_claimed<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok(),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    })
}

/// One method per remote endpoint. Every mutating call signs a fresh attestation
/// with the signer of the wallet it acts on.
pub struct EdgeApiClient {
    dispatcher: Dispatcher,
    api_base_url: String,
    dashboard_url: String,
    clock: Arc<dyn Clock>,
}

impl EdgeApiClient {
    pub fn new(dispatcher: Dispatcher, server: &ServerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            dispatcher,
            api_base_url: server.api_base_url.trim_end_matches('/').to_string(),
            dashboard_url: server.dashboard_url.trim_end_matches('/').to_string(),
            clock,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }

    /// `None` when the wallet is not registered (HTTP 404).
    pub async fn wallet_details(&self, address: &str) -> Result<Option<WalletInfo>> {
        let url = self.api_url(&format!("/referral/wallet-details/{}", address));

        match self.dispatcher.dispatch(ApiRequest::get(url)).await {
            Ok(response) => {
                let details: WalletDetailsResponse = serde_json::from_value(response.body)
                    .context("Malformed wallet-details response")?;
                Ok(Some(details.data))
            }
            Err(e) if e.is_not_found() => {
                debug!("Wallet {} not found", address);
                Ok(None)
            }
            Err(e) => Err(e).context(format!("Failed to look up wallet {}", address)),
        }
    }

    /// Any failure counts as an invalid code.
    pub async fn verify_referral_code(&self, code: &str) -> bool {
        let request = ApiRequest::post(
            self.api_url("/referral/verify-referral-code"),
            json!({ "invite_code": code }),
        );

        match self.dispatcher.dispatch(request).await {
            Ok(response) => response.body["data"]["valid"].as_bool().unwrap_or(false),
            Err(e) => {
                warn!("⚠️ Referral code check for {} failed: {}", code, e);
                false
            }
        }
    }

    pub async fn register_wallet(&self, code: &str, address: &str) -> Result<Value, RequestError> {
        let url = self.api_url(&format!(
            "/referral/register-wallet/{}",
            urlencoding::encode(code)
        ));
        let request = ApiRequest::post(url, json!({ "walletAddress": address }));
        Ok(self.dispatcher.dispatch(request).await?.body)
    }

    fn attest(&self, signer: &WalletSigner, kind: AttestationKind) -> Result<SignedAttestation> {
        signer.attest(kind, self.clock.now())
    }

    pub async fn claim_node_points(&self, signer: &WalletSigner) -> Result<Value> {
        let att = self.attest(signer, AttestationKind::DailyPoints)?;
        let request = ApiRequest::post(
            self.api_url("/light-node/claim-node-points"),
            json!({
                "walletAddress": att.address,
                "timestamp": att.timestamp_ms(),
                "sign": att.signature,
            }),
        );
        Ok(self.dispatcher.dispatch(request).await?.body)
    }

    pub async fn start_node(&self, signer: &WalletSigner) -> Result<Value> {
        let att = self.attest(signer, AttestationKind::NodeStart)?;
        let request = ApiRequest::post(
            self.api_url(&format!("/light-node/node-action/{}/start", att.address)),
            json!({
                "timestamp": att.timestamp_ms(),
                "sign": att.signature,
            }),
        );
        Ok(self.dispatcher.dispatch(request).await?.body)
    }

    pub async fn submit_proof(&self, signer: &WalletSigner) -> Result<Value> {
        let att = self.attest(signer, AttestationKind::Proof)?;
        let request = ApiRequest::post(
            format!("{}/api/send-proof", self.dashboard_url),
            json!({
                "address": att.address,
                "message": att.message,
                "proof": format!("GmEdgesss {}", att.iso_timestamp()),
                "signature": att.signature,
            }),
        );
        Ok(self.dispatcher.dispatch(request).await?.body)
    }

    pub async fn claim_proof_submission_points(&self, signer: &WalletSigner) -> Result<Value> {
        let att = self.attest(signer, AttestationKind::ProofSubmissionTask)?;
        self.task_claim("/task/proof-submission", &att).await
    }

    pub async fn claim_light_node_points(&self, signer: &WalletSigner) -> Result<Value> {
        let att = self.attest(signer, AttestationKind::LightNodeTask)?;
        self.task_claim("/task/node-points", &att).await
    }

    async fn task_claim(&self, path: &str, att: &SignedAttestation) -> Result<Value> {
        let request = ApiRequest::post(
            self.api_url(path),
            json!({
                "walletAddress": att.address,
                "timestamp": att.timestamp_ms(),
                "sign": att.signature,
            }),
        );
        Ok(self.dispatcher.dispatch(request).await?.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_info_iso_timestamp() {
        let body = json!({
            "data": {
                "walletAddress": "0xabc",
                "nodePoints": 1500,
                "lastClaimed": "2025-02-14T20:05:09.123Z"
            }
        });
        let parsed: WalletDetailsResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.data.wallet_address, "0xabc");
        assert_eq!(parsed.data.node_points, 1500.0);
        assert_eq!(
            parsed.data.last_claimed.unwrap().timestamp_millis(),
            1_739_563_509_123
        );
    }

    #[test]
    fn test_wallet_info_missing_or_null_last_claimed() {
        let parsed: WalletDetailsResponse =
            serde_json::from_value(json!({"data": {"walletAddress": "0xabc", "nodePoints": 0}}))
                .unwrap();
        assert!(parsed.data.last_claimed.is_none());

        let parsed: WalletDetailsResponse = serde_json::from_value(
            json!({"data": {"walletAddress": "0xabc", "lastClaimed": null}}),
        )
        .unwrap();
        assert!(parsed.data.last_claimed.is_none());
    }

    #[test]
    fn test_wallet_info_epoch_millis() {
        let parsed: WalletDetailsResponse = serde_json::from_value(
            json!({"data": {"walletAddress": "0xabc", "lastClaimed": 1_700_000_000_000i64}}),
        )
        .unwrap();
        assert_eq!(
            parsed.data.last_claimed.unwrap().timestamp_millis(),
            1_700_000_000_000
        );
    }
}
