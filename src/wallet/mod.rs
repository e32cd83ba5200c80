//! Wallet key handling and the signed attestations the API expects.
//!
//! Every message template here is part of the remote contract. The server
//! recovers the signer from the exact bytes, so a single changed character
//! makes the claim fail verification.

use alloy::primitives::Address;
use alloy::signers::{local::PrivateKeySigner, SignerSync};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::fmt;

/// One entry of the wallet list file.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    pub private_key: String,
}

impl fmt::Debug for WalletRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletRecord")
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Which action a signed message authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttestationKind {
    DailyPoints,
    NodeStart,
    Proof,
    ProofSubmissionTask,
    LightNodeTask,
}

impl AttestationKind {
    pub fn message(&self, address: &str, at: DateTime<Utc>) -> String {
        let ms = at.timestamp_millis();
        match self {
            AttestationKind::DailyPoints => {
                format!("I am claiming my daily node point for {} at {}", address, ms)
            }
            AttestationKind::NodeStart => {
                format!("Node activation request for {} at {}", address, ms)
            }
            AttestationKind::Proof => format!(
                "I am submitting a proof for LayerEdge at {}",
                iso_timestamp(at)
            ),
            AttestationKind::ProofSubmissionTask => format!(
                "I am claiming my proof submission node points for {} at {}",
                address, ms
            ),
            AttestationKind::LightNodeTask => format!(
                "I am claiming my light node run task node points for {} at {}",
                address, ms
            ),
        }
    }
}

/// `2025-02-14T20:05:09.123Z`, millisecond precision.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedAttestation {
    pub address: String,
    pub message: String,
    pub signature: String,
    pub issued_at: DateTime<Utc>,
}

impl SignedAttestation {
    #[inline]
    pub fn timestamp_ms(&self) -> i64 {
        self.issued_at.timestamp_millis()
    }

    #[inline]
    pub fn iso_timestamp(&self) -> String {
        iso_timestamp(self.issued_at)
    }
}

/// A wallet's key and the address derived from it.
#[derive(Clone)]
pub struct WalletSigner {
    signer: PrivateKeySigner,
    address: String,
}

impl WalletSigner {
    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let key = private_key.trim();
        let key = key.strip_prefix("0x").unwrap_or(key);

        let signer: PrivateKeySigner = key.parse().context("Failed to parse private key")?;
        let address = signer.address().to_checksum(None);

        Ok(Self { signer, address })
    }

    /// EIP-55 checksummed address.
    #[inline]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[inline]
    pub fn raw_address(&self) -> Address {
        self.signer.address()
    }

    /// EIP-191 personal signature, 0x-prefixed `r || s || v` hex.
    pub fn sign(&self, message: &str) -> Result<String> {
        let signature = self
            .signer
            .sign_message_sync(message.as_bytes())
            .context("Failed to sign message")?;
        Ok(format!("0x{}", hex::encode(signature.as_bytes())))
    }

    pub fn attest(&self, kind: AttestationKind, at: DateTime<Utc>) -> Result<SignedAttestation> {
        let message = kind.message(&self.address, at);
        let signature = self.sign(&message)?;

        Ok(SignedAttestation {
            address: self.address.clone(),
            message,
            signature,
            issued_at: at,
        })
    }
}

impl fmt::Debug for WalletSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Address of `private_key` without keeping the signer around.
pub fn derive_address(private_key: &str) -> Result<String> {
    Ok(WalletSigner::from_private_key(private_key)?.address)
}
