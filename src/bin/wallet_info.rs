//! Wallet inspection tool
//!
//! Prints the address derived from every configured private key and a sample
//! signed attestation, without talking to the API.

use anyhow::Result;
use chrono::Utc;
use edgeclaim::{AttestationKind, Config, JsonFileSource, WalletSigner, WalletSource};

fn main() -> Result<()> {
    println!("╔═══════════════════════════════════════════════════════════════╗");
    println!("║  🔍 WALLET INFO                                               ║");
    println!("╚═══════════════════════════════════════════════════════════════╝");
    println!();

    tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_target(false)
        .compact()
        .init();

    let config = Config::load()?;
    let source = JsonFileSource::from_config(&config.files);

    let wallets = source.load_wallets()?;
    let codes = source.load_referral_codes()?;

    println!("📋 Configuration Check:");
    println!("   Wallet file:    {} ({} entries)", config.files.wallets.display(), wallets.len());
    println!("   Referral codes: {} ({} entries)", config.files.referral_codes.display(), codes.len());
    println!("   Claim steps:    {:?}", config.claims.steps);
    println!();

    let now = Utc::now();
    for (idx, record) in wallets.iter().enumerate() {
        match WalletSigner::from_private_key(&record.private_key) {
            Ok(signer) => {
                println!("[{}] {}", idx + 1, signer.address());
                let sample = signer.attest(AttestationKind::DailyPoints, now)?;
                println!("    message:   {}", sample.message);
                println!("    signature: {}", sample.signature);
            }
            Err(e) => {
                println!("[{}] ❌ unusable private key: {}", idx + 1, e);
            }
        }
    }

    if wallets.is_empty() {
        println!("⚠️  No wallets configured");
    }

    Ok(())
}
