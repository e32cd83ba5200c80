use anyhow::Result;
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    println!("🚀 EdgeClaim - LayerEdge light-node point claimer");
    println!("📖 Version: {}", env!("CARGO_PKG_VERSION"));
    println!();

    if let Err(e) = edgeclaim::run().await {
        error!("💥 Fatal error: {:?}", e);
        eprintln!("💥 Fatal error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
