//! bgbatch binary entry point

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    bgbatch::cli::main().await
}
