//! bgremove-watch CLI tool
//!
//! Watches a drop folder and sends every new image to a background removal API.

#[cfg(feature = "cli")]
use bgremove_watch::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
