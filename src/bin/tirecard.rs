//! Tire product card renderer CLI
//!
//! Processes task descriptors from the tasks directory and writes finished
//! cards and result records.

#[cfg(feature = "cli")]
use tirecard::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
