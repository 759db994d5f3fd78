//! # Certificate Controller
//!
//! Watches `Certificate` resources and keeps a valid self-signed certificate
//! in the Secret each one names.
//!
//! See `certificate_controller::runtime` for the startup sequence.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    certificate_controller::runtime::run().await
}
