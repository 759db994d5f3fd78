//! # Runtime
//!
//! Process bootstrap and the kube-runtime watch loop.
//!
//! - `initialization`: crypto provider, logging, metrics server, Kubernetes client
//! - `watch_loop`: the `Controller` driving reconciliation
//! - `error_policy`: per-resource backoff after failed reconciliations

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

use anyhow::Result;

/// Initialize everything and run the watch loop until shutdown
pub async fn run() -> Result<()> {
    let init = initialization::initialize().await?;
    watch_loop::run_watch_loop(
        init.certificates,
        init.secrets,
        init.reconciler,
        init.server_state,
    )
    .await
}
