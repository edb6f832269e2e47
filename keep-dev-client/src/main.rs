//! Keep Dev Client
//!
//! Runs a keep event watcher with a [`DevSigner`](signer::DevSigner) against a [`LocalChain`],
//! creates keeps, requests signatures and checks that every requested digest ends up with a valid
//! signature on the chain.

use std::{
    future::Future,
    process::ExitCode,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use clap::Parser;
use eyre::Context as _;
use keep_registry::{
    chain::{KeepChain as _, KeepChainService, LocalChain},
    services::keep_event_watcher::{KeepEventWatcherTaskArgs, keep_event_watcher_task},
};
use keep_types::{Digest, KeepAddress, crypto::KeepPublicKey};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::{config::DevClientConfig, signer::DevSigner};

mod config;
mod signer;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

fn avg(durations: &[Duration]) -> Duration {
    let n = durations.len();
    if n != 0 {
        let total = durations.iter().sum::<Duration>();
        total / n as u32
    } else {
        Duration::ZERO
    }
}

/// Polls `poll` until it yields a value or `max_wait_time` elapsed.
async fn wait_for<T, F, Fut>(max_wait_time: Duration, mut poll: F) -> eyre::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = eyre::Result<Option<T>>>,
{
    tokio::time::timeout(max_wait_time, async {
        loop {
            if let Some(value) = poll().await? {
                return eyre::Ok(value);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    })
    .await
    .context("timed out")?
}

async fn create_keep(
    config: &DevClientConfig,
    chain: &LocalChain,
    keep_address: KeepAddress,
) -> eyre::Result<KeepPublicKey> {
    chain.create_keep(keep_address)?;
    wait_for(config.event_wait_timeout, || async move {
        eyre::Ok(chain.get_keep_public_key(keep_address).await?)
    })
    .await
    .context("while waiting for public key")
}

async fn request_signatures(
    config: &DevClientConfig,
    chain: &LocalChain,
    keep_address: KeepAddress,
    public_key: KeepPublicKey,
) -> eyre::Result<Vec<Duration>> {
    let mut durations = Vec::with_capacity(config.signature_requests);
    for _ in 0..config.signature_requests {
        let digest = Digest::from(rand::random::<[u8; 32]>());
        let start = Instant::now();
        chain.request_signature(keep_address, digest)?;
        let signatures = wait_for(config.event_wait_timeout, || async move {
            let signatures = chain.get_signatures(keep_address, digest).await?;
            eyre::Ok((!signatures.is_empty()).then_some(signatures))
        })
        .await
        .with_context(|| format!("while waiting for signature over {digest}"))?;
        durations.push(start.elapsed());
        for signature in signatures {
            if !signature.verify(&public_key, &digest)? {
                eyre::bail!("invalid signature {signature} for digest {digest}");
            }
        }
        tokio::time::sleep(config.request_interval).await;
    }
    Ok(durations)
}

async fn run(config: &DevClientConfig, chain: &LocalChain) -> eyre::Result<()> {
    let mut key_gen_durations = Vec::with_capacity(config.keeps);
    let mut signing_durations = Vec::with_capacity(config.keeps * config.signature_requests);
    for _ in 0..config.keeps {
        let keep_address = KeepAddress::from(rand::random::<[u8; 20]>());
        tracing::info!("creating keep {keep_address}");
        let start = Instant::now();
        let public_key = create_keep(config, chain, keep_address).await?;
        key_gen_durations.push(start.elapsed());
        tracing::info!("keep {keep_address} has public key {public_key}");

        signing_durations.extend(
            request_signatures(config, chain, keep_address, public_key)
                .await
                .with_context(|| format!("while requesting signatures from {keep_address}"))?,
        );
        tracing::info!(
            "got {} valid signatures from {keep_address}",
            config.signature_requests
        );
    }
    let key_gen_avg = avg(&key_gen_durations);
    let signing_avg = avg(&signing_durations);
    tracing::info!("key-gen avg: {key_gen_avg:?} signing avg: {signing_avg:?}");
    Ok(())
}

#[tokio::main]
async fn main() -> eyre::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("keep_dev_client=trace,keep_registry=debug,warn")),
        )
        .init();
    keep_registry::metrics::describe_metrics();

    let config = DevClientConfig::parse();
    tracing::info!("starting keep-dev-client with config: {config:#?}");
    // the local chain is a simulation
    config.node.environment.assert_is_dev();

    let local_chain = LocalChain::connect();
    let chain: KeepChainService = Arc::new(local_chain.clone());
    let cancellation_token = CancellationToken::new();
    let started = Arc::new(AtomicBool::new(false));
    let watcher = tokio::spawn(keep_event_watcher_task(KeepEventWatcherTaskArgs {
        chain: Arc::clone(&chain),
        handler: Arc::new(DevSigner::new(chain)),
        handler_timeout: config.node.event_handler_timeout,
        started: Arc::clone(&started),
        cancellation_token: cancellation_token.clone(),
    }));

    let result = async {
        let started = &started;
        wait_for(config.event_wait_timeout, || async move {
            eyre::Ok(started.load(Ordering::Relaxed).then_some(()))
        })
        .await
        .context("while waiting for keep event watcher")?;
        run(&config, &local_chain).await
    }
    .await;

    cancellation_token.cancel();
    let max_wait_time_shutdown = config.node.max_wait_time_shutdown;
    tracing::info!("waiting for shutdown of watcher (max wait time {max_wait_time_shutdown:?})..");
    let graceful = match tokio::time::timeout(max_wait_time_shutdown, watcher).await {
        Ok(_) => {
            tracing::info!("successfully finished shutdown in time");
            true
        }
        Err(_) => {
            tracing::warn!("could not finish shutdown in time");
            false
        }
    };

    match result {
        Ok(()) if graceful => {
            tracing::info!("dev run successful");
            Ok(ExitCode::SUCCESS)
        }
        Ok(()) => Ok(ExitCode::FAILURE),
        Err(err) => {
            tracing::error!("dev run failed: {err:?}");
            Ok(ExitCode::FAILURE)
        }
    }
}
