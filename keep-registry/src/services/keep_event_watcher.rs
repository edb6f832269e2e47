//! Keep Event Watcher
//!
//! This module provides [`keep_event_watcher_task`], a task that can be spawned by signer nodes to
//! react to keep events of a [`KeepChain`](crate::chain::KeepChain).
//!
//! The watcher subscribes to keep creations. For every created keep, it subscribes to the signature
//! requests of that keep before handing the creation to the [`KeepEventHandler`]. Therefore, every
//! signature request published after the handler observed the keep is delivered as well.
//!
//! Handler invocations run on their own tasks and are bounded by a timeout. A failing handler is
//! logged and counted but never stops the watcher.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use eyre::Context as _;
use keep_types::{Digest, KeepAddress};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument as _, instrument};

use crate::{
    chain::KeepChainService,
    metrics::{METRICS_ID_WATCHER_EVENTS, METRICS_ID_WATCHER_HANDLER_ERROR},
    services::event_bus::Subscription,
};


/// Dynamic trait object for a keep event handler.
pub type KeepEventHandlerService = Arc<dyn KeepEventHandler + Send + Sync>;

/// The reaction of a signer node to keep events.
///
/// Typically, a keep creation triggers the key generation and a signature request triggers the
/// threshold signing. Both submit their results through the [`KeepChain`](crate::chain::KeepChain).
#[async_trait]
pub trait KeepEventHandler {
    /// Called once for every keep created after the watcher started.
    async fn on_keep_created(&self, keep_address: KeepAddress) -> eyre::Result<()>;

    /// Called for every signature requested from a keep the watcher observed.
    async fn on_signature_requested(
        &self,
        keep_address: KeepAddress,
        digest: Digest,
    ) -> eyre::Result<()>;
}

/// The arguments to start the keep-event-watcher.
pub struct KeepEventWatcherTaskArgs {
    /// The chain to watch.
    pub chain: KeepChainService,
    /// Receives the events.
    pub handler: KeepEventHandlerService,
    /// Max time a single handler invocation may take.
    pub handler_timeout: Duration,
    /// Set to `true` as soon as the watcher is subscribed.
    pub started: Arc<AtomicBool>,
    /// Stops the watcher. Cancelled by the watcher when it stops.
    pub cancellation_token: CancellationToken,
}

/// Events forwarded from the subscription callbacks to the watcher loop.
#[derive(Debug, Clone, Copy)]
enum WatchedEvent {
    KeepCreated(KeepAddress),
    SignatureRequested(KeepAddress, Digest),
}

/// Background task that subscribes to keep events and hands them to the [`KeepEventHandler`].
///
/// Returns when the cancellation token is cancelled or the watcher encounters an error.
pub async fn keep_event_watcher_task(args: KeepEventWatcherTaskArgs) -> eyre::Result<()> {
    // shutdown service if event watcher encounters an error and drops this guard
    let cancellation_token = args.cancellation_token.clone();
    let _drop_guard = cancellation_token.drop_guard_ref();
    tracing::info!("start handling keep events");
    match handle_events(args).await {
        Ok(_) => tracing::info!("stopped keep event watcher"),
        Err(err) => tracing::error!("keep event watcher encountered an error: {err:?}"),
    }
    Ok(())
}

async fn handle_events(args: KeepEventWatcherTaskArgs) -> eyre::Result<()> {
    let KeepEventWatcherTaskArgs {
        chain,
        handler,
        handler_timeout,
        started,
        cancellation_token,
    } = args;
    let (events_tx, mut events) = mpsc::unbounded_channel();

    let _keep_created = chain
        .on_keep_created(Box::new({
            let events_tx = events_tx.clone();
            move |event| {
                let _ = events_tx.send(WatchedEvent::KeepCreated(event.keep_address));
            }
        }))
        .await
        .context("while subscribing to keep creation")?;
    // dropping the subscriptions at the end of this function unsubscribes them
    let mut signature_requests = HashMap::<KeepAddress, Subscription>::new();

    tracing::info!("keep event watcher is ready");
    started.store(true, Ordering::Relaxed);
    loop {
        let event = tokio::select! {
            event = events.recv() => {
                event.ok_or_else(|| eyre::eyre!("keep event channel was closed"))?
            }
            _ = cancellation_token.cancelled() => {
                break;
            }
        };
        ::metrics::counter!(METRICS_ID_WATCHER_EVENTS).increment(1);
        if let WatchedEvent::KeepCreated(keep_address) = event {
            let subscription = subscribe_signature_requests(&chain, keep_address, &events_tx)
                .await
                .context("while subscribing to signature requests")?;
            signature_requests.insert(keep_address, subscription);
        }
        spawn_handler(Arc::clone(&handler), event, handler_timeout);
    }
    tracing::info!("unsubscribing from {} keeps", signature_requests.len());
    Ok(())
}

#[instrument(level = "debug", skip_all, fields(keep = %keep_address))]
async fn subscribe_signature_requests(
    chain: &KeepChainService,
    keep_address: KeepAddress,
    events_tx: &mpsc::UnboundedSender<WatchedEvent>,
) -> eyre::Result<Subscription> {
    tracing::debug!("subscribing to signature requests");
    let events_tx = events_tx.clone();
    Ok(chain
        .on_signature_requested(
            keep_address,
            Box::new(move |event| {
                let _ = events_tx.send(WatchedEvent::SignatureRequested(
                    keep_address,
                    event.digest,
                ));
            }),
        )
        .await?)
}

/// Spawns the handler invocation for `event`, bounded by `handler_timeout`.
fn spawn_handler(handler: KeepEventHandlerService, event: WatchedEvent, handler_timeout: Duration) {
    let span = match event {
        WatchedEvent::KeepCreated(keep_address) => {
            tracing::info_span!("keep_created", keep = %keep_address)
        }
        WatchedEvent::SignatureRequested(keep_address, digest) => {
            tracing::info_span!("signature_requested", keep = %keep_address, digest = %digest)
        }
    };
    tokio::spawn(
        async move {
            let result = tokio::time::timeout(handler_timeout, async {
                match event {
                    WatchedEvent::KeepCreated(keep_address) => {
                        handler.on_keep_created(keep_address).await
                    }
                    WatchedEvent::SignatureRequested(keep_address, digest) => {
                        handler.on_signature_requested(keep_address, digest).await
                    }
                }
            })
            .await;
            match result {
                Ok(Ok(())) => tracing::debug!("handled event"),
                Ok(Err(err)) => {
                    ::metrics::counter!(METRICS_ID_WATCHER_HANDLER_ERROR).increment(1);
                    tracing::error!("handler failed: {err:?}");
                }
                Err(_) => {
                    ::metrics::counter!(METRICS_ID_WATCHER_HANDLER_ERROR).increment(1);
                    tracing::error!("handler timed out after {handler_timeout:?}");
                }
            }
        }
        .instrument(span),
    );
}
