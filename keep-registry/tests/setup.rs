use std::time::Duration;

use keep_registry::chain::LocalChain;
use keep_types::KeepAddress;
use tokio::sync::mpsc;

pub(crate) const TEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Returns a fresh chain, no state is shared between tests.
pub(crate) fn initialize_local_chain() -> LocalChain {
    LocalChain::connect()
}

/// Creates the address `0x00..00{last}`.
pub(crate) fn keep_address(last: u8) -> KeepAddress {
    let mut raw = [0u8; 20];
    raw[19] = last;
    KeepAddress::from(raw)
}

/// Creates a callback that forwards into the returned channel.
pub(crate) fn event_fired<T: Send + 'static>()
-> (impl Fn(T) + Send + Sync + 'static, mpsc::UnboundedReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        move |event: T| {
            let _ = tx.send(event);
        },
        rx,
    )
}

/// Waits for the next event, bounded by [`TEST_TIMEOUT`].
pub(crate) async fn next_event<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> eyre::Result<T> {
    tokio::time::timeout(TEST_TIMEOUT, rx.recv())
        .await?
        .ok_or_else(|| eyre::eyre!("event channel closed"))
}

/// Asserts that no event arrives within a short grace period.
pub(crate) async fn no_event<T: std::fmt::Debug>(rx: &mut mpsc::UnboundedReceiver<T>) {
    tokio::time::sleep(Duration::from_millis(100)).await;
    if let Ok(event) = rx.try_recv() {
        panic!("unexpected event: {event:?}");
    }
}
