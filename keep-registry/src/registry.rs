//! The [`KeepRegistry`] is the only component external actors interact with.
//!
//! It composes the [`KeepStore`] with the [`EventBus`] and defines the lifecycle of a keep:
//!
//! ```text
//! Created ──submit_public_key──> PublicKeySet
//!    │                               │
//!    └──── request_signature / submit_signature (repeatable) ────┘
//! ```
//!
//! Every mutating operation first updates the store and then publishes the corresponding event.
//! Reads never publish.

use keep_types::{
    Digest, KeepAddress,
    crypto::{KeepPublicKey, Signature},
    events::{ECDSAKeepCreatedEvent, KeepEvent, SignatureRequestedEvent, Topic},
};
use tracing::instrument;

use crate::{
    metrics::METRICS_ID_REGISTRY_SIGNATURE_REQUESTS,
    services::{
        event_bus::{EventBus, Subscription},
        keep_store::{KeepStore, KeepStoreError},
    },
};

type Result<T> = std::result::Result<T, KeepStoreError>;

/// Registry of all keeps. Cloning yields another handle to the same registry.
///
/// Construct a fresh instance per run (or per test) instead of sharing global state.
#[derive(Default, Clone)]
pub struct KeepRegistry {
    store: KeepStore,
    event_bus: EventBus,
}

impl KeepRegistry {
    /// Creates a new registry over an empty store and a bus without subscribers.
    pub fn new() -> Self {
        Self::with_parts(KeepStore::new(), EventBus::new())
    }

    /// Creates a registry over the provided store and bus.
    pub fn with_parts(store: KeepStore, event_bus: EventBus) -> Self {
        Self { store, event_bus }
    }

    /// Returns a read handle of the underlying store.
    pub fn store(&self) -> &KeepStore {
        &self.store
    }

    /// Returns the underlying bus.
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Registers a new keep and notifies all `ECDSAKeepCreated` subscribers.
    ///
    /// # Errors
    ///
    /// Returns [`KeepStoreError::DuplicateKeep`] if the address is already registered. Nobody is notified in that case.
    #[instrument(level = "info", skip(self), fields(keep = %address))]
    pub fn create_keep(&self, address: KeepAddress) -> Result<()> {
        self.store.create_keep(address)?;
        let notified = self.event_bus.publish(
            KeepEvent::from(ECDSAKeepCreatedEvent {
                keep_address: address,
            }),
            None,
        );
        tracing::info!("created keep, notified {notified} subscribers");
        Ok(())
    }

    /// Notifies the subscribers of this keep that `digest` should be signed.
    ///
    /// Does not change the state of the keep.
    ///
    /// # Errors
    ///
    /// Returns [`KeepStoreError::UnknownKeep`] if the keep is not registered.
    #[instrument(level = "info", skip(self), fields(keep = %address, digest = %digest))]
    pub fn request_signature(&self, address: KeepAddress, digest: Digest) -> Result<()> {
        if !self.store.contains(address) {
            return Err(KeepStoreError::UnknownKeep(address));
        }
        let notified = self.event_bus.publish(
            KeepEvent::from(SignatureRequestedEvent { digest }),
            Some(address),
        );
        ::metrics::counter!(METRICS_ID_REGISTRY_SIGNATURE_REQUESTS).increment(1);
        tracing::info!("requested signature, notified {notified} subscribers");
        Ok(())
    }

    /// Stores the public key of a keep.
    ///
    /// # Errors
    ///
    /// Returns [`KeepStoreError::UnknownKeep`] if the keep is not registered and
    /// [`KeepStoreError::DuplicatePublicKey`] if a public key was already submitted.
    #[instrument(level = "info", skip(self, key), fields(keep = %address))]
    pub fn submit_public_key(&self, address: KeepAddress, key: KeepPublicKey) -> Result<()> {
        self.store.set_public_key(address, key)?;
        tracing::info!("submitted public key {key}");
        Ok(())
    }

    /// Appends a signature for `digest` to the keep.
    ///
    /// # Errors
    ///
    /// Returns [`KeepStoreError::UnknownKeep`] if the keep is not registered.
    #[instrument(level = "info", skip(self, signature), fields(keep = %address, digest = %digest))]
    pub fn submit_signature(
        &self,
        address: KeepAddress,
        digest: Digest,
        signature: Signature,
    ) -> Result<()> {
        self.store.append_signature(address, digest, signature)?;
        tracing::info!("submitted signature {signature}");
        Ok(())
    }

    /// Returns the public key of the keep, `None` if not submitted yet.
    ///
    /// # Errors
    ///
    /// Returns [`KeepStoreError::UnknownKeep`] if the keep is not registered.
    pub fn get_public_key(&self, address: KeepAddress) -> Result<Option<KeepPublicKey>> {
        self.store.get_public_key(address)
    }

    /// Returns all signatures submitted for `digest`, in submission order.
    ///
    /// # Errors
    ///
    /// Returns [`KeepStoreError::UnknownKeep`] if the keep is not registered.
    pub fn get_signatures(&self, address: KeepAddress, digest: Digest) -> Result<Vec<Signature>> {
        self.store.get_signatures(address, digest)
    }

    /// Calls `handler` for every keep created after this call.
    pub fn on_keep_created<F>(&self, handler: F) -> Subscription
    where
        F: Fn(ECDSAKeepCreatedEvent) + Send + Sync + 'static,
    {
        self.event_bus
            .subscribe(Topic::KeepCreated, None, move |event| {
                if let KeepEvent::KeepCreated(event) = event {
                    handler(event);
                }
            })
    }

    /// Calls `handler` for every signature requested from the keep at `address` after this call.
    ///
    /// # Errors
    ///
    /// Returns [`KeepStoreError::UnknownKeep`] if the keep is not registered.
    pub fn on_signature_requested<F>(&self, address: KeepAddress, handler: F) -> Result<Subscription>
    where
        F: Fn(SignatureRequestedEvent) + Send + Sync + 'static,
    {
        if !self.store.contains(address) {
            return Err(KeepStoreError::UnknownKeep(address));
        }
        Ok(self
            .event_bus
            .subscribe(Topic::SignatureRequested, Some(address), move |event| {
                if let KeepEvent::SignatureRequested(event) = event {
                    handler(event);
                }
            }))
    }
}
