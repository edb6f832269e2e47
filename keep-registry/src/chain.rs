//! Chain interface for signer nodes.
//!
//! This module defines the [`KeepChain`] trait, the capabilities a chain backend must provide so
//! that the rest of the client behaves identically regardless of whether it runs against a real
//! chain or a simulation.
//!
//! Current `KeepChain` implementations:
//! - [`LocalChain`] (in-memory simulation backed by a [`KeepRegistry`])

use std::sync::Arc;

use async_trait::async_trait;
use keep_types::{
    Digest, KeepAddress,
    crypto::{KeepPublicKey, Signature},
    events::{ECDSAKeepCreatedEvent, SignatureRequestedEvent},
};

use crate::{
    registry::KeepRegistry,
    services::{event_bus::Subscription, keep_store::KeepStoreError},
};

/// Dynamic trait object for a chain backend.
///
/// Must be `Send + Sync` to work with async contexts.
pub type KeepChainService = Arc<dyn KeepChain + Send + Sync>;

/// Callback for `ECDSAKeepCreated` events.
pub type KeepCreatedHandler = Box<dyn Fn(ECDSAKeepCreatedEvent) + Send + Sync>;

/// Callback for `SignatureRequested` events.
pub type SignatureRequestedHandler = Box<dyn Fn(SignatureRequestedEvent) + Send + Sync>;

/// Errors returned by a [`KeepChain`].
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The registry rejected the call.
    #[error(transparent)]
    Registry(#[from] KeepStoreError),
    /// Internal error of the backend, e.g., the RPC. The [`LocalChain`] never returns it.
    #[error(transparent)]
    Internal(#[from] eyre::Report),
}

/// Trait that chain backends must provide.
///
/// Handles keep event subscriptions and the submission of signing results.
#[async_trait]
pub trait KeepChain {
    /// Registers `handler` for every keep created from now on.
    async fn on_keep_created(&self, handler: KeepCreatedHandler)
    -> Result<Subscription, ChainError>;

    /// Registers `handler` for every signature requested from the keep at `keep_address` from now on.
    async fn on_signature_requested(
        &self,
        keep_address: KeepAddress,
        handler: SignatureRequestedHandler,
    ) -> Result<Subscription, ChainError>;

    /// Submits the public key generated by the signers of the keep.
    async fn submit_keep_public_key(
        &self,
        keep_address: KeepAddress,
        public_key: KeepPublicKey,
    ) -> Result<(), ChainError>;

    /// Submits a signature over `digest` produced by the signers of the keep.
    async fn submit_signature(
        &self,
        keep_address: KeepAddress,
        digest: Digest,
        signature: Signature,
    ) -> Result<(), ChainError>;

    /// Returns the public key of the keep, `None` if not submitted yet.
    async fn get_keep_public_key(
        &self,
        keep_address: KeepAddress,
    ) -> Result<Option<KeepPublicKey>, ChainError>;

    /// Returns all signatures submitted for `digest` in submission order.
    async fn get_signatures(
        &self,
        keep_address: KeepAddress,
        digest: Digest,
    ) -> Result<Vec<Signature>, ChainError>;
}

/// An in-memory chain.
///
/// Besides the [`KeepChain`] capabilities, exposes [`LocalChain::create_keep`] and
/// [`LocalChain::request_signature`] to drive the simulation the way on-chain events would.
#[derive(Default, Clone)]
pub struct LocalChain {
    registry: KeepRegistry,
}

impl LocalChain {
    /// Connects to a fresh local chain without any keeps.
    pub fn connect() -> Self {
        Self::new(KeepRegistry::new())
    }

    /// Creates a local chain on top of an existing registry.
    pub fn new(registry: KeepRegistry) -> Self {
        Self { registry }
    }

    /// Returns the registry backing this chain.
    pub fn registry(&self) -> &KeepRegistry {
        &self.registry
    }

    /// Simulates the creation of a keep on-chain.
    pub fn create_keep(&self, keep_address: KeepAddress) -> Result<(), KeepStoreError> {
        self.registry.create_keep(keep_address)
    }

    /// Simulates an on-chain signature request.
    pub fn request_signature(
        &self,
        keep_address: KeepAddress,
        digest: Digest,
    ) -> Result<(), KeepStoreError> {
        self.registry.request_signature(keep_address, digest)
    }
}

#[async_trait]
impl KeepChain for LocalChain {
    async fn on_keep_created(
        &self,
        handler: KeepCreatedHandler,
    ) -> Result<Subscription, ChainError> {
        Ok(self.registry.on_keep_created(handler))
    }

    async fn on_signature_requested(
        &self,
        keep_address: KeepAddress,
        handler: SignatureRequestedHandler,
    ) -> Result<Subscription, ChainError> {
        Ok(self
            .registry
            .on_signature_requested(keep_address, handler)?)
    }

    async fn submit_keep_public_key(
        &self,
        keep_address: KeepAddress,
        public_key: KeepPublicKey,
    ) -> Result<(), ChainError> {
        Ok(self.registry.submit_public_key(keep_address, public_key)?)
    }

    async fn submit_signature(
        &self,
        keep_address: KeepAddress,
        digest: Digest,
        signature: Signature,
    ) -> Result<(), ChainError> {
        Ok(self
            .registry
            .submit_signature(keep_address, digest, signature)?)
    }

    async fn get_keep_public_key(
        &self,
        keep_address: KeepAddress,
    ) -> Result<Option<KeepPublicKey>, ChainError> {
        Ok(self.registry.get_public_key(keep_address)?)
    }

    async fn get_signatures(
        &self,
        keep_address: KeepAddress,
        digest: Digest,
    ) -> Result<Vec<Signature>, ChainError> {
        Ok(self.registry.get_signatures(keep_address, digest)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_errors_are_transparent() {
        let keep_address = KeepAddress::from([1; 20]);
        let registry = ChainError::from(KeepStoreError::UnknownKeep(keep_address));
        assert_eq!(
            registry.to_string(),
            KeepStoreError::UnknownKeep(keep_address).to_string()
        );

        let internal = ChainError::from(eyre::eyre!("rpc unavailable"));
        assert!(matches!(internal, ChainError::Internal(_)));
        assert_eq!(internal.to_string(), "rpc unavailable");
    }
}
