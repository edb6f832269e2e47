//! This module provides [`KeepStore`], the authoritative record of every keep.
//!
//! The store holds one [`Keep`] per [`KeepAddress`]. Membership is guarded by an outer `RwLock`,
//! every keep is guarded by its own `RwLock`, so mutations of one keep are serialized while
//! different keeps can be mutated in parallel. All locks are wrapped in an `Arc` for
//! thread-safe shared ownership.
//!
//! Only the [`crate::KeepRegistry`] mutates the store. Reads are public and return
//! owned snapshots, so no partial write is ever visible to a caller.

use std::{collections::HashMap, sync::Arc};

use keep_types::{
    Digest, KeepAddress,
    crypto::{KeepPublicKey, Signature},
};
use parking_lot::RwLock;
use tracing::instrument;

use crate::metrics::{
    METRICS_ID_REGISTRY_DUPLICATE_PUBLIC_KEYS, METRICS_ID_REGISTRY_KEEPS,
    METRICS_ID_REGISTRY_PUBLIC_KEYS, METRICS_ID_REGISTRY_SIGNATURES,
};

#[cfg(test)]
mod tests;

type Result<T> = std::result::Result<T, KeepStoreError>;

/// Errors returned by the [`KeepStore`].
///
/// None of these are retried internally. Repeating the same call cannot succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeepStoreError {
    /// The keep is not registered.
    #[error("unknown keep [{0}]")]
    UnknownKeep(KeepAddress),
    /// A keep with this address is already registered.
    #[error("keep [{0}] already exists")]
    DuplicateKeep(KeepAddress),
    /// The keep already has a public key.
    #[error("public key already submitted for keep [{0}]")]
    DuplicatePublicKey(KeepAddress),
}

/// The mutable state of a single keep.
#[derive(Debug, Default)]
struct Keep {
    public_key: Option<KeepPublicKey>,
    signatures: HashMap<Digest, Vec<Signature>>,
}

/// Storage for all keeps.
#[derive(Default, Clone)]
pub struct KeepStore(Arc<RwLock<HashMap<KeepAddress, Arc<RwLock<Keep>>>>>);

impl KeepStore {
    /// Creates a new, empty store.
    ///
    /// The keep gauge is shared by all stores of the process and is only incremented by new keeps.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the amount of registered keeps.
    ///
    /// _Note_ that this acquires a lock internally and returns the length at that point in time.
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    /// Returns `true` iff no keep is registered.
    ///
    /// _Note_ that this acquires a lock internally and returns the result from that point in time.
    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Returns `true` iff a keep with this address is registered.
    pub fn contains(&self, address: KeepAddress) -> bool {
        self.0.read().contains_key(&address)
    }

    /// Returns the addresses of all registered keeps in no particular order.
    pub fn keep_addresses(&self) -> Vec<KeepAddress> {
        self.0.read().keys().copied().collect()
    }

    /// Registers a new keep without public key and signatures.
    ///
    /// Does not notify anyone, this is the responsibility of the caller.
    ///
    /// # Errors
    ///
    /// Returns [`KeepStoreError::DuplicateKeep`] if the address is already registered.
    #[instrument(level = "debug", skip(self))]
    pub(crate) fn create_keep(&self, address: KeepAddress) -> Result<()> {
        let mut keeps = self.0.write();
        if keeps.contains_key(&address) {
            return Err(KeepStoreError::DuplicateKeep(address));
        }
        keeps.insert(address, Arc::default());
        ::metrics::gauge!(METRICS_ID_REGISTRY_KEEPS).increment(1);
        tracing::debug!("registered keep");
        Ok(())
    }

    /// Sets the public key of a keep.
    ///
    /// The check and the write happen under the keep's write lock, so out of any amount of
    /// concurrent calls for one keep exactly one succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`KeepStoreError::UnknownKeep`] if the keep is not registered and
    /// [`KeepStoreError::DuplicatePublicKey`] if it already has a public key, independent of its value.
    #[instrument(level = "debug", skip(self, key))]
    pub(crate) fn set_public_key(&self, address: KeepAddress, key: KeepPublicKey) -> Result<()> {
        let keep = self.keep(address)?;
        let mut keep = keep.write();
        if keep.public_key.is_some() {
            ::metrics::counter!(METRICS_ID_REGISTRY_DUPLICATE_PUBLIC_KEYS).increment(1);
            return Err(KeepStoreError::DuplicatePublicKey(address));
        }
        keep.public_key = Some(key);
        ::metrics::counter!(METRICS_ID_REGISTRY_PUBLIC_KEYS).increment(1);
        tracing::debug!("stored public key");
        Ok(())
    }

    /// Returns the public key of a keep, or `None` if it was not yet submitted.
    ///
    /// # Errors
    ///
    /// Returns [`KeepStoreError::UnknownKeep`] if the keep is not registered.
    pub fn get_public_key(&self, address: KeepAddress) -> Result<Option<KeepPublicKey>> {
        Ok(self.keep(address)?.read().public_key)
    }

    /// Appends a signature for `digest` to the keep. Does not deduplicate.
    ///
    /// # Errors
    ///
    /// Returns [`KeepStoreError::UnknownKeep`] if the keep is not registered.
    #[instrument(level = "debug", skip(self, signature))]
    pub(crate) fn append_signature(
        &self,
        address: KeepAddress,
        digest: Digest,
        signature: Signature,
    ) -> Result<()> {
        let keep = self.keep(address)?;
        let mut keep = keep.write();
        let signatures = keep.signatures.entry(digest).or_default();
        signatures.push(signature);
        ::metrics::counter!(METRICS_ID_REGISTRY_SIGNATURES).increment(1);
        tracing::debug!("stored signature #{} for digest", signatures.len());
        Ok(())
    }

    /// Returns all signatures for `digest` in submission order. Empty if there are none.
    ///
    /// # Errors
    ///
    /// Returns [`KeepStoreError::UnknownKeep`] if the keep is not registered.
    pub fn get_signatures(&self, address: KeepAddress, digest: Digest) -> Result<Vec<Signature>> {
        Ok(self
            .keep(address)?
            .read()
            .signatures
            .get(&digest)
            .cloned()
            .unwrap_or_default())
    }

    /// Retrieves the lock of a single keep. Releases the outer lock before returning.
    fn keep(&self, address: KeepAddress) -> Result<Arc<RwLock<Keep>>> {
        self.0
            .read()
            .get(&address)
            .cloned()
            .ok_or(KeepStoreError::UnknownKeep(address))
    }
}
