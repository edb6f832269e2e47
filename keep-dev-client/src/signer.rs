//! A single-party stand-in for the threshold signers of a keep.
//!
//! [`DevSigner`] generates one secp256k1 key per created keep and signs every requested digest
//! with it. Useful to exercise the registry end to end without running the signing protocol.

use std::collections::HashMap;

use async_trait::async_trait;
use eyre::Context as _;
use k256::ecdsa::{SigningKey, signature::hazmat::PrehashSigner as _};
use keep_registry::{chain::KeepChainService, services::keep_event_watcher::KeepEventHandler};
use keep_types::{
    Digest, KeepAddress,
    crypto::{KeepPublicKey, Signature},
};
use parking_lot::Mutex;

/// Holds the signing keys of all keeps it has seen.
pub(crate) struct DevSigner {
    chain: KeepChainService,
    keys: Mutex<HashMap<KeepAddress, SigningKey>>,
}

impl DevSigner {
    pub(crate) fn new(chain: KeepChainService) -> Self {
        Self {
            chain,
            keys: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl KeepEventHandler for DevSigner {
    async fn on_keep_created(&self, keep_address: KeepAddress) -> eyre::Result<()> {
        // a keep never changes its key
        let public_key = KeepPublicKey::from(
            self.keys
                .lock()
                .entry(keep_address)
                .or_insert_with(|| SigningKey::random(&mut rand::thread_rng()))
                .verifying_key(),
        );
        tracing::debug!("generated key {public_key}");
        self.chain
            .submit_keep_public_key(keep_address, public_key)
            .await
            .context("while submitting public key")?;
        Ok(())
    }

    async fn on_signature_requested(
        &self,
        keep_address: KeepAddress,
        digest: Digest,
    ) -> eyre::Result<()> {
        let signing_key = self
            .keys
            .lock()
            .get(&keep_address)
            .cloned()
            .ok_or_else(|| eyre::eyre!("no key for keep {keep_address}"))?;
        let signature: k256::ecdsa::Signature = signing_key
            .sign_prehash(digest.as_slice())
            .map_err(|err| eyre::eyre!("cannot sign digest: {err}"))?;
        let signature = Signature::from(&signature);
        tracing::debug!("signed digest: {signature}");
        self.chain
            .submit_signature(keep_address, digest, signature)
            .await
            .context("while submitting signature")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use keep_registry::chain::{KeepChain as _, LocalChain};

    use super::*;

    #[tokio::test]
    async fn signs_requested_digest() -> eyre::Result<()> {
        let chain = LocalChain::connect();
        let signer = DevSigner::new(Arc::new(chain.clone()));
        let keep_address = KeepAddress::from([1; 20]);
        let digest = Digest::from([2; 32]);
        chain.create_keep(keep_address)?;

        signer.on_keep_created(keep_address).await?;
        let public_key = chain
            .get_keep_public_key(keep_address)
            .await?
            .ok_or_else(|| eyre::eyre!("public key not submitted"))?;

        signer.on_signature_requested(keep_address, digest).await?;
        let signatures = chain.get_signatures(keep_address, digest).await?;
        assert_eq!(signatures.len(), 1);
        assert!(signatures[0].verify(&public_key, &digest)?);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_keep_is_an_error() {
        let chain = LocalChain::connect();
        let signer = DevSigner::new(Arc::new(chain));
        let result = signer
            .on_signature_requested(KeepAddress::from([1; 20]), Digest::from([2; 32]))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn second_key_is_rejected_by_chain() -> eyre::Result<()> {
        let chain = LocalChain::connect();
        let signer = DevSigner::new(Arc::new(chain.clone()));
        let keep_address = KeepAddress::from([1; 20]);
        chain.create_keep(keep_address)?;

        signer.on_keep_created(keep_address).await?;
        let first = chain.get_keep_public_key(keep_address).await?;
        assert!(signer.on_keep_created(keep_address).await.is_err());
        assert_eq!(chain.get_keep_public_key(keep_address).await?, first);
        Ok(())
    }
}
