#![deny(missing_docs)]
//! This crate provides the keep registry of a threshold-ECDSA signer node.
//!
//! A keep is a signing group identified by its address. During its lifetime, a keep is created
//! once, receives its group public key at most once, and collects signatures for requested
//! digests. The [`KeepRegistry`] models this state, enforces its invariants and notifies
//! subscribers of state transitions through the [`EventBus`], so off-chain signers can react
//! without polling.
//!
//! Signer nodes do not talk to the registry directly but program against the [`chain::KeepChain`]
//! trait. The [`chain::LocalChain`] implements it in memory and additionally lets a driver create
//! keeps and request signatures the way on-chain events would.
//!
//! The general workflow is as follows:
//! 1) The chain driver creates a keep.
//!    - every `ECDSAKeepCreated` subscriber is notified.
//!    - the signers run the key generation and submit the public key of the keep.
//! 2) The chain driver requests a signature for a digest from the keep.
//!    - every `SignatureRequested` subscriber of that keep is notified.
//!    - the signers run the threshold signing and submit the signature.
//!
//! The [`services::keep_event_watcher`] implements the signer side of this workflow on top of a
//! [`services::keep_event_watcher::KeepEventHandler`].
//!
//! If the keep event watcher encounters an error, the provided `CancellationToken` is cancelled,
//! allowing the hosting application to handle the shutdown process gracefully.

pub mod chain;
pub mod config;
pub mod metrics;
pub mod registry;
pub mod services;

pub use registry::KeepRegistry;
pub use services::event_bus::{EventBus, Subscription};
pub use services::keep_store::{KeepStore, KeepStoreError};
