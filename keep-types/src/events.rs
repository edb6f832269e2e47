//! Events emitted during the lifecycle of a keep.
//!
//! Each event carries only the information relevant to its transition. The
//! [`Topic`] of an event is derived from its variant, so an event can never be
//! published on the wrong topic.

use std::fmt;

use crate::{Digest, KeepAddress};

/// The topics subscribers can register on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    /// A new keep was created. Never scoped, every subscriber sees every keep.
    KeepCreated,
    /// A signature was requested from a keep. Usually scoped to that keep.
    SignatureRequested,
}

/// Emitted when a new keep is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ECDSAKeepCreatedEvent {
    /// The address of the new keep.
    pub keep_address: KeepAddress,
}

/// Emitted when a keep is asked to sign a digest.
///
/// Implicitly scoped to the keep the signature was requested from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignatureRequestedEvent {
    /// The digest to sign.
    pub digest: Digest,
}

/// All events a keep can emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeepEvent {
    /// See [`ECDSAKeepCreatedEvent`].
    KeepCreated(ECDSAKeepCreatedEvent),
    /// See [`SignatureRequestedEvent`].
    SignatureRequested(SignatureRequestedEvent),
}

impl Topic {
    /// The name of the topic as emitted on-chain.
    pub fn name(&self) -> &'static str {
        match self {
            Topic::KeepCreated => "ECDSAKeepCreated",
            Topic::SignatureRequested => "SignatureRequested",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl KeepEvent {
    /// Returns the [`Topic`] this event is published on.
    pub fn topic(&self) -> Topic {
        match self {
            KeepEvent::KeepCreated(_) => Topic::KeepCreated,
            KeepEvent::SignatureRequested(_) => Topic::SignatureRequested,
        }
    }
}

impl From<ECDSAKeepCreatedEvent> for KeepEvent {
    fn from(value: ECDSAKeepCreatedEvent) -> Self {
        Self::KeepCreated(value)
    }
}

impl From<SignatureRequestedEvent> for KeepEvent {
    fn from(value: SignatureRequestedEvent) -> Self {
        Self::SignatureRequested(value)
    }
}
