#![deny(missing_docs)]
//! Core type definitions for the keep registry and its clients.
//!
//! This crate groups together the strongly-typed values exchanged between
//! the chain backend and the off-chain signer nodes. It provides:
//!
//! * Thin wrappers around fixed-length byte strings such as keep addresses
//!   and digests, with consistent parsing and display implementations.
//! * The ECDSA types submitted by the signing engine (see [`crypto`] module).
//! * The events a keep emits during its lifecycle and the topics they are
//!   published on (see [`events`] module).
//!
//! Every type rejects malformed input at construction time, so a value of
//! one of these types always has the correct length.

use std::{fmt, str::FromStr};

use alloy::primitives::{Address, B256, hex};

pub mod crypto;
pub mod events;

pub use alloy::primitives::U256;

/// Errors when parsing one of the fixed-length types from raw input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The input has the wrong amount of bytes.
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// The amount of bytes the type needs.
        expected: usize,
        /// The amount of bytes we got.
        actual: usize,
    },
    /// The input is not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    /// The input is not a valid point/scalar for the curve.
    #[error("invalid curve encoding")]
    InvalidEncoding,
}

/// The address of a keep.
///
/// Assigned by the creator of the keep and immutable afterwards. Displays in EIP-55 checksum form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct KeepAddress(Address);

/// The digest (message hash) that is threshold-signed by a keep.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Digest(B256);

/// Checks the length of `bytes` against `N` and copies it into an array.
pub(crate) fn fixed_bytes<const N: usize>(bytes: &[u8]) -> Result<[u8; N], ParseError> {
    bytes.try_into().map_err(|_| ParseError::InvalidLength {
        expected: N,
        actual: bytes.len(),
    })
}

/// Decodes hex (with or without `0x` prefix) into an array of exactly `N` bytes.
pub(crate) fn fixed_hex<const N: usize>(s: &str) -> Result<[u8; N], ParseError> {
    let bytes = hex::decode(s)?;
    fixed_bytes(&bytes)
}

impl KeepAddress {
    /// The length of a keep address in bytes.
    pub const LEN: usize = 20;

    /// Creates a new `KeepAddress` by wrapping an [`Address`].
    pub const fn new(address: Address) -> Self {
        Self(address)
    }

    /// Returns the wrapped [`Address`].
    pub fn into_inner(self) -> Address {
        self.0
    }

    /// Returns the raw bytes of the address.
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl Digest {
    /// The length of a digest in bytes.
    pub const LEN: usize = 32;

    /// Creates a new `Digest` by wrapping a [`B256`].
    pub const fn new(digest: B256) -> Self {
        Self(digest)
    }

    /// Returns the wrapped [`B256`].
    pub fn into_inner(self) -> B256 {
        self.0
    }

    /// Returns the raw bytes of the digest.
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl From<Address> for KeepAddress {
    fn from(value: Address) -> Self {
        Self(value)
    }
}

impl From<[u8; 20]> for KeepAddress {
    fn from(value: [u8; 20]) -> Self {
        Self(Address::new(value))
    }
}

impl TryFrom<&[u8]> for KeepAddress {
    type Error = ParseError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Ok(Self::from(fixed_bytes::<20>(value)?))
    }
}

impl FromStr for KeepAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(fixed_hex::<20>(s)?))
    }
}

impl fmt::Display for KeepAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_checksum(None))
    }
}

impl From<B256> for Digest {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl From<[u8; 32]> for Digest {
    fn from(value: [u8; 32]) -> Self {
        Self(B256::new(value))
    }
}

impl TryFrom<&[u8]> for Digest {
    type Error = ParseError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Ok(Self::from(fixed_bytes::<32>(value)?))
    }
}

impl FromStr for Digest {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(fixed_hex::<32>(s)?))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
