//! ECDSA types submitted to a keep by the off-chain signing engine.
//!
//! Main types:
//! * [`KeepPublicKey`] – the group public key of a keep, committed once after key generation.
//! * [`Signature`] – an `(r, s)` pair produced by the signers for a requested digest.
//!
//! Both types convert from and to their `k256` counterparts, so signing engines
//! built on `k256` can submit their output directly. The registry itself never
//! verifies signatures; [`Signature::verify`] is meant for signer and driver code.

use std::{fmt, str::FromStr};

use alloy::primitives::{B512, U256, ruint::UintTryFrom};
use k256::ecdsa::{VerifyingKey, signature::hazmat::PrehashVerifier as _};

use crate::{Digest, ParseError, fixed_bytes, fixed_hex};

/// The public key of a keep.
///
/// The uncompressed secp256k1 point without the SEC1 tag byte, i.e. `X || Y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct KeepPublicKey(B512);

/// An ECDSA signature as a pair of big unsigned integers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    /// The `r` component.
    pub r: U256,
    /// The `s` component.
    pub s: U256,
}

impl KeepPublicKey {
    /// The length of a public key in bytes.
    pub const LEN: usize = 64;

    /// Creates a new `KeepPublicKey` by wrapping a [`B512`].
    pub const fn new(key: B512) -> Self {
        Self(key)
    }

    /// Returns the wrapped [`B512`].
    pub fn into_inner(self) -> B512 {
        self.0
    }

    /// Returns the raw bytes of the key.
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }

    /// Interprets the key as a secp256k1 point.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidEncoding`] if the bytes are not a point on the curve.
    pub fn to_verifying_key(&self) -> Result<VerifyingKey, ParseError> {
        let mut sec1 = [0u8; 65];
        sec1[0] = 0x04;
        sec1[1..].copy_from_slice(self.as_slice());
        VerifyingKey::from_sec1_bytes(&sec1).map_err(|_| ParseError::InvalidEncoding)
    }
}

impl From<[u8; 64]> for KeepPublicKey {
    fn from(value: [u8; 64]) -> Self {
        Self(B512::new(value))
    }
}

impl TryFrom<&[u8]> for KeepPublicKey {
    type Error = ParseError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Ok(Self::from(fixed_bytes::<64>(value)?))
    }
}

impl FromStr for KeepPublicKey {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(fixed_hex::<64>(s)?))
    }
}

impl From<&VerifyingKey> for KeepPublicKey {
    fn from(value: &VerifyingKey) -> Self {
        let point = value.to_encoded_point(false);
        let mut bytes = [0u8; 64];
        // skip the SEC1 tag
        bytes.copy_from_slice(&point.as_bytes()[1..]);
        Self::from(bytes)
    }
}

impl fmt::Display for KeepPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Signature {
    /// Creates a new `Signature` from its components.
    pub fn new<R, S>(r: R, s: S) -> Self
    where
        U256: UintTryFrom<R> + UintTryFrom<S>,
    {
        Self {
            r: U256::from(r),
            s: U256::from(s),
        }
    }

    /// Verifies this signature over the prehashed `digest` against `public_key`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidEncoding`] if the key or signature are not valid curve values.
    /// Returns `Ok(false)` if both are valid but the signature does not match.
    pub fn verify(&self, public_key: &KeepPublicKey, digest: &Digest) -> Result<bool, ParseError> {
        let verifying_key = public_key.to_verifying_key()?;
        let signature = k256::ecdsa::Signature::try_from(self)?;
        Ok(verifying_key
            .verify_prehash(digest.as_slice(), &signature)
            .is_ok())
    }
}

impl From<&k256::ecdsa::Signature> for Signature {
    fn from(value: &k256::ecdsa::Signature) -> Self {
        let bytes = value.to_bytes();
        Self {
            r: U256::from_be_slice(&bytes[..32]),
            s: U256::from_be_slice(&bytes[32..]),
        }
    }
}

impl TryFrom<&Signature> for k256::ecdsa::Signature {
    type Error = ParseError;

    fn try_from(value: &Signature) -> Result<Self, Self::Error> {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&value.r.to_be_bytes::<32>());
        bytes[32..].copy_from_slice(&value.s.to_be_bytes::<32>());
        k256::ecdsa::Signature::from_slice(&bytes).map_err(|_| ParseError::InvalidEncoding)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(r={}, s={})", self.r, self.s)
    }
}
