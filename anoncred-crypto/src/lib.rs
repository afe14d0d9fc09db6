//! This crate includes the cryptographic engine behind anonymous credentials, instantiated over the
//! pairing-friendly curve BLS12-381:
//! - Pedersen Commitments instantiated using G1 and G2.
//! - Pointcheval Sanders signatures and blind signatures (CT-RSA 2016).
//! - BBS and BBS+ signatures, with blind issuance for BBS+.
//! - Keyed-verification MACs in the style of BBDT16, with blind issuance and proofs of validity.
//! - Schnorr-style zero-knowledge proofs for commitments and signatures with selective disclosure.
//! - Composite proofs over several statements with equality constraints between hidden messages,
//!   exposed both as typed values and as a byte-level interface.

#![warn(missing_docs)]
#![warn(missing_copy_implementations, missing_debug_implementations)]
#![warn(unused_qualifications)]
#![warn(future_incompatible)]
#![warn(unused)]
#![forbid(rustdoc::broken_intra_doc_links)]

pub mod bbs;
pub mod bbs_plus;
pub mod composite;
pub mod mac;
pub mod pedersen;
pub mod pointcheval_sanders;
pub mod proofs;

mod generators;
mod serde;

pub use crate::common::Rng;
pub use crate::serde::SerializeElement;

use crate::common::*;
use ::serde::{de::DeserializeOwned, Deserialize, Serialize};
use bincode::Options;
use ff::Field;
use std::{collections::BTreeMap, ops::Deref};
use thiserror::Error;

/// Upper bound on the size of any encoded engine value.
const MAX_ENCODED_LEN: u64 = 1 << 24;

/// Error types that may arise from cryptographic operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Caused by attempting to commit to or sign a message with a different length than the
    /// provided parameters expected.
    #[error("expected a message of length {expected}, got {got}")]
    MessageLengthMismatch {
        /// The length of the parameters, and expected length of the message.
        expected: usize,
        /// The actual length of the message.
        got: usize,
    },
    /// A message index does not exist under the given parameters.
    #[error("message index {index} is out of range for {length} messages")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The number of messages supported.
        length: usize,
    },
    /// An equality constraint names a statement that does not exist.
    #[error("statement index {statement} is out of range for {count} statements")]
    StatementOutOfRange {
        /// The offending statement index.
        statement: usize,
        /// The number of statements.
        count: usize,
    },
    /// An equality constraint names a message that the statement reveals.
    #[error("message {message} of statement {statement} is revealed and cannot be constrained")]
    RevealedMessageInEquality {
        /// The statement index.
        statement: usize,
        /// The message index.
        message: usize,
    },
    /// A witness is missing or does not fit its statement.
    #[error("witness for statement {statement} does not match the statement")]
    WitnessMismatch {
        /// The statement index.
        statement: usize,
    },
    /// A statement refers to a setup parameter that is missing or of the wrong type.
    #[error("setup parameter {index} is missing or has the wrong type")]
    InvalidSetupParam {
        /// The setup parameter index.
        index: usize,
    },
    /// The blinded and known indices of a blind signing request do not split the message.
    #[error("blinded and known message indices must partition 0..{length}")]
    InvalidBlindingIndices {
        /// The number of messages supported by the signing key.
        length: usize,
    },
    /// An engine value could not be encoded or decoded.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// The outcome of verifying a proof or signature.
///
/// Cryptographic failure is a value, not an error: `error` explains why `verified` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use = "the result of a verification should always be checked"]
pub struct VerifyResult {
    /// Whether the check passed.
    pub verified: bool,
    /// The reason the check did not pass, if it did not.
    pub error: Option<String>,
}

impl VerifyResult {
    /// A passing verification.
    pub fn success() -> Self {
        Self {
            verified: true,
            error: None,
        }
    }

    /// A failing verification with the given reason.
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            verified: false,
            error: Some(reason.into()),
        }
    }
}

/// Encode an engine value into the compact binary form passed across the engine interface.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, Error> {
    bincode::DefaultOptions::new()
        .with_limit(MAX_ENCODED_LEN)
        .serialize(value)
        .map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode an engine value produced by [`encode`].
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    bincode::DefaultOptions::new()
        .with_limit(MAX_ENCODED_LEN)
        .deserialize(bytes)
        .map_err(|e| Error::Serialization(e.to_string()))
}

/// Variable-length message type used across schemes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message(#[serde(with = "SerializeElement")] Vec<Scalar>);

impl Deref for Message {
    type Target = [Scalar];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Message {
    /// Create a new message from a Vec<Scalar>.
    pub fn new(scalars: Vec<Scalar>) -> Self {
        Message(scalars)
    }

    /// Create a message of the given length with entries chosen uniformly at random.
    pub fn random(rng: &mut impl Rng, length: usize) -> Self {
        Message((0..length).map(|_| Scalar::random(&mut *rng)).collect())
    }

    /// Split the message into the entries at `revealed_indices` and the remaining hidden entries,
    /// each keyed by message index.
    pub fn split(
        &self,
        revealed_indices: &[usize],
    ) -> Result<(BTreeMap<usize, Scalar>, BTreeMap<usize, Scalar>), Error> {
        if let Some(&index) = revealed_indices.iter().find(|&&i| i >= self.len()) {
            return Err(Error::IndexOutOfRange {
                index,
                length: self.len(),
            });
        }
        Ok(self
            .iter()
            .copied()
            .enumerate()
            .partition(|(i, _)| revealed_indices.contains(i)))
    }
}

impl From<Vec<Scalar>> for Message {
    fn from(scalars: Vec<Scalar>) -> Self {
        Message(scalars)
    }
}

impl From<Scalar> for Message {
    fn from(scalar: Scalar) -> Self {
        Message(vec![scalar])
    }
}

/// Blinding factor for a commitment, message, or signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindingFactor(#[serde(with = "SerializeElement")] Scalar);

impl BlindingFactor {
    /// Generate a new blinding factor uniformly at random from the set of possible [`Scalar`]s.
    pub fn new(rng: &mut impl Rng) -> Self {
        Self(Scalar::random(rng))
    }

    /// Construct a blinding factor from the scalar representing it.
    ///
    /// **warning:** this should never be used unless unblinding something!
    pub fn from_scalar(scalar: Scalar) -> Self {
        Self(scalar)
    }

    /// Convert to the inner scalar representing this blinding factor.
    pub fn to_scalar(&self) -> Scalar {
        self.0
    }
}

mod common {
    //! Common types used internally.

    pub use crate::{BlindingFactor, Error, Message};
    pub use bls12_381::{pairing, G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
    pub use group::{Group, GroupEncoding};

    use ff::Field;

    /// A trait synonym for a cryptographically secure random number generator. This trait is
    /// blanket-implemented for all valid types and will never need to be implemented by-hand.
    pub trait Rng: rand_core::CryptoRng + rand_core::RngCore {}
    impl<T: rand_core::CryptoRng + rand_core::RngCore> Rng for T {}

    /// Select a non-identity element from the group uniformly at random.
    pub fn random_non_identity<G>(rng: &mut impl Rng) -> G
    where
        G: Group<Scalar = Scalar>,
    {
        loop {
            let g = G::random(&mut *rng);
            if !bool::from(g.is_identity()) {
                return g;
            }
        }
    }

    /// Select a non-zero scalar uniformly at random.
    pub fn random_nonzero_scalar(rng: &mut impl Rng) -> Scalar {
        loop {
            let r = Scalar::random(&mut *rng);
            if !r.is_zero() {
                return r;
            }
        }
    }

    /// Compute `1 / s`, or `None` if `s` is zero.
    pub fn invert(s: Scalar) -> Option<Scalar> {
        s.invert().into()
    }
}
