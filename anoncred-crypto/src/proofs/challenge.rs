//! Functionality for building challenge scalars.
//!
//! Supports challenges on proofs of knowledge of the opening of commitments and of signatures,
//! both individually and in conjunctions. There is also support for incorporating other public
//! information into the challenge.

use crate::common::*;
use sha3::{Digest, Sha3_512};
use std::collections::BTreeMap;

/// A trait implemented by types which can feed their public components into a [`ChallengeBuilder`].
pub trait ChallengeInput {
    /// Incorporate public components of this type into a [`ChallengeBuilder`].
    fn consume(&self, builder: &mut ChallengeBuilder);
}

impl<'a, T: ChallengeInput + ?Sized> ChallengeInput for &'a T {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        (**self).consume(builder);
    }
}

impl<T: ChallengeInput> ChallengeInput for [T] {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume_bytes((self.len() as u64).to_le_bytes());
        for item in self {
            item.consume(builder);
        }
    }
}

impl<T: ChallengeInput> ChallengeInput for BTreeMap<usize, T> {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume_bytes((self.len() as u64).to_le_bytes());
        for (index, item) in self {
            builder.consume_bytes((*index as u64).to_le_bytes());
            item.consume(builder);
        }
    }
}

impl ChallengeInput for Scalar {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume_bytes(self.to_bytes());
    }
}

impl ChallengeInput for G1Affine {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume_bytes(self.to_compressed());
    }
}

impl ChallengeInput for G2Affine {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume_bytes(self.to_compressed());
    }
}

impl ChallengeInput for G1Projective {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume_bytes(self.to_bytes());
    }
}

impl ChallengeInput for G2Projective {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume_bytes(self.to_bytes());
    }
}

/// A challenge scalar for use in a Schnorr-style proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Challenge(Scalar);

impl Challenge {
    /// Retrieve the internal scalar value.
    pub fn to_scalar(self) -> Scalar {
        self.0
    }
}

/// Holds state used when building a [`Challenge`] using the Fiat-Shamir heuristic, as in a
/// non-interactive Schnorr proof.
#[derive(Debug, Clone)]
#[allow(missing_copy_implementations)]
pub struct ChallengeBuilder {
    hasher: Sha3_512,
}

impl Default for ChallengeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChallengeBuilder {
    /// Initialize a new, empty challenge.
    pub fn new() -> Self {
        Self {
            hasher: Sha3_512::new(),
        }
    }

    /// Incorporate public data from some given type into the challenge.
    pub fn consume<T: ChallengeInput + ?Sized>(&mut self, object: &T) {
        object.consume(self);
    }

    /// A conveniently chainable variant of [`ChallengeBuilder::consume`].
    pub fn with<T: ChallengeInput + ?Sized>(mut self, object: &T) -> Self {
        object.consume(&mut self);
        self
    }

    /// Incorporate arbitrary bytes into the challenge.
    pub fn consume_bytes(&mut self, bytes: impl AsRef<[u8]>) {
        self.hasher.update(bytes);
    }

    /// A conveniently chainable variant of [`ChallengeBuilder::consume_bytes`].
    pub fn with_bytes(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.consume_bytes(bytes);
        self
    }

    /// Incorporate a variable-length byte string, prefixed by its length.
    pub fn consume_prefixed_bytes(&mut self, bytes: impl AsRef<[u8]>) {
        let bytes = bytes.as_ref();
        self.consume_bytes((bytes.len() as u64).to_le_bytes());
        self.consume_bytes(bytes);
    }

    /// Consume the builder and generate a [`Challenge`] from the accumulated data.
    pub fn finish(self) -> Challenge {
        let mut digested = [0; 64];
        digested.copy_from_slice(self.hasher.finalize().as_ref());
        Challenge(Scalar::from_bytes_wide(&digested))
    }
}
