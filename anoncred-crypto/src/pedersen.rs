//! Pedersen commitments \[1\] over the prime-order pairing groups from BLS12-381 \[2\].
//!
//! Commitments may be formed using the [`commit`] method on [`PedersenParameters`] and verified
//! with the [`verify_opening`] method on a [`Commitment`]. [`PedersenParameters`] may be
//! constructed by uniform random sampling from an [`Rng`], using the [`PedersenParameters::new`]
//! method, or from generators that some other key or parameter set already fixed.
//! ```
//! # use anoncred_crypto::{BlindingFactor, Message, pedersen::PedersenParameters};
//! # use bls12_381::G1Projective;
//! # let mut rng = rand::thread_rng();
//! let params = PedersenParameters::<G1Projective>::new(&mut rng, 5);
//! let msg = Message::random(&mut rng, 5);
//! let bf = BlindingFactor::new(&mut rng);
//! let commitment = params.commit(&msg, bf).unwrap();
//! assert!(commitment.verify_opening(&params, bf, &msg).unwrap());
//! ```
//!
//! ## References
//!
//! 1. Torben Pyrds Pedersen. "Non-interactive and information-theoretic secure verifiable secret
//!    sharing". 1992. URL: <https://www.cs.cornell.edu/courses/cs754/2001fa/129.PDF>
//!
//! 2. D. Boneh, S. Gorbunov, R. Wahby, H. Wee, and Z. Zhang. "BLS Signatures, Version 4".
//!    Internet-draft, IETF. 2021. URL:
//!    <https://datatracker.ietf.org/doc/html/draft-irtf-cfrg-bls-signature-04>
//!
//! [`commit`]: PedersenParameters::commit
//! [`verify_opening`]: Commitment::verify_opening
//! [`Rng`]: crate::Rng

use crate::{
    common::*,
    proofs::{ChallengeBuilder, ChallengeInput},
    serde::SerializeElement,
};
use serde::{Deserialize, Serialize};
use std::iter;

/// A Pedersen commitment to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "G: SerializeElement")]
pub struct Commitment<G>(#[serde(with = "SerializeElement")] pub(crate) G)
where
    G: Group<Scalar = Scalar>;

impl<G: Group<Scalar = Scalar>> Commitment<G> {
    /// Verify a provided opening of the commitment.
    pub fn verify_opening(
        &self,
        pedersen_params: &PedersenParameters<G>,
        bf: BlindingFactor,
        msg: &Message,
    ) -> Result<bool, Error> {
        Ok(pedersen_params.commit(msg, bf)? == *self)
    }

    /// Get the inner group element representing the commitment.
    pub fn to_element(self) -> G {
        self.0
    }

    /// Wrap a group element received from a counterparty as a commitment.
    pub fn from_element(element: G) -> Self {
        Commitment(element)
    }
}

impl<G: Group<Scalar = Scalar> + GroupEncoding> ChallengeInput for Commitment<G> {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume_bytes(self.to_element().to_bytes());
    }
}

/// Parameters for Pedersen commitments.
///
/// These are defined over the prime-order pairing groups from BLS12-381.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(bound = "G: SerializeElement")]
pub struct PedersenParameters<G>
where
    G: Group<Scalar = Scalar>,
{
    #[serde(with = "SerializeElement")]
    h: G,
    #[serde(with = "SerializeElement")]
    gs: Vec<G>,
}

impl<G: Group<Scalar = Scalar>> PedersenParameters<G> {
    /// Generate a new, random set of Pedersen parameters for messages of the given length.
    ///
    /// These are chosen uniformly at random, such that no discrete logarithm relationships
    /// are known among the generators.
    pub fn new(rng: &mut impl Rng, length: usize) -> Self {
        let h: G = random_non_identity(&mut *rng);
        let gs = iter::repeat_with(|| random_non_identity(&mut *rng))
            .take(length)
            .collect();
        Self { h, gs }
    }

    /// Produce Pedersen parameters from a set of known generators.
    ///
    /// `h` is the generator for the blinding factor.
    pub fn from_generators(h: G, gs: Vec<G>) -> PedersenParameters<G> {
        Self { h, gs }
    }

    /// Form a commitment to a message and blinding factor.
    pub fn commit(&self, msg: &Message, bf: BlindingFactor) -> Result<Commitment<G>, Error> {
        if msg.len() != self.gs.len() {
            return Err(Error::MessageLengthMismatch {
                expected: self.gs.len(),
                got: msg.len(),
            });
        }
        Ok(Commitment(self.h * bf.to_scalar() + inner_product(&self.gs, msg)))
    }

    /// The number of message elements these parameters commit to.
    pub fn message_len(&self) -> usize {
        self.gs.len()
    }

    /// The blinding factor generator.
    pub fn h(&self) -> &G {
        &self.h
    }

    /// The message generators.
    pub fn gs(&self) -> &[G] {
        &self.gs
    }
}

impl<G: Group<Scalar = Scalar> + GroupEncoding> ChallengeInput for PedersenParameters<G> {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume_bytes((self.gs.len() as u64).to_le_bytes());
        builder.consume_bytes(self.h.to_bytes());
        for g in &self.gs {
            builder.consume_bytes(g.to_bytes());
        }
    }
}

/// Compute `Σ g_i * m_i`; callers check the lengths agree.
pub(crate) fn inner_product<G: Group<Scalar = Scalar>>(gs: &[G], ms: &[Scalar]) -> G {
    gs.iter().zip(ms.iter()).map(|(g, m)| *g * m).sum()
}

#[cfg(test)]
mod test {
    use super::*;

    fn commit_open<G: Group<Scalar = Scalar>>() {
        let mut rng = crate::test::rng();
        let params = PedersenParameters::<G>::new(&mut rng, 3);
        let msg = Message::random(&mut rng, 3);
        let bf = BlindingFactor::new(&mut rng);

        let com = params.commit(&msg, bf).unwrap();
        assert!(com.verify_opening(&params, bf, &msg).unwrap());
    }

    #[test]
    fn commit_open_g1() {
        commit_open::<G1Projective>()
    }

    #[test]
    fn commit_open_g2() {
        commit_open::<G2Projective>()
    }

    fn commit_does_not_open_on_wrong_msg<G: Group<Scalar = Scalar>>() {
        let mut rng = crate::test::rng();
        let params = PedersenParameters::<G>::new(&mut rng, 3);
        let msg = Message::random(&mut rng, 3);
        let bf = BlindingFactor::new(&mut rng);

        let bad_msg = Message::random(&mut rng, 3);

        assert_ne!(
            &*msg, &*bad_msg,
            "unfortunate RNG seed: bad_msg should be different"
        );

        let com = params.commit(&msg, bf).unwrap();
        assert!(!com.verify_opening(&params, bf, &bad_msg).unwrap());
    }

    #[test]
    fn commit_does_not_open_on_wrong_msg_g1() {
        commit_does_not_open_on_wrong_msg::<G1Projective>()
    }

    #[test]
    fn commit_does_not_open_on_wrong_msg_g2() {
        commit_does_not_open_on_wrong_msg::<G2Projective>()
    }

    #[test]
    fn commit_does_not_open_on_wrong_bf() {
        let mut rng = crate::test::rng();
        let params = PedersenParameters::<G1Projective>::new(&mut rng, 3);
        let msg = Message::random(&mut rng, 3);
        let bf = BlindingFactor::new(&mut rng);
        let bad_bf = BlindingFactor::new(&mut rng);

        let com = params.commit(&msg, bf).unwrap();
        assert!(!com.verify_opening(&params, bad_bf, &msg).unwrap());
    }

    #[test]
    fn commit_rejects_wrong_length() {
        let mut rng = crate::test::rng();
        let params = PedersenParameters::<G1Projective>::new(&mut rng, 3);
        let msg = Message::random(&mut rng, 2);
        let bf = BlindingFactor::new(&mut rng);

        assert_eq!(
            params.commit(&msg, bf),
            Err(Error::MessageLengthMismatch {
                expected: 3,
                got: 2
            })
        );
    }
}
