//! Proof of knowledge of a BBS+ signature or a keyed-verification MAC, with some messages revealed.
//!
//! Both schemes compute `A = b · 1/(x + e)` over `b = base + h0·s + Σ h_i·m_i`, so they share one
//! proof. The signature is randomized into `A' = A·r1`, `Abar = A'·x` and `d = b·r1 - h0·r2`, and
//! two Schnorr proofs show:
//!
//! - `Abar - d = A'·(-e) + h0·r2`
//! - `base + Σ_revealed h_i·m_i = d·r3 + (-h0)·s' + Σ_hidden (-h_j)·m_j`
//!
//! What remains is `Abar = A'·x`: a pairing check for BBS+, and a check by the secret key holder
//! for MACs, who receives it as a [`KeyedProof`].

use crate::{
    bbs_plus::{self, Signature},
    common::*,
    mac::{self, KeyedProof, Mac},
    pedersen::{Commitment, PedersenParameters},
    proofs::{
        check_indices, check_partition, hidden_indices, Challenge, ChallengeBuilder,
        ChallengeInput, CommitmentProof, CommitmentProofBuilder,
    },
    serde::SerializeElement,
};
use ff::Field;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The generators a BBS+ signature or a MAC is computed over.
struct Generators<'a> {
    base: G1Affine,
    h0: G1Affine,
    hs: &'a [G1Affine],
}

impl<'a> From<&'a bbs_plus::Params> for Generators<'a> {
    fn from(params: &'a bbs_plus::Params) -> Self {
        Generators {
            base: params.g1,
            h0: params.h0,
            hs: &params.hs,
        }
    }
}

impl<'a> From<&'a mac::Params> for Generators<'a> {
    fn from(params: &'a mac::Params) -> Self {
        Generators {
            base: params.g0,
            h0: params.h0,
            hs: &params.hs,
        }
    }
}

impl Generators<'_> {
    fn randomness_parameters(&self, a_prime: G1Affine) -> PedersenParameters<G1Projective> {
        PedersenParameters::from_generators(a_prime.into(), vec![self.h0.into()])
    }

    fn message_parameters(&self, d: G1Affine, hidden: &[usize]) -> PedersenParameters<G1Projective> {
        let gs = std::iter::once(-G1Projective::from(self.h0))
            .chain(hidden.iter().map(|&j| -G1Projective::from(self.hs[j])))
            .collect();
        PedersenParameters::from_generators(d.into(), gs)
    }

    fn revealed_target(&self, revealed: &BTreeMap<usize, Scalar>) -> Commitment<G1Projective> {
        let combination = revealed
            .iter()
            .map(|(&i, m)| self.hs[i] * m)
            .sum::<G1Projective>();
        Commitment::from_element(self.base + combination)
    }

    fn signed_value(&self, msg: &[Scalar], s: Scalar) -> G1Projective {
        let hs: Vec<G1Projective> = self.hs.iter().map(G1Projective::from).collect();
        self.base + self.h0 * s + crate::pedersen::inner_product(&hs, msg)
    }
}

/// Fully constructed proof of knowledge of a BBS+ signature or MAC and the hidden messages it
/// covers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BbsPlusSignatureProof {
    #[serde(with = "SerializeElement")]
    a_prime: G1Affine,
    #[serde(with = "SerializeElement")]
    a_bar: G1Affine,
    #[serde(with = "SerializeElement")]
    d: G1Affine,
    /// Proof of knowledge of `e` and `r2`.
    randomness_proof: CommitmentProof<G1Projective>,
    /// Proof of knowledge of `r3`, `s'` and the hidden messages.
    message_proof: CommitmentProof<G1Projective>,
}

/// A partially-built [`BbsPlusSignatureProof`].
///
/// Built up to (but not including) the challenge phase of a Schnorr proof.
#[derive(Debug, Clone)]
pub struct BbsPlusSignatureProofBuilder {
    /// `s'` followed by the hidden messages in index order.
    secret_messages: Message,
    a_prime: G1Affine,
    a_bar: G1Affine,
    d: G1Affine,
    minus_e: Scalar,
    r2: Scalar,
    r3: Scalar,
    randomness_proof_builder: CommitmentProofBuilder<G1Projective>,
    message_proof_builder: CommitmentProofBuilder<G1Projective>,
}

impl BbsPlusSignatureProofBuilder {
    /// Run the commitment phase of a proof of knowledge of a BBS+ `signature` on the message made
    /// of `revealed` and `hidden`, which must split `0..params.message_count()`.
    ///
    /// `conjunction_commitment_scalars` is aligned with `hidden` in index order.
    pub fn generate_proof_commitments(
        rng: &mut impl Rng,
        params: &bbs_plus::Params,
        revealed: &BTreeMap<usize, Scalar>,
        hidden: &BTreeMap<usize, Scalar>,
        signature: Signature,
        conjunction_commitment_scalars: &[Option<Scalar>],
    ) -> Result<Self, Error> {
        Self::commit(
            rng,
            &Generators::from(params),
            revealed,
            hidden,
            (signature.a, signature.e, signature.s),
            conjunction_commitment_scalars,
        )
    }

    /// Run the commitment phase of a proof of knowledge of `mac` on the message made of
    /// `revealed` and `hidden`, which must split `0..params.message_count()`.
    pub fn generate_mac_proof_commitments(
        rng: &mut impl Rng,
        params: &mac::Params,
        revealed: &BTreeMap<usize, Scalar>,
        hidden: &BTreeMap<usize, Scalar>,
        mac: Mac,
        conjunction_commitment_scalars: &[Option<Scalar>],
    ) -> Result<Self, Error> {
        Self::commit(
            rng,
            &Generators::from(params),
            revealed,
            hidden,
            (mac.a, mac.e, mac.s),
            conjunction_commitment_scalars,
        )
    }

    fn commit(
        rng: &mut impl Rng,
        generators: &Generators<'_>,
        revealed: &BTreeMap<usize, Scalar>,
        hidden: &BTreeMap<usize, Scalar>,
        (a, e, s): (G1Affine, Scalar, Scalar),
        conjunction_commitment_scalars: &[Option<Scalar>],
    ) -> Result<Self, Error> {
        let length = generators.hs.len();
        check_partition(length, revealed, hidden)?;
        let msg: Vec<Scalar> = (0..length)
            .map(|i| revealed.get(&i).or_else(|| hidden.get(&i)).copied())
            .collect::<Option<_>>()
            .ok_or(Error::MessageLengthMismatch {
                expected: length,
                got: revealed.len() + hidden.len(),
            })?;

        let (r1, r3) = loop {
            let r1 = Scalar::random(&mut *rng);
            if let Some(r3) = invert(r1) {
                break (r1, r3);
            }
        };
        let r2 = Scalar::random(&mut *rng);

        let b = generators.signed_value(&msg, s);
        let a_prime: G1Affine = (a * r1).into();
        let a_bar: G1Affine = (a_prime * (-e) + b * r1).into();
        let d: G1Affine = (b * r1 - generators.h0 * r2).into();
        let s_prime = s - r2 * r3;

        let hidden_idx: Vec<usize> = hidden.keys().copied().collect();
        let randomness_proof_builder = CommitmentProofBuilder::generate_proof_commitments(
            rng,
            &[None],
            &generators.randomness_parameters(a_prime),
        )?;
        let message_scalars: Vec<Option<Scalar>> = std::iter::once(None)
            .chain(conjunction_commitment_scalars.iter().copied())
            .collect();
        let message_proof_builder = CommitmentProofBuilder::generate_proof_commitments(
            rng,
            &message_scalars,
            &generators.message_parameters(d, &hidden_idx),
        )?;

        Ok(Self {
            secret_messages: Message::new(
                std::iter::once(s_prime)
                    .chain(hidden.values().copied())
                    .collect(),
            ),
            a_prime,
            a_bar,
            d,
            minus_e: -e,
            r2,
            r3,
            randomness_proof_builder,
            message_proof_builder,
        })
    }

    /// Get the commitment scalars corresponding to the hidden messages to use when constructing
    /// conjunctions of proofs.
    pub fn conjunction_commitment_scalars(&self) -> &[Scalar] {
        self.message_proof_builder
            .conjunction_commitment_scalars()
            .get(1..)
            .unwrap_or(&[])
    }

    /// Executes the response phase of a Schnorr-style signature proof to complete the proof.
    pub fn generate_proof_response(
        self,
        challenge: Challenge,
    ) -> Result<BbsPlusSignatureProof, Error> {
        let randomness_proof = self.randomness_proof_builder.generate_proof_response(
            &Message::from(self.r2),
            BlindingFactor::from_scalar(self.minus_e),
            challenge,
        )?;
        let message_proof = self.message_proof_builder.generate_proof_response(
            &self.secret_messages,
            BlindingFactor::from_scalar(self.r3),
            challenge,
        )?;
        Ok(BbsPlusSignatureProof {
            a_prime: self.a_prime,
            a_bar: self.a_bar,
            d: self.d,
            randomness_proof,
            message_proof,
        })
    }
}

impl ChallengeInput for BbsPlusSignatureProofBuilder {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.a_prime);
        builder.consume(&self.a_bar);
        builder.consume(&self.d);
        builder.consume(&self.randomness_proof_builder);
        builder.consume(&self.message_proof_builder);
    }
}

impl BbsPlusSignatureProof {
    /// Check the proof of a BBS+ signature against the `revealed` messages.
    pub fn verify_knowledge_of_signature(
        &self,
        params: &bbs_plus::Params,
        public_key: &bbs_plus::PublicKey,
        revealed: &BTreeMap<usize, Scalar>,
        challenge: Challenge,
    ) -> Result<bool, Error> {
        let pairing_holds =
            pairing(&self.a_prime, &public_key.w) == pairing(&self.a_bar, &params.g2);
        Ok(pairing_holds && self.verify_schnorr(&Generators::from(params), revealed, challenge)?)
    }

    /// Check the publicly verifiable part of the proof of a MAC against the `revealed` messages.
    ///
    /// The proof is only complete once the secret key holder has also accepted
    /// [`BbsPlusSignatureProof::keyed_proof`].
    pub fn verify_knowledge_of_mac(
        &self,
        params: &mac::Params,
        revealed: &BTreeMap<usize, Scalar>,
        challenge: Challenge,
    ) -> Result<bool, Error> {
        self.verify_schnorr(&Generators::from(params), revealed, challenge)
    }

    /// The part of the proof that only the secret key holder can check.
    pub fn keyed_proof(&self) -> KeyedProof {
        KeyedProof {
            a_prime: self.a_prime,
            a_bar: self.a_bar,
        }
    }

    fn verify_schnorr(
        &self,
        generators: &Generators<'_>,
        revealed: &BTreeMap<usize, Scalar>,
        challenge: Challenge,
    ) -> Result<bool, Error> {
        check_indices(generators.hs.len(), revealed)?;
        let hidden = hidden_indices(generators.hs.len(), revealed);

        let well_formed = !bool::from(self.a_prime.is_identity());
        let valid_randomness = self.randomness_proof.verify_knowledge_of_opening(
            &generators.randomness_parameters(self.a_prime),
            Commitment::from_element(G1Projective::from(self.a_bar) - self.d),
            challenge,
        )?;
        let valid_messages = self.message_proof.verify_knowledge_of_opening(
            &generators.message_parameters(self.d, &hidden),
            generators.revealed_target(revealed),
            challenge,
        )?;

        Ok(well_formed && valid_randomness && valid_messages)
    }

    /// Get the response scalars corresponding to the hidden messages to verify conjunctions of
    /// proofs.
    pub fn conjunction_response_scalars(&self) -> &[Scalar] {
        self.message_proof
            .conjunction_response_scalars()
            .get(1..)
            .unwrap_or(&[])
    }
}

impl ChallengeInput for BbsPlusSignatureProof {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.a_prime);
        builder.consume(&self.a_bar);
        builder.consume(&self.d);
        builder.consume(&self.randomness_proof);
        builder.consume(&self.message_proof);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::rng;

    fn challenge_for(revealed: &BTreeMap<usize, Scalar>, builder: &BbsPlusSignatureProofBuilder) -> Challenge {
        ChallengeBuilder::new().with(revealed).with(builder).finish()
    }

    #[test]
    fn bbs_plus_proof_verifies() {
        let mut rng = rng();
        let params = bbs_plus::Params::new(&mut rng, 5);
        let kp = bbs_plus::KeyPair::new(&mut rng, &params);
        let msg = Message::random(&mut rng, 5);
        let sig = kp.try_sign(&mut rng, &params, &msg).unwrap();

        for revealed_indices in &[vec![], vec![1, 4], vec![0, 1, 2, 3, 4]] {
            let (revealed, hidden) = msg.split(revealed_indices).unwrap();
            let builder = BbsPlusSignatureProofBuilder::generate_proof_commitments(
                &mut rng,
                &params,
                &revealed,
                &hidden,
                sig,
                &vec![None; hidden.len()],
            )
            .unwrap();
            let challenge = challenge_for(&revealed, &builder);
            let proof = builder.generate_proof_response(challenge).unwrap();
            assert!(proof
                .verify_knowledge_of_signature(&params, kp.public_key(), &revealed, challenge)
                .unwrap());
        }
    }

    #[test]
    fn bbs_plus_proof_fails_on_wrong_revealed_value_or_key() {
        let mut rng = rng();
        let params = bbs_plus::Params::new(&mut rng, 3);
        let kp = bbs_plus::KeyPair::new(&mut rng, &params);
        let other = bbs_plus::KeyPair::new(&mut rng, &params);
        let msg = Message::random(&mut rng, 3);
        let sig = kp.try_sign(&mut rng, &params, &msg).unwrap();

        let (mut revealed, hidden) = msg.split(&[0]).unwrap();
        let builder = BbsPlusSignatureProofBuilder::generate_proof_commitments(
            &mut rng, &params, &revealed, &hidden, sig, &[None, None],
        )
        .unwrap();
        let challenge = challenge_for(&revealed, &builder);
        let proof = builder.generate_proof_response(challenge).unwrap();

        assert!(!proof
            .verify_knowledge_of_signature(&params, other.public_key(), &revealed, challenge)
            .unwrap());
        let _ = revealed.insert(0, Scalar::random(&mut rng));
        assert!(!proof
            .verify_knowledge_of_signature(&params, kp.public_key(), &revealed, challenge)
            .unwrap());
    }

    #[test]
    fn mac_proof_verifies_with_keyed_check() {
        let mut rng = rng();
        let params = mac::Params::new(&mut rng, 4);
        let kp = mac::KeyPair::new(&mut rng, &params);
        let other = mac::KeyPair::new(&mut rng, &params);
        let msg = Message::random(&mut rng, 4);
        let mac = kp.try_mac(&mut rng, &params, &msg).unwrap();

        let (revealed, hidden) = msg.split(&[2]).unwrap();
        let builder = BbsPlusSignatureProofBuilder::generate_mac_proof_commitments(
            &mut rng,
            &params,
            &revealed,
            &hidden,
            mac,
            &[None, None, None],
        )
        .unwrap();
        let challenge = challenge_for(&revealed, &builder);
        let proof = builder.generate_proof_response(challenge).unwrap();

        assert!(proof
            .verify_knowledge_of_mac(&params, &revealed, challenge)
            .unwrap());
        assert!(kp.secret_key().verify_keyed_proof(&proof.keyed_proof()));
        assert!(!other.secret_key().verify_keyed_proof(&proof.keyed_proof()));
    }

    #[test]
    fn shared_commitment_scalars_give_equal_responses() {
        let mut rng = rng();
        let params = bbs_plus::Params::new(&mut rng, 3);
        let kp = bbs_plus::KeyPair::new(&mut rng, &params);
        let msg = Message::random(&mut rng, 3);
        let sig = kp.try_sign(&mut rng, &params, &msg).unwrap();
        let shared = Scalar::random(&mut rng);

        let (revealed, hidden) = msg.split(&[]).unwrap();
        let builder = BbsPlusSignatureProofBuilder::generate_proof_commitments(
            &mut rng,
            &params,
            &revealed,
            &hidden,
            sig,
            &[None, Some(shared), None],
        )
        .unwrap();
        assert_eq!(builder.conjunction_commitment_scalars()[1], shared);

        let challenge = challenge_for(&revealed, &builder);
        let proof = builder.generate_proof_response(challenge).unwrap();
        assert_eq!(
            proof.conjunction_response_scalars()[1],
            shared + challenge.to_scalar() * msg[1]
        );
    }
}
