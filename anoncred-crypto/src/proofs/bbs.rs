//! Proof of knowledge of a BBS signature, with some messages revealed.
//!
//! The signature is randomized into `(Abar, Bbar, D)` with `Bbar = Abar·x`, which the verifier
//! checks with one pairing equation. Two Schnorr proofs over `D` then show the prover knows the
//! signature randomness and the hidden messages:
//!
//! - `Bbar = D·r1 + Abar·(-e)`
//! - `g1 + Σ_revealed h_i·m_i = D·r3 + Σ_hidden (-h_j)·m_j`

use crate::{
    bbs::{Params, PublicKey, Signature},
    common::*,
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

/// Fully constructed proof of knowledge of a BBS signature and the hidden messages it covers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BbsSignatureProof {
    #[serde(with = "SerializeElement")]
    a_bar: G1Affine,
    #[serde(with = "SerializeElement")]
    b_bar: G1Affine,
    #[serde(with = "SerializeElement")]
    d: G1Affine,
    /// Proof of knowledge of `r1` and `e`.
    randomness_proof: CommitmentProof<G1Projective>,
    /// Proof of knowledge of `r3` and the hidden messages.
    message_proof: CommitmentProof<G1Projective>,
}

/// A partially-built [`BbsSignatureProof`].
///
/// Built up to (but not including) the challenge phase of a Schnorr proof.
#[derive(Debug, Clone)]
pub struct BbsSignatureProofBuilder {
    hidden_messages: Message,
    a_bar: G1Affine,
    b_bar: G1Affine,
    d: G1Affine,
    r1: Scalar,
    r3: Scalar,
    minus_e: Scalar,
    randomness_proof_builder: CommitmentProofBuilder<G1Projective>,
    message_proof_builder: CommitmentProofBuilder<G1Projective>,
}

fn randomness_parameters(d: G1Affine, a_bar: G1Affine) -> PedersenParameters<G1Projective> {
    PedersenParameters::from_generators(d.into(), vec![a_bar.into()])
}

fn message_parameters(
    params: &Params,
    d: G1Affine,
    hidden: &[usize],
) -> PedersenParameters<G1Projective> {
    PedersenParameters::from_generators(
        d.into(),
        hidden.iter().map(|&j| -G1Projective::from(params.hs[j])).collect(),
    )
}

/// `g1 + Σ_revealed h_i·m_i`, the target of the message relation.
fn revealed_target(params: &Params, revealed: &BTreeMap<usize, Scalar>) -> Commitment<G1Projective> {
    let combination = revealed
        .iter()
        .map(|(&i, m)| params.hs[i] * m)
        .sum::<G1Projective>();
    Commitment::from_element(params.g1 + combination)
}

impl BbsSignatureProofBuilder {
    /// Run the commitment phase of a proof of knowledge of `signature` on the message made of
    /// `revealed` and `hidden`, which must split `0..params.message_count()`.
    ///
    /// `conjunction_commitment_scalars` is aligned with `hidden` in index order.
    pub fn generate_proof_commitments(
        rng: &mut impl Rng,
        params: &Params,
        revealed: &BTreeMap<usize, Scalar>,
        hidden: &BTreeMap<usize, Scalar>,
        signature: Signature,
        conjunction_commitment_scalars: &[Option<Scalar>],
    ) -> Result<Self, Error> {
        check_partition(params.message_count(), revealed, hidden)?;
        let msg: Vec<Scalar> = (0..params.message_count())
            .map(|i| revealed.get(&i).or_else(|| hidden.get(&i)).copied())
            .collect::<Option<_>>()
            .ok_or(Error::MessageLengthMismatch {
                expected: params.message_count(),
                got: revealed.len() + hidden.len(),
            })?;

        let r1 = random_nonzero_scalar(&mut *rng);
        let (r2, r3) = loop {
            let r2 = Scalar::random(&mut *rng);
            if let Some(r3) = invert(r2) {
                break (r2, r3);
            }
        };

        let b = params.signed_value(&msg);
        let d: G1Affine = (b * r2).into();
        let a_bar: G1Affine = (signature.a * (r1 * r2)).into();
        let b_bar: G1Affine = (d * r1 - a_bar * signature.e).into();

        let hidden_idx: Vec<usize> = hidden.keys().copied().collect();
        let randomness_proof_builder = CommitmentProofBuilder::generate_proof_commitments(
            rng,
            &[None],
            &randomness_parameters(d, a_bar),
        )?;
        let message_proof_builder = CommitmentProofBuilder::generate_proof_commitments(
            rng,
            conjunction_commitment_scalars,
            &message_parameters(params, d, &hidden_idx),
        )?;

        Ok(Self {
            hidden_messages: Message::new(hidden.values().copied().collect()),
            a_bar,
            b_bar,
            d,
            r1,
            r3,
            minus_e: -signature.e,
            randomness_proof_builder,
            message_proof_builder,
        })
    }

    /// Get the commitment scalars corresponding to the hidden messages to use when constructing
    /// conjunctions of proofs.
    pub fn conjunction_commitment_scalars(&self) -> &[Scalar] {
        self.message_proof_builder.conjunction_commitment_scalars()
    }

    /// Executes the response phase of a Schnorr-style signature proof to complete the proof.
    pub fn generate_proof_response(self, challenge: Challenge) -> Result<BbsSignatureProof, Error> {
        let randomness_proof = self.randomness_proof_builder.generate_proof_response(
            &Message::from(self.minus_e),
            BlindingFactor::from_scalar(self.r1),
            challenge,
        )?;
        let message_proof = self.message_proof_builder.generate_proof_response(
            &self.hidden_messages,
            BlindingFactor::from_scalar(self.r3),
            challenge,
        )?;
        Ok(BbsSignatureProof {
            a_bar: self.a_bar,
            b_bar: self.b_bar,
            d: self.d,
            randomness_proof,
            message_proof,
        })
    }
}

impl ChallengeInput for BbsSignatureProofBuilder {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.a_bar);
        builder.consume(&self.b_bar);
        builder.consume(&self.d);
        builder.consume(&self.randomness_proof_builder);
        builder.consume(&self.message_proof_builder);
    }
}

impl BbsSignatureProof {
    /// Check the proof against the `revealed` messages.
    pub fn verify_knowledge_of_signature(
        &self,
        params: &Params,
        public_key: &PublicKey,
        revealed: &BTreeMap<usize, Scalar>,
        challenge: Challenge,
    ) -> Result<bool, Error> {
        check_indices(params.message_count(), revealed)?;
        let hidden = hidden_indices(params.message_count(), revealed);

        let well_formed = !bool::from(self.a_bar.is_identity());
        let pairing_holds =
            pairing(&self.a_bar, &public_key.w) == pairing(&self.b_bar, &params.g2);

        let valid_randomness = self.randomness_proof.verify_knowledge_of_opening(
            &randomness_parameters(self.d, self.a_bar),
            Commitment::from_element(self.b_bar.into()),
            challenge,
        )?;
        let valid_messages = self.message_proof.verify_knowledge_of_opening(
            &message_parameters(params, self.d, &hidden),
            revealed_target(params, revealed),
            challenge,
        )?;

        Ok(well_formed && pairing_holds && valid_randomness && valid_messages)
    }

    /// Get the response scalars corresponding to the hidden messages to verify conjunctions of
    /// proofs.
    pub fn conjunction_response_scalars(&self) -> &[Scalar] {
        self.message_proof.conjunction_response_scalars()
    }
}

impl ChallengeInput for BbsSignatureProof {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.a_bar);
        builder.consume(&self.b_bar);
        builder.consume(&self.d);
        builder.consume(&self.randomness_proof);
        builder.consume(&self.message_proof);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{bbs::KeyPair, test::rng};

    fn prove(
        rng: &mut impl Rng,
        params: &Params,
        kp: &KeyPair,
        msg: &Message,
        revealed_indices: &[usize],
    ) -> (BTreeMap<usize, Scalar>, Challenge, BbsSignatureProof) {
        let sig = kp.try_sign(rng, params, msg).unwrap();
        let (revealed, hidden) = msg.split(revealed_indices).unwrap();
        let builder = BbsSignatureProofBuilder::generate_proof_commitments(
            rng,
            params,
            &revealed,
            &hidden,
            sig,
            &vec![None; hidden.len()],
        )
        .unwrap();
        let challenge = ChallengeBuilder::new()
            .with(params)
            .with(kp.public_key())
            .with(&revealed)
            .with(&builder)
            .finish();
        (
            revealed,
            challenge,
            builder.generate_proof_response(challenge).unwrap(),
        )
    }

    #[test]
    fn bbs_proof_verifies() {
        let mut rng = rng();
        let params = Params::new(&mut rng, 5);
        let kp = KeyPair::new(&mut rng, &params);
        let msg = Message::random(&mut rng, 5);

        for revealed_indices in &[vec![], vec![0, 3], vec![0, 1, 2, 3, 4]] {
            let (revealed, challenge, proof) = prove(&mut rng, &params, &kp, &msg, revealed_indices);
            assert!(proof
                .verify_knowledge_of_signature(&params, kp.public_key(), &revealed, challenge)
                .unwrap());
        }
    }

    #[test]
    fn bbs_proof_fails_on_wrong_revealed_value() {
        let mut rng = rng();
        let params = Params::new(&mut rng, 4);
        let kp = KeyPair::new(&mut rng, &params);
        let msg = Message::random(&mut rng, 4);

        let (mut revealed, challenge, proof) = prove(&mut rng, &params, &kp, &msg, &[2]);
        let _ = revealed.insert(2, Scalar::random(&mut rng));
        assert!(!proof
            .verify_knowledge_of_signature(&params, kp.public_key(), &revealed, challenge)
            .unwrap());
    }

    #[test]
    fn bbs_proof_fails_under_other_key() {
        let mut rng = rng();
        let params = Params::new(&mut rng, 3);
        let kp = KeyPair::new(&mut rng, &params);
        let other = KeyPair::new(&mut rng, &params);
        let msg = Message::random(&mut rng, 3);

        let (revealed, challenge, proof) = prove(&mut rng, &params, &kp, &msg, &[0]);
        assert!(!proof
            .verify_knowledge_of_signature(&params, other.public_key(), &revealed, challenge)
            .unwrap());
    }

    #[test]
    fn bbs_builder_rejects_bad_partition() {
        let mut rng = rng();
        let params = Params::new(&mut rng, 3);
        let kp = KeyPair::new(&mut rng, &params);
        let msg = Message::random(&mut rng, 3);
        let sig = kp.try_sign(&mut rng, &params, &msg).unwrap();
        let (revealed, mut hidden) = msg.split(&[0]).unwrap();
        let _ = hidden.remove(&2);

        assert!(BbsSignatureProofBuilder::generate_proof_commitments(
            &mut rng,
            &params,
            &revealed,
            &hidden,
            sig,
            &[None],
        )
        .is_err());
    }
}
