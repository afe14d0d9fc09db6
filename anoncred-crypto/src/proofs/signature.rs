//! Proof of knowledge of a Pointcheval Sanders signature, with some messages revealed.
//!
//! The signature is blinded and randomized, and the hidden messages are committed to in G2 using
//! the same blinding factor. The verifier folds the revealed messages into the pairing check
//! itself, so only the hidden messages take part in the Schnorr proof.

use crate::{
    common::*,
    pedersen::Commitment,
    pointcheval_sanders::{BlindedSignature, PublicKey, Signature},
    proofs::{
        check_indices, hidden_indices, Challenge, ChallengeBuilder,
        ChallengeInput, CommitmentProof, CommitmentProofBuilder,
    },
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fully constructed proof of knowledge of a signature.
/// (that is, of a [`Signature`] and the hidden entries of the underlying [`Message`] tuple).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureProof {
    /// Commitment to the hidden messages, using the blinding factor of the signature.
    message_commitment: Commitment<G2Projective>,
    /// Blinded, randomized version of the signature.
    blinded_signature: BlindedSignature,
    /// Proof of knowledge of opening of the `message_commitment`.
    commitment_proof: CommitmentProof<G2Projective>,
}

/// A partially-built [`SignatureProof`].
///
/// Built up to (but not including) the challenge phase of a Schnorr proof.
#[derive(Debug, Clone)]
pub struct SignatureProofBuilder {
    /// The hidden messages, in index order.
    hidden_messages: Message,
    /// Commitment to the hidden messages.
    message_commitment: Commitment<G2Projective>,
    /// Blinding factor for the `message_commitment` and the signature.
    message_blinding_factor: BlindingFactor,
    /// Randomized and blinded version of the original signature.
    blinded_signature: BlindedSignature,
    /// Commitment phase output for the underlying proof of knowledge of the opening of the
    /// `message_commitment`.
    commitment_proof_builder: CommitmentProofBuilder<G2Projective>,
}

impl SignatureProofBuilder {
    /// Run the commitment phase of a Schnorr-style signature proof
    /// to prove knowledge of the `hidden` messages and the `signature`.
    ///
    /// `hidden` holds every message index the verifier will not learn. The
    /// `conjunction_commitment_scalars` argument is aligned with the entries of `hidden` in index
    /// order and allows the caller to choose particular commitment scalars to create additional
    /// constraints.
    pub fn generate_proof_commitments(
        rng: &mut impl Rng,
        hidden: &BTreeMap<usize, Scalar>,
        signature: Signature,
        conjunction_commitment_scalars: &[Option<Scalar>],
        public_key: &PublicKey,
    ) -> Result<Self, Error> {
        check_indices(public_key.message_count(), hidden)?;
        let indices: Vec<usize> = hidden.keys().copied().collect();
        let params = public_key.to_g2_pedersen_parameters(&indices)?;
        let hidden_messages = Message::new(hidden.values().copied().collect());

        // Commitment phase of PoK of the hidden messages (using signature parameters).
        let commitment_proof_builder = CommitmentProofBuilder::generate_proof_commitments(
            rng,
            conjunction_commitment_scalars,
            &params,
        )?;

        // Blind and randomize signature
        let message_blinding_factor = BlindingFactor::new(&mut *rng);
        let mut blinded_signature = BlindedSignature::blind(signature, message_blinding_factor);
        blinded_signature.randomize(rng);

        let message_commitment = params.commit(&hidden_messages, message_blinding_factor)?;

        Ok(Self {
            hidden_messages,
            message_commitment,
            message_blinding_factor,
            blinded_signature,
            commitment_proof_builder,
        })
    }

    /// Get the commitment scalars corresponding to the hidden messages to use when constructing
    /// conjunctions of proofs.
    ///
    /// This does not include the commitment scalar corresponding to the blinding factor.
    pub fn conjunction_commitment_scalars(&self) -> &[Scalar] {
        self.commitment_proof_builder
            .conjunction_commitment_scalars()
    }

    /// Executes the response phase of a Schnorr-style signature proof to complete the proof.
    pub fn generate_proof_response(self, challenge: Challenge) -> Result<SignatureProof, Error> {
        // Run response phase for PoK of opening of commitment to message
        let commitment_proof = self.commitment_proof_builder.generate_proof_response(
            &self.hidden_messages,
            self.message_blinding_factor,
            challenge,
        )?;

        Ok(SignatureProof {
            message_commitment: self.message_commitment,
            blinded_signature: self.blinded_signature,
            commitment_proof,
        })
    }
}

impl ChallengeInput for SignatureProofBuilder {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.message_commitment);
        builder.consume(&self.blinded_signature);
        builder.consume(&self.commitment_proof_builder);
    }
}

impl SignatureProof {
    /// Check that a [`SignatureProof`] is valid for the given `revealed` messages.
    ///
    /// Checks that:
    ///
    /// - the blinded signature is correctly formed (first element is non-identity)
    /// - the internal commitment proof is valid
    /// - the commitment, together with the revealed messages, matches the blinded signature
    pub fn verify_knowledge_of_signature(
        &self,
        public_key: &PublicKey,
        revealed: &BTreeMap<usize, Scalar>,
        challenge: Challenge,
    ) -> Result<bool, Error> {
        check_indices(public_key.message_count(), revealed)?;
        let hidden = hidden_indices(public_key.message_count(), revealed);
        let params = public_key.to_g2_pedersen_parameters(&hidden)?;

        // signature is well-formed
        let valid_signature = self.blinded_signature.is_well_formed();

        // commitment proof is valid
        let valid_commitment_proof = self.commitment_proof.verify_knowledge_of_opening(
            &params,
            self.message_commitment,
            challenge,
        )?;

        // commitment proof matches blinded signature
        let revealed_combination = revealed
            .iter()
            .map(|(&i, mi)| public_key.y2s[i] * mi)
            .sum::<G2Projective>();
        let lhs = public_key.x2 + self.message_commitment.to_element() + revealed_combination;
        let commitment_proof_matches_signature =
            pairing(&self.blinded_signature.sigma1(), &lhs.into())
                == pairing(&self.blinded_signature.sigma2(), &public_key.g2);

        Ok(valid_signature && valid_commitment_proof && commitment_proof_matches_signature)
    }

    /// Get the response scalars corresponding to the hidden messages to verify conjunctions of
    /// proofs.
    ///
    /// This does not include the response scalar for the blinding factor.
    pub fn conjunction_response_scalars(&self) -> &[Scalar] {
        self.commitment_proof.conjunction_response_scalars()
    }
}

impl ChallengeInput for SignatureProof {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.message_commitment);
        builder.consume(&self.blinded_signature);
        builder.consume(&self.commitment_proof);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        pointcheval_sanders::{KeyPair, Params},
        test::rng,
    };
    use ff::Field;

    fn prove(
        rng: &mut impl Rng,
        kp: &KeyPair,
        msg: &Message,
        revealed_indices: &[usize],
    ) -> (BTreeMap<usize, Scalar>, Challenge, SignatureProof) {
        let sig = kp.try_sign(rng, msg).unwrap();
        let (revealed, hidden) = msg.split(revealed_indices).unwrap();
        let builder = SignatureProofBuilder::generate_proof_commitments(
            rng,
            &hidden,
            sig,
            &vec![None; hidden.len()],
            kp.public_key(),
        )
        .unwrap();
        let challenge = ChallengeBuilder::new()
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
    fn signature_proof_with_revealed_messages_verifies() {
        let mut rng = rng();
        let params = Params::new(&mut rng);
        let kp = KeyPair::new(&mut rng, &params, 4);
        let msg = Message::random(&mut rng, 4);

        let (revealed, challenge, proof) = prove(&mut rng, &kp, &msg, &[1, 3]);
        assert!(proof
            .verify_knowledge_of_signature(kp.public_key(), &revealed, challenge)
            .unwrap());
    }

    #[test]
    fn signature_proof_with_nothing_revealed_verifies() {
        let mut rng = rng();
        let params = Params::new(&mut rng);
        let kp = KeyPair::new(&mut rng, &params, 3);
        let msg = Message::random(&mut rng, 3);

        let (revealed, challenge, proof) = prove(&mut rng, &kp, &msg, &[]);
        assert!(proof
            .verify_knowledge_of_signature(kp.public_key(), &revealed, challenge)
            .unwrap());
    }

    #[test]
    fn signature_proof_fails_on_wrong_revealed_value() {
        let mut rng = rng();
        let params = Params::new(&mut rng);
        let kp = KeyPair::new(&mut rng, &params, 4);
        let msg = Message::random(&mut rng, 4);

        let (mut revealed, challenge, proof) = prove(&mut rng, &kp, &msg, &[0]);
        let _ = revealed.insert(0, Scalar::random(&mut rng));
        assert!(!proof
            .verify_knowledge_of_signature(kp.public_key(), &revealed, challenge)
            .unwrap());
    }

    #[test]
    fn signature_proof_fails_under_other_key() {
        let mut rng = rng();
        let params = Params::new(&mut rng);
        let kp = KeyPair::new(&mut rng, &params, 3);
        let other = KeyPair::new(&mut rng, &params, 3);
        let msg = Message::random(&mut rng, 3);

        let (revealed, challenge, proof) = prove(&mut rng, &kp, &msg, &[2]);
        assert!(!proof
            .verify_knowledge_of_signature(other.public_key(), &revealed, challenge)
            .unwrap());
    }
}
