//! Proof of knowledge of the opening of a Pedersen commitment.

use crate::{
    common::*,
    pedersen::{Commitment, PedersenParameters},
    proofs::{Challenge, ChallengeBuilder, ChallengeInput},
    serde::SerializeElement,
};
use ff::Field;
use serde::{Deserialize, Serialize};

/// Fully constructed proof of knowledge of the opening of a commitment.
///
/// The commitment itself is part of the statement and is supplied again at verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "G: SerializeElement")]
pub struct CommitmentProof<G: Group<Scalar = Scalar>> {
    /// The commitment to the commitment scalars.
    scalar_commitment: Commitment<G>,
    /// The response scalar for the blinding factor, followed by the response scalars for the
    /// message.
    #[serde(with = "SerializeElement")]
    response_scalars: Vec<Scalar>,
}

impl<G: Group<Scalar = Scalar>> CommitmentProof<G> {
    /// Verify knowledge of the opening of `commitment` under `pedersen_params`.
    pub fn verify_knowledge_of_opening(
        &self,
        pedersen_params: &PedersenParameters<G>,
        commitment: Commitment<G>,
        challenge: Challenge,
    ) -> Result<bool, Error> {
        let expected = pedersen_params.message_len() + 1;
        if self.response_scalars.len() != expected {
            return Err(Error::MessageLengthMismatch {
                expected,
                got: self.response_scalars.len(),
            });
        }

        // Construct commitment to response scalars.
        let rhs = pedersen_params.commit(
            &Message::new(self.response_scalars[1..].to_vec()),
            BlindingFactor::from_scalar(self.response_scalars[0]),
        )?;

        let expected_commitment =
            self.scalar_commitment.to_element() + commitment.to_element() * challenge.to_scalar();

        Ok(rhs.to_element() == expected_commitment)
    }

    /// Get the response scalars corresponding to the message to verify conjunctions of proofs.
    ///
    /// This does not include the response scalar for the blinding factor.
    pub fn conjunction_response_scalars(&self) -> &[Scalar] {
        self.response_scalars.get(1..).unwrap_or(&[])
    }
}

impl<G: Group<Scalar = Scalar> + GroupEncoding> ChallengeInput for CommitmentProof<G> {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.scalar_commitment);
    }
}

/// A partially-built [`CommitmentProof`].
///
/// Built up to (but not including) the challenge phase of a Schnorr proof.
#[derive(Debug, Clone)]
pub struct CommitmentProofBuilder<G: Group<Scalar = Scalar>> {
    /// Commitment to the commitment scalars.
    scalar_commitment: Commitment<G>,
    /// The commitment scalar for the blinding factor, followed by the commitment scalars for the
    /// message.
    commitment_scalars: Vec<Scalar>,
}

impl<G: Group<Scalar = Scalar>> CommitmentProofBuilder<G> {
    /// Run the commitment phase of a Schnorr-style commitment proof.
    ///
    /// The `conjunction_commitment_scalars` argument allows the caller to choose particular
    /// commitment scalars for the message tuple. This allows them to express constraints among
    /// messages in one or more proof objects. For example, equality of two message elements is
    /// enforced by using the same commitment scalar for those elements.
    pub fn generate_proof_commitments(
        rng: &mut impl Rng,
        conjunction_commitment_scalars: &[Option<Scalar>],
        pedersen_params: &PedersenParameters<G>,
    ) -> Result<Self, Error> {
        if conjunction_commitment_scalars.len() != pedersen_params.message_len() {
            return Err(Error::MessageLengthMismatch {
                expected: pedersen_params.message_len(),
                got: conjunction_commitment_scalars.len(),
            });
        }

        // Choose commitment scalars (that haven't already been specified)
        let blinding_factor_commitment_scalar = Scalar::random(&mut *rng);
        let message_commitment_scalars: Vec<Scalar> = conjunction_commitment_scalars
            .iter()
            .map(|&maybe_scalar| maybe_scalar.unwrap_or_else(|| Scalar::random(&mut *rng)))
            .collect();

        // Commit to the scalars
        let scalar_commitment = pedersen_params.commit(
            &Message::new(message_commitment_scalars.clone()),
            BlindingFactor::from_scalar(blinding_factor_commitment_scalar),
        )?;

        let mut commitment_scalars = Vec::with_capacity(message_commitment_scalars.len() + 1);
        commitment_scalars.push(blinding_factor_commitment_scalar);
        commitment_scalars.extend(message_commitment_scalars);

        Ok(Self {
            scalar_commitment,
            commitment_scalars,
        })
    }

    /// Get the commitment scalars corresponding to the message tuple to use when constructing
    /// conjunctions of proofs.
    ///
    /// This does not include the commitment scalar corresponding to the blinding factor.
    pub fn conjunction_commitment_scalars(&self) -> &[Scalar] {
        &self.commitment_scalars[1..]
    }

    /// Run the response phase of the Schnorr-style commitment proof to complete the proof.
    ///
    /// `msg` and `bf` are the opening of the commitment the proof is about.
    pub fn generate_proof_response(
        self,
        msg: &Message,
        bf: BlindingFactor,
        challenge: Challenge,
    ) -> Result<CommitmentProof<G>, Error> {
        if msg.len() + 1 != self.commitment_scalars.len() {
            return Err(Error::MessageLengthMismatch {
                expected: self.commitment_scalars.len() - 1,
                got: msg.len(),
            });
        }

        // Generate response scalars.
        let response_scalars = std::iter::once(&bf.to_scalar())
            .chain(msg.iter())
            .zip(&self.commitment_scalars)
            .map(|(mi, cs)| challenge.to_scalar() * mi + cs)
            .collect();

        Ok(CommitmentProof {
            scalar_commitment: self.scalar_commitment,
            response_scalars,
        })
    }
}

impl<G: Group<Scalar = Scalar> + GroupEncoding> ChallengeInput for CommitmentProofBuilder<G> {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.scalar_commitment);
    }
}
