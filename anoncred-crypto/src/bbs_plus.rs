//! BBS+ signatures over BLS12-381, with blind issuance.
//!
//! A signature is a triple `(A, e, s)` with `A = (g1 + h0·s + Σ h_i·m_i) · 1/(x + e)`. The extra
//! randomness `s` lets a holder hide some messages from the issuer: the holder commits to them
//! under `h0`, and the issuer folds its own share of `s` into the signature.
//!
//! See Au, Susilo and Mu, "Constant-Size Dynamic k-TAA" (SCN 2006), and Camenisch, Drijvers and
//! Lehmann, ["Anonymous Attestation Using the Strong Diffie Hellman Assumption
//! Revisited"](https://eprint.iacr.org/2016/663).

use crate::{
    common::*,
    generators,
    pedersen::{inner_product, Commitment, PedersenParameters},
    proofs::{ChallengeBuilder, ChallengeInput},
    serde::SerializeElement,
};
use ff::Field;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Public parameters for BBS+ signatures over messages of a fixed length.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Params {
    #[serde(with = "SerializeElement")]
    pub(crate) g1: G1Affine,
    #[serde(with = "SerializeElement")]
    pub(crate) g2: G2Affine,
    /// Generator for the signature randomness `s`.
    #[serde(with = "SerializeElement")]
    pub(crate) h0: G1Affine,
    #[serde(with = "SerializeElement")]
    pub(crate) hs: Vec<G1Affine>,
}

impl Params {
    /// Generate parameters for `length` messages uniformly at random.
    pub fn new(rng: &mut impl Rng, length: usize) -> Self {
        let g1: G1Projective = random_non_identity(&mut *rng);
        let g2: G2Projective = random_non_identity(&mut *rng);
        let h0: G1Projective = random_non_identity(&mut *rng);
        let hs = (0..length)
            .map(|_| random_non_identity::<G1Projective>(&mut *rng).into())
            .collect();
        Self {
            g1: g1.into(),
            g2: g2.into(),
            h0: h0.into(),
            hs,
        }
    }

    /// Derive parameters for `length` messages deterministically from a public label.
    pub fn generate_using_label(label: &[u8], length: usize) -> Self {
        Self {
            g1: generators::derive::<G1Projective>(label, b"BBS+ g1", 0).into(),
            g2: generators::derive::<G2Projective>(label, b"BBS+ g2", 0).into(),
            h0: generators::derive::<G1Projective>(label, b"BBS+ h0", 0).into(),
            hs: generators::derive_many::<G1Projective>(label, b"BBS+ h", length)
                .into_iter()
                .map(Into::into)
                .collect(),
        }
    }

    /// The number of messages these parameters sign.
    pub fn message_count(&self) -> usize {
        self.hs.len()
    }

    /// Pedersen parameters a holder uses to commit to the messages at `hidden_indices` before
    /// blind issuance: `h0` blinds, and the message generators at those indices bind.
    pub fn commitment_parameters(
        &self,
        hidden_indices: &BTreeSet<usize>,
    ) -> Result<PedersenParameters<G1Projective>, Error> {
        let gs = hidden_indices
            .iter()
            .map(|&i| {
                self.hs
                    .get(i)
                    .map(G1Projective::from)
                    .ok_or(Error::IndexOutOfRange {
                        index: i,
                        length: self.hs.len(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PedersenParameters::from_generators(self.h0.into(), gs))
    }

    /// Compute `g1 + h0·s + Σ h_i·m_i`; callers check the message length.
    pub(crate) fn signed_value(&self, msg: &[Scalar], s: Scalar) -> G1Projective {
        let hs: Vec<G1Projective> = self.hs.iter().map(G1Projective::from).collect();
        self.g1 + self.h0 * s + inner_product(&hs, msg)
    }

    fn check_length(&self, msg: &Message) -> Result<(), Error> {
        if msg.len() != self.hs.len() {
            return Err(Error::MessageLengthMismatch {
                expected: self.hs.len(),
                got: msg.len(),
            });
        }
        Ok(())
    }
}

impl ChallengeInput for Params {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.g1);
        builder.consume(&self.g2);
        builder.consume(&self.h0);
        builder.consume(self.hs.as_slice());
    }
}

#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
pub(crate) struct SecretKey(#[serde(with = "SerializeElement")] Scalar);

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(<private>)")
    }
}

/// BBS+ public key `w = g2·x`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct PublicKey {
    #[serde(with = "SerializeElement")]
    pub(crate) w: G2Affine,
}

/// A keypair formed from a `SecretKey` and a [`PublicKey`].
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyPair {
    sk: SecretKey,
    pk: PublicKey,
}

impl KeyPair {
    /// Generate a new `KeyPair` under the given parameters.
    pub fn new(rng: &mut impl Rng, params: &Params) -> Self {
        let x = random_nonzero_scalar(rng);
        KeyPair {
            sk: SecretKey(x),
            pk: PublicKey {
                w: (params.g2 * x).into(),
            },
        }
    }

    /// Get the public portion of the `KeyPair`
    pub fn public_key(&self) -> &PublicKey {
        &self.pk
    }

    /// Sign a message.
    pub fn try_sign(
        &self,
        rng: &mut impl Rng,
        params: &Params,
        msg: &Message,
    ) -> Result<Signature, Error> {
        params.check_length(msg)?;
        let s = Scalar::random(&mut *rng);
        let (a, e) = self.sign_value(rng, params.signed_value(msg, s));
        Ok(Signature { a, e, s })
    }

    /// Sign a message, some of whose entries are hidden inside `commitment`.
    ///
    /// `commitment` must have been formed under [`Params::commitment_parameters`] for exactly the
    /// `blinded` indices; `known` supplies every other message. The commitment is taken at face
    /// value here, so callers should first check a proof of knowledge of its opening.
    pub fn blind_sign(
        &self,
        rng: &mut impl Rng,
        params: &Params,
        commitment: &Commitment<G1Projective>,
        blinded: &BTreeSet<usize>,
        known: &BTreeMap<usize, Scalar>,
    ) -> Result<BlindSignature, Error> {
        let length = params.message_count();
        let covers = blinded.len() + known.len() == length
            && blinded.iter().all(|i| *i < length && !known.contains_key(i))
            && known.keys().all(|i| *i < length);
        if blinded.is_empty() || !covers {
            return Err(Error::InvalidBlindingIndices { length });
        }

        let s = Scalar::random(&mut *rng);
        let known_combination = known
            .iter()
            .map(|(&i, m)| params.hs[i] * m)
            .sum::<G1Projective>();
        let b = params.g1 + commitment.to_element() + params.h0 * s + known_combination;
        let (a, e) = self.sign_value(rng, b);
        Ok(BlindSignature(Signature { a, e, s }))
    }

    fn sign_value(&self, rng: &mut impl Rng, b: G1Projective) -> (G1Affine, Scalar) {
        loop {
            let e = Scalar::random(&mut *rng);
            if let Some(inverse) = invert(self.sk.0 + e) {
                return ((b * inverse).into(), e);
            }
        }
    }
}

impl PublicKey {
    /// Verify a signature on a given message.
    pub fn verify(&self, params: &Params, msg: &Message, sig: &Signature) -> bool {
        if params.check_length(msg).is_err() || bool::from(sig.a.is_identity()) {
            return false;
        }
        let b = params.signed_value(msg, sig.s);
        let lhs = self.w + params.g2 * sig.e;
        pairing(&sig.a, &lhs.into()) == pairing(&b.into(), &params.g2)
    }
}

impl ChallengeInput for PublicKey {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.w);
    }
}

/// A BBS+ signature `(A, e, s)`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(with = "SerializeElement")]
    pub(crate) a: G1Affine,
    #[serde(with = "SerializeElement")]
    pub(crate) e: Scalar,
    #[serde(with = "SerializeElement")]
    pub(crate) s: Scalar,
}

/// A signature on a partially hidden message. Its `s` is missing the holder's blinding factor.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlindSignature(Signature);

impl BlindSignature {
    /// Complete the signature using the blinding factor of the holder's commitment.
    pub fn unblind(self, bf: BlindingFactor) -> Signature {
        Signature {
            s: self.0.s + bf.to_scalar(),
            ..self.0
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::rng;

    #[test]
    fn verify_signed_message() {
        let mut rng = rng();
        let params = Params::new(&mut rng, 5);
        let kp = KeyPair::new(&mut rng, &params);
        let msg = Message::random(&mut rng, 5);

        let sig = kp.try_sign(&mut rng, &params, &msg).unwrap();
        assert!(
            kp.public_key().verify(&params, &msg, &sig),
            "Signature didn't verify!!"
        );
    }

    #[test]
    fn fail_verification_of_different_message() {
        let mut rng = rng();
        let params = Params::generate_using_label(b"bbs+ test", 3);
        let kp = KeyPair::new(&mut rng, &params);
        let msg = Message::random(&mut rng, 3);
        let bad_msg = Message::random(&mut rng, 3);

        let sig = kp.try_sign(&mut rng, &params, &msg).unwrap();
        assert!(!kp.public_key().verify(&params, &bad_msg, &sig));
    }

    #[test]
    fn fail_verification_with_tampered_randomness() {
        let mut rng = rng();
        let params = Params::new(&mut rng, 3);
        let kp = KeyPair::new(&mut rng, &params);
        let msg = Message::random(&mut rng, 3);

        let mut sig = kp.try_sign(&mut rng, &params, &msg).unwrap();
        sig.s += Scalar::one();
        assert!(!kp.public_key().verify(&params, &msg, &sig));
    }

    fn blind_round_trip(rng: &mut impl Rng, params: &Params, kp: &KeyPair, hidden: &[usize]) -> bool {
        let msg = Message::random(&mut *rng, params.message_count());
        let blinded: BTreeSet<usize> = hidden.iter().copied().collect();
        let (known, hidden_msgs) = msg
            .split(
                &(0..msg.len())
                    .filter(|i| !blinded.contains(i))
                    .collect::<Vec<_>>(),
            )
            .unwrap();

        let commitment_params = params.commitment_parameters(&blinded).unwrap();
        let bf = BlindingFactor::new(&mut *rng);
        let commitment = commitment_params
            .commit(&Message::new(hidden_msgs.values().copied().collect()), bf)
            .unwrap();

        let blind_sig = kp
            .blind_sign(rng, params, &commitment, &blinded, &known)
            .unwrap();
        kp.public_key().verify(params, &msg, &blind_sig.unblind(bf))
    }

    #[test]
    fn blind_signature_unblinds_to_valid_signature() {
        let mut rng = rng();
        let params = Params::new(&mut rng, 4);
        let kp = KeyPair::new(&mut rng, &params);

        assert!(blind_round_trip(&mut rng, &params, &kp, &[1, 2]));
        assert!(blind_round_trip(&mut rng, &params, &kp, &[0, 1, 2, 3]));
    }

    #[test]
    fn unblinding_with_wrong_factor_fails() {
        let mut rng = rng();
        let params = Params::new(&mut rng, 2);
        let kp = KeyPair::new(&mut rng, &params);
        let msg = Message::random(&mut rng, 2);
        let blinded: BTreeSet<usize> = [0].iter().copied().collect();
        let known: BTreeMap<usize, Scalar> = [(1, msg[1])].iter().copied().collect();

        let bf = BlindingFactor::new(&mut rng);
        let commitment = params
            .commitment_parameters(&blinded)
            .unwrap()
            .commit(&Message::from(msg[0]), bf)
            .unwrap();
        let blind_sig = kp
            .blind_sign(&mut rng, &params, &commitment, &blinded, &known)
            .unwrap();

        let wrong = BlindingFactor::new(&mut rng);
        assert!(!kp.public_key().verify(&params, &msg, &blind_sig.unblind(wrong)));
    }

    #[test]
    fn blind_sign_rejects_bad_index_sets() {
        let mut rng = rng();
        let params = Params::new(&mut rng, 3);
        let kp = KeyPair::new(&mut rng, &params);
        let commitment = Commitment::from_element(G1Projective::generator());
        let blinded: BTreeSet<usize> = [0].iter().copied().collect();
        let known: BTreeMap<usize, Scalar> = [(0, Scalar::one()), (2, Scalar::one())]
            .iter()
            .copied()
            .collect();

        assert_eq!(
            kp.blind_sign(&mut rng, &params, &commitment, &blinded, &known),
            Err(Error::InvalidBlindingIndices { length: 3 })
        );
        assert_eq!(
            kp.blind_sign(&mut rng, &params, &commitment, &BTreeSet::new(), &BTreeMap::new()),
            Err(Error::InvalidBlindingIndices { length: 3 })
        );
    }
}
