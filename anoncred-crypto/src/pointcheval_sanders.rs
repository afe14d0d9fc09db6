//! Randomizable multi-message Pointcheval-Sanders signatures, blinded signatures, and keys over
//! BLS12-381.
//!
//! The signature scheme used is defined in the 2016 paper, ["Short randomizable
//! signatures"](https://eprint.iacr.org/2015/525.pdf); The BLS12-381 curve is defined in the (now
//! expired) IRTF draft titled ["BLS
//! Signatures"](https://datatracker.ietf.org/doc/draft-irtf-cfrg-bls-signature/).
//!
//! Blind signing follows the per-message commitment variant used by Coconut: the holder commits to
//! the hidden messages, the signature base `h` is hashed from that commitment, and every hidden
//! message is additionally committed to under `h` so the signer can fold it into the signature
//! without learning it.

use crate::{
    common::*,
    generators,
    pedersen::{Commitment, PedersenParameters},
    proofs::{ChallengeBuilder, ChallengeInput},
    serde::SerializeElement,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::iter;

/// Generators shared by every Pointcheval-Sanders key derived from the same parameters.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// G1 generator (g)
    #[serde(with = "SerializeElement")]
    pub g1: G1Affine,
    /// G2 generator (g~)
    #[serde(with = "SerializeElement")]
    pub g2: G2Affine,
}

impl Params {
    /// Generate parameters uniformly at random from G1* and G2*.
    pub fn new(rng: &mut impl Rng) -> Self {
        let g1: G1Projective = random_non_identity(&mut *rng);
        let g2: G2Projective = random_non_identity(&mut *rng);
        Self {
            g1: g1.into(),
            g2: g2.into(),
        }
    }

    /// Derive parameters deterministically from a public label.
    pub fn generate_using_label(label: &[u8]) -> Self {
        Self {
            g1: generators::derive::<G1Projective>(label, b"PS g1", 0).into(),
            g2: generators::derive::<G2Projective>(label, b"PS g2", 0).into(),
        }
    }
}

impl ChallengeInput for Params {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.g1);
        builder.consume(&self.g2);
    }
}

/// Pointcheval-Sanders secret key for multi-message operations.
#[derive(Debug, Eq, PartialEq, Serialize, Deserialize)]
pub(crate) struct SecretKey {
    #[serde(with = "SerializeElement")]
    pub x: Scalar,
    #[serde(with = "SerializeElement")]
    pub ys: Vec<Scalar>,
    #[serde(with = "SerializeElement")]
    pub x1: G1Affine,
}

/// A public key for multi-message operations.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PublicKey {
    /// G1 generator (g)
    #[serde(with = "SerializeElement")]
    pub g1: G1Affine,
    /// Y_1 ... Y_l
    #[serde(with = "SerializeElement")]
    pub y1s: Vec<G1Affine>,
    /// G2 generator (g~)
    #[serde(with = "SerializeElement")]
    pub g2: G2Affine,
    /// X~
    #[serde(with = "SerializeElement")]
    pub x2: G2Affine,
    /// Y~_1 ... Y~_l
    #[serde(with = "SerializeElement")]
    pub y2s: Vec<G2Affine>,
}

/// A keypair formed from a `SecretKey` and a [`PublicKey`] for multi-message operations.
#[derive(Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyPair {
    /// Secret key for multi-message operations.
    sk: SecretKey,
    /// Public key for multi-message operations.
    pk: PublicKey,
}

impl SecretKey {
    /// Generate a new `SecretKey` of a given length, based on [`Scalar`]s chosen uniformly at
    /// random and the generator `g1` from G1.
    fn new(rng: &mut impl Rng, length: usize, g1: &G1Affine) -> Self {
        let x = random_nonzero_scalar(&mut *rng);
        let ys = iter::repeat_with(|| random_nonzero_scalar(&mut *rng))
            .take(length)
            .collect();
        let x1 = (g1 * x).into();
        SecretKey { x, ys, x1 }
    }

    fn sign(&self, rng: &mut impl Rng, msg: &Message) -> Result<Signature, Error> {
        if msg.len() != self.ys.len() {
            return Err(Error::MessageLengthMismatch {
                expected: self.ys.len(),
                got: msg.len(),
            });
        }

        // select h randomly from G1*.
        let h: G1Projective = random_non_identity(&mut *rng);

        // [x] + sum( [yi] * [mi] ), for the secret key ([x], [y1], ...) and message [m1] ...
        let scalar_combination = self.x
            + self
                .ys
                .iter()
                .zip(msg.iter())
                .map(|(yi, mi)| yi * mi)
                .sum::<Scalar>();

        Ok(Signature {
            sigma1: h.into(),
            // sigma2 = h * [scalar_combination]
            sigma2: (h * scalar_combination).into(),
        })
    }
}

impl PublicKey {
    /// Derive a new `PublicKey` from an existing [`SecretKey`] and the shared parameters.
    fn from_secret_key(sk: &SecretKey, params: &Params) -> Self {
        // y1i = g1 * [yi] (point multiplication with the secret key)
        let y1s = sk.ys.iter().map(|yi| (params.g1 * yi).into()).collect();

        // y2i = g2 * [yi] (point multiplication with the secret key)
        let y2s = sk.ys.iter().map(|yi| (params.g2 * yi).into()).collect();

        PublicKey {
            g1: params.g1,
            y1s,
            g2: params.g2,
            // x2 = g * [x]
            x2: (params.g2 * sk.x).into(),
            y2s,
        }
    }

    /// The number of messages this key signs.
    pub fn message_count(&self) -> usize {
        self.y2s.len()
    }

    /// Represent the G2 elements at `indices` as [`PedersenParameters`], with `g2` as the blinding
    /// generator.
    pub fn to_g2_pedersen_parameters(
        &self,
        indices: &[usize],
    ) -> Result<PedersenParameters<G2Projective>, Error> {
        let gs = select(&self.y2s, indices)?;
        Ok(PedersenParameters::from_generators(self.g2.into(), gs))
    }

    /// Represent the G1 elements at `indices` as [`PedersenParameters`], with `g1` as the blinding
    /// generator.
    ///
    /// A holder commits to its hidden messages under these parameters to request a blind signature.
    pub fn to_g1_pedersen_parameters(
        &self,
        indices: &[usize],
    ) -> Result<PedersenParameters<G1Projective>, Error> {
        let gs = select(&self.y1s, indices)?;
        Ok(PedersenParameters::from_generators(self.g1.into(), gs))
    }

    /// Parameters for the commitment to a single hidden message under the signature base derived
    /// from `commitment`.
    pub fn index_commitment_parameters(
        &self,
        commitment: &Commitment<G1Projective>,
    ) -> PedersenParameters<G1Projective> {
        PedersenParameters::from_generators(self.g1.into(), vec![signature_base(commitment)])
    }

    /// Verify a signature on a given message.
    pub fn verify(&self, msg: &Message, sig: &Signature) -> bool {
        if !sig.is_well_formed() || msg.len() != self.y2s.len() {
            return false;
        }

        // x + sum( yi * [mi] ), for the public key (x, y1, ...) and message [m1], [m2]...
        let lhs = self.x2
            + self
                .y2s
                .iter()
                .zip(msg.iter())
                .map(|(yi, mi)| yi * mi)
                .sum::<G2Projective>();

        let verify_pairing = pairing(&sig.sigma1, &lhs.into());
        let signature_pairing = pairing(&sig.sigma2, &self.g2);

        verify_pairing == signature_pairing
    }
}

impl ChallengeInput for PublicKey {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.g1);
        builder.consume(&self.g2);
        builder.consume(&self.x2);
        builder.consume(self.y1s.as_slice());
        builder.consume(self.y2s.as_slice());
    }
}

/// The signature base `h` for a blind signature over `commitment`.
///
/// Hashing `h` from the commitment keeps the signer from choosing a base with a known relation to
/// the key.
pub fn signature_base(commitment: &Commitment<G1Projective>) -> G1Projective {
    let encoded = G1Affine::from(commitment.to_element()).to_compressed();
    generators::derive(&encoded, b"PS blind signature base", 0)
}

impl KeyPair {
    /// Generate a new `KeyPair` for messages of the given length.
    ///
    /// The scalars in the secret key are chosen uniformly at random and are non-zero.
    pub fn new(rng: &mut impl Rng, params: &Params, length: usize) -> Self {
        let sk = SecretKey::new(rng, length, &params.g1);
        let pk = PublicKey::from_secret_key(&sk, params);
        KeyPair { sk, pk }
    }

    /// Get the public portion of the `KeyPair`
    pub fn public_key(&self) -> &PublicKey {
        &self.pk
    }

    /// Sign a message.
    pub fn try_sign(&self, rng: &mut impl Rng, msg: &Message) -> Result<Signature, Error> {
        self.sk.sign(rng, msg)
    }

    /// Sign a message of which the signer knows only part.
    ///
    /// `commitment` commits to the hidden messages under [`PublicKey::to_g1_pedersen_parameters`];
    /// `index_commitments` holds, for every hidden index, a commitment to that message under
    /// [`PublicKey::index_commitment_parameters`]; `known` holds every other message.
    ///
    /// **Warning**: this should *only* be used if the signer has verified a proof of knowledge of
    /// the openings of the commitments, with the hidden messages shared among them.
    pub fn blind_sign(
        &self,
        commitment: &Commitment<G1Projective>,
        index_commitments: &BTreeMap<usize, Commitment<G1Projective>>,
        known: &BTreeMap<usize, Scalar>,
    ) -> Result<BlindSignature, Error> {
        let length = self.sk.ys.len();
        if index_commitments.is_empty()
            || index_commitments.len() + known.len() != length
            || index_commitments
                .keys()
                .chain(known.keys())
                .any(|&i| i >= length)
            || index_commitments.keys().any(|i| known.contains_key(i))
        {
            return Err(Error::InvalidBlindingIndices { length });
        }

        let h = signature_base(commitment);
        let known_combination = self.sk.x
            + known
                .iter()
                .map(|(&i, mi)| self.sk.ys[i] * mi)
                .sum::<Scalar>();
        let hidden_combination = index_commitments
            .iter()
            .map(|(&i, com)| com.to_element() * self.sk.ys[i])
            .sum::<G1Projective>();

        Ok(BlindSignature(Signature {
            sigma1: h.into(),
            sigma2: (h * known_combination + hidden_combination).into(),
        }))
    }
}

/// A signature on a message, generated using Pointcheval-Sanders.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    /// First part of a signature.
    ///
    /// In some papers, this is denoted `h`.
    #[serde(with = "SerializeElement")]
    sigma1: G1Affine,
    /// Second part of a signature.
    ///
    /// In some papers, this is denoted `H`.
    #[serde(with = "SerializeElement")]
    sigma2: G1Affine,
}

impl Signature {
    /// Randomize a signature in place.
    pub fn randomize(&mut self, rng: &mut impl Rng) {
        let r = random_nonzero_scalar(rng);
        *self = Signature {
            sigma1: (self.sigma1 * r).into(),
            sigma2: (self.sigma2 * r).into(),
        };
    }

    /// Convert to a bytewise representation
    pub fn as_bytes(&self) -> [u8; 96] {
        let mut buf: [u8; 96] = [0; 96];
        buf[..48].copy_from_slice(&self.sigma1.to_compressed());
        buf[48..].copy_from_slice(&self.sigma2.to_compressed());
        buf
    }

    /// Check whether the signature is well-formed.
    ///
    /// This checks that first element is not the identity element. This implementation uses only
    /// checked APIs to ensure that both parts of the signature are in the expected group (G1).
    pub fn is_well_formed(&self) -> bool {
        !bool::from(self.sigma1.is_identity())
    }

    /// Extract the sigma_1 or `h` component.
    pub fn sigma1(self) -> G1Affine {
        self.sigma1
    }

    /// Extract the sigma_2 or `H` component.
    pub fn sigma2(self) -> G1Affine {
        self.sigma2
    }
}

impl ChallengeInput for Signature {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.sigma1);
        builder.consume(&self.sigma2);
    }
}

/// A signature blinded for use in a proof of knowledge.
///
/// This has the same representation as a regular [`Signature`], but different semantics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BlindedSignature(pub(crate) Signature);

impl BlindedSignature {
    /// Blind a [`Signature`] using the given [`BlindingFactor`].
    pub fn blind(sig: Signature, bf: BlindingFactor) -> Self {
        let Signature { sigma1, sigma2 } = sig;
        Self(Signature {
            sigma1,
            sigma2: (sigma2 + (sigma1 * bf.to_scalar())).into(),
        })
    }

    /// Unblind a [`BlindedSignature`]. This will always compute: the user must take care to use
    /// a blinding factor that actually corresponds to the signature in order to retrieve
    /// a valid [`Signature`] on the original message.
    pub fn unblind(self, bf: BlindingFactor) -> Signature {
        let Self(Signature { sigma1, sigma2 }) = self;
        Signature {
            sigma1,
            sigma2: (sigma2 - (sigma1 * bf.to_scalar())).into(),
        }
    }

    /// Randomize a signature in place.
    pub fn randomize(&mut self, rng: &mut impl Rng) {
        self.0.randomize(rng);
    }

    /// Check whether the signature is well-formed.
    pub fn is_well_formed(&self) -> bool {
        self.0.is_well_formed()
    }

    /// Extract the sigma_1 component.
    pub fn sigma1(self) -> G1Affine {
        self.0.sigma1
    }

    /// Extract the blinded sigma_2 component.
    pub fn sigma2(self) -> G1Affine {
        self.0.sigma2
    }
}

impl ChallengeInput for BlindedSignature {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.0);
    }
}

/// A signature produced by [`KeyPair::blind_sign`], still bound to the holder's blinding factors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BlindSignature(Signature);

impl BlindSignature {
    /// Remove the holder's per-index blinding factors, keyed by hidden message index.
    pub fn unblind(
        self,
        public_key: &PublicKey,
        blinding_factors: &BTreeMap<usize, BlindingFactor>,
    ) -> Result<Signature, Error> {
        let Self(Signature { sigma1, sigma2 }) = self;
        let blinding = blinding_factors
            .iter()
            .map(|(&i, bf)| {
                public_key
                    .y1s
                    .get(i)
                    .map(|y1| y1 * bf.to_scalar())
                    .ok_or(Error::IndexOutOfRange {
                        index: i,
                        length: public_key.y1s.len(),
                    })
            })
            .sum::<Result<G1Projective, Error>>()?;
        Ok(Signature {
            sigma1,
            sigma2: (sigma2 - blinding).into(),
        })
    }
}

/// Select the elements at `indices`, as projective points.
fn select<A, P>(elements: &[A], indices: &[usize]) -> Result<Vec<P>, Error>
where
    A: Copy + Into<P>,
{
    indices
        .iter()
        .map(|&i| {
            elements
                .get(i)
                .map(|&e| e.into())
                .ok_or(Error::IndexOutOfRange {
                    index: i,
                    length: elements.len(),
                })
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::rng;

    fn keypair(rng: &mut impl Rng) -> KeyPair {
        let params = Params::new(rng);
        KeyPair::new(rng, &params, 3)
    }

    #[test]
    fn verify_signed_message() {
        let mut rng = rng();
        let kp = keypair(&mut rng);
        let msg = Message::random(&mut rng, 3);

        let sig = kp.try_sign(&mut rng, &msg).unwrap();

        assert!(
            kp.public_key().verify(&msg, &sig),
            "Signature didn't verify!! {:?}, {:?}",
            kp,
            msg
        );
    }

    #[test]
    fn fail_verification_of_different_message() {
        let mut rng = rng();
        let kp = keypair(&mut rng);
        let msg = Message::random(&mut rng, 3);

        let sig = kp.try_sign(&mut rng, &msg).unwrap();
        let bad_msg = Message::random(&mut rng, 3);

        assert_ne!(
            &*msg, &*bad_msg,
            "RNG failed to generate a different message."
        );
        assert!(
            !kp.public_key().verify(&bad_msg, &sig),
            "Signature verified on the wrong message!",
        );
    }

    #[test]
    fn fail_verification_with_wrong_keypair() {
        let mut rng = rng();
        let kp = keypair(&mut rng);
        let msg = Message::random(&mut rng, 3);

        let bad_kp = keypair(&mut rng);
        let bad_sig = bad_kp.try_sign(&mut rng, &msg).unwrap();

        assert!(
            !kp.public_key().verify(&msg, &bad_sig),
            "Signature from a different keypair verified!",
        );
    }

    #[test]
    fn fail_unit_signature() {
        let mut rng = rng();
        let kp = keypair(&mut rng);
        let msg = Message::random(&mut rng, 3);

        let bad_sig = Signature {
            sigma1: G1Affine::identity(),
            sigma2: G1Projective::random(&mut rng).into(),
        };

        assert!(
            !kp.public_key().verify(&msg, &bad_sig),
            "Bad signature with sigma1 = 1 verified!"
        );
    }

    #[test]
    fn signing_rejects_wrong_length() {
        let mut rng = rng();
        let kp = keypair(&mut rng);
        let msg = Message::random(&mut rng, 2);

        assert_eq!(
            kp.try_sign(&mut rng, &msg),
            Err(Error::MessageLengthMismatch {
                expected: 3,
                got: 2
            })
        );
    }

    #[test]
    fn randomized_signatures_verify() {
        let mut rng = rng();
        let kp = keypair(&mut rng);
        let msg = Message::random(&mut rng, 3);

        let mut sig = kp.try_sign(&mut rng, &msg).unwrap();
        sig.randomize(&mut rng);

        assert!(kp.public_key().verify(&msg, &sig))
    }

    #[test]
    fn labelled_params_are_reproducible() {
        assert_eq!(
            Params::generate_using_label(b"issuer"),
            Params::generate_using_label(b"issuer")
        );
    }

    fn blind_sign_hiding(
        rng: &mut impl Rng,
        kp: &KeyPair,
        msg: &Message,
        hidden: &[usize],
    ) -> (BlindSignature, BTreeMap<usize, BlindingFactor>) {
        let pk = kp.public_key();
        let hidden_msg = Message::new(hidden.iter().map(|&i| msg[i]).collect());
        let commitment = pk
            .to_g1_pedersen_parameters(hidden)
            .unwrap()
            .commit(&hidden_msg, BlindingFactor::new(rng))
            .unwrap();

        let index_params = pk.index_commitment_parameters(&commitment);
        let mut blinding_factors = BTreeMap::new();
        let mut index_commitments = BTreeMap::new();
        for &i in hidden {
            let bf = BlindingFactor::new(rng);
            let _ = blinding_factors.insert(i, bf);
            let _ = index_commitments.insert(i, index_params.commit(&msg[i].into(), bf).unwrap());
        }
        let known = (0..msg.len())
            .filter(|i| !hidden.contains(i))
            .map(|i| (i, msg[i]))
            .collect();

        let blind_sig = kp
            .blind_sign(&commitment, &index_commitments, &known)
            .unwrap();
        (blind_sig, blinding_factors)
    }

    #[test]
    fn blind_signing_verifies() {
        let mut rng = rng();
        let kp = keypair(&mut rng);
        let msg = Message::random(&mut rng, 3);

        let (blind_sig, bfs) = blind_sign_hiding(&mut rng, &kp, &msg, &[0, 2]);
        let sig = blind_sig.unblind(kp.public_key(), &bfs).unwrap();

        assert!(
            kp.public_key().verify(&msg, &sig),
            "Signature didn't verify!!"
        );
    }

    #[test]
    fn blind_signing_requires_correct_blinding_factor() {
        let mut rng = rng();
        let kp = keypair(&mut rng);
        let msg = Message::random(&mut rng, 3);

        let (blind_sig, mut bfs) = blind_sign_hiding(&mut rng, &kp, &msg, &[1]);
        let _ = bfs.insert(1, BlindingFactor::new(&mut rng));
        let sig = blind_sig.unblind(kp.public_key(), &bfs).unwrap();

        assert!(
            !kp.public_key().verify(&msg, &sig),
            "Signature verified!! (with wrong blinding factor, *not* good, *do not* want this)"
        );
    }

    #[test]
    fn blind_signing_rejects_overlapping_indices() {
        let mut rng = rng();
        let kp = keypair(&mut rng);
        let commitment = Commitment::from_element(random_non_identity(&mut rng));
        let mut index_commitments = BTreeMap::new();
        let _ = index_commitments.insert(0, commitment);
        let known = (0..3).map(|i| (i, Scalar::one())).collect();

        assert_eq!(
            kp.blind_sign(&commitment, &index_commitments, &known)
                .map(|_| ()),
            Err(Error::InvalidBlindingIndices { length: 3 })
        );
    }

    #[test]
    fn blind_signature_randomization_commutes() {
        let mut rng = rng();
        let kp = keypair(&mut rng);
        let msg = Message::random(&mut rng, 3);

        let sig = kp.try_sign(&mut rng, &msg).unwrap();
        let bf = BlindingFactor::new(&mut rng);
        let mut blind_sig = BlindedSignature::blind(sig, bf);
        blind_sig.randomize(&mut rng);
        let sig = blind_sig.unblind(bf);

        assert!(
            kp.public_key().verify(&msg, &sig),
            "Signature didn't verify!!"
        );
    }
}
