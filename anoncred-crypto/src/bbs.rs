//! Multi-message BBS signatures over BLS12-381, in the shape of the IETF draft: a signature is a
//! pair `(A, e)` with `A = (g1 + Σ h_i·m_i) · 1/(x + e)`.
//!
//! BBS has no blind issuance path here; a holder who wants to hide messages from the issuer uses
//! BBS+ or one of the other schemes.
//!
//! See ["The BBS Signature Scheme"](https://datatracker.ietf.org/doc/draft-irtf-cfrg-bbs-signatures/)
//! and Tessaro and Zhu, ["Revisiting BBS Signatures"](https://eprint.iacr.org/2023/275).

use crate::{
    common::*,
    generators,
    pedersen::inner_product,
    proofs::{ChallengeBuilder, ChallengeInput},
    serde::SerializeElement,
};
use ff::Field;
use serde::{Deserialize, Serialize};

/// Public parameters for BBS signatures over messages of a fixed length.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// Base point of the signed value (P1).
    #[serde(with = "SerializeElement")]
    pub(crate) g1: G1Affine,
    /// G2 generator.
    #[serde(with = "SerializeElement")]
    pub(crate) g2: G2Affine,
    /// One generator per message.
    #[serde(with = "SerializeElement")]
    pub(crate) hs: Vec<G1Affine>,
}

impl Params {
    /// Generate parameters for `length` messages uniformly at random.
    pub fn new(rng: &mut impl Rng, length: usize) -> Self {
        let g1: G1Projective = random_non_identity(&mut *rng);
        let g2: G2Projective = random_non_identity(&mut *rng);
        let hs = (0..length)
            .map(|_| random_non_identity::<G1Projective>(&mut *rng).into())
            .collect();
        Self {
            g1: g1.into(),
            g2: g2.into(),
            hs,
        }
    }

    /// Derive parameters for `length` messages deterministically from a public label.
    pub fn generate_using_label(label: &[u8], length: usize) -> Self {
        Self {
            g1: generators::derive::<G1Projective>(label, b"BBS g1", 0).into(),
            g2: generators::derive::<G2Projective>(label, b"BBS g2", 0).into(),
            hs: generators::derive_many::<G1Projective>(label, b"BBS h", length)
                .into_iter()
                .map(Into::into)
                .collect(),
        }
    }

    /// The number of messages these parameters sign.
    pub fn message_count(&self) -> usize {
        self.hs.len()
    }

    /// The message generators, as projective points.
    pub(crate) fn message_generators(&self) -> Vec<G1Projective> {
        self.hs.iter().map(G1Projective::from).collect()
    }

    /// Compute `g1 + Σ h_i·m_i`; callers check the message length.
    pub(crate) fn signed_value(&self, msg: &[Scalar]) -> G1Projective {
        self.g1 + inner_product(&self.message_generators(), msg)
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
        builder.consume(self.hs.as_slice());
    }
}

/// BBS secret key.
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
pub(crate) struct SecretKey(#[serde(with = "SerializeElement")] Scalar);

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(<private>)")
    }
}

/// BBS public key `w = g2·x`.
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
        let b = params.signed_value(msg);
        loop {
            let e = Scalar::random(&mut *rng);
            if let Some(inverse) = invert(self.sk.0 + e) {
                return Ok(Signature {
                    a: (b * inverse).into(),
                    e,
                });
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
        let b = params.signed_value(msg);
        let lhs = self.w + params.g2 * sig.e;
        pairing(&sig.a, &lhs.into()) == pairing(&b.into(), &params.g2)
    }
}

impl ChallengeInput for PublicKey {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.w);
    }
}

/// A BBS signature `(A, e)`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(with = "SerializeElement")]
    pub(crate) a: G1Affine,
    #[serde(with = "SerializeElement")]
    pub(crate) e: Scalar,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::rng;

    #[test]
    fn verify_signed_message() {
        let mut rng = rng();
        let params = Params::new(&mut rng, 4);
        let kp = KeyPair::new(&mut rng, &params);
        let msg = Message::random(&mut rng, 4);

        let sig = kp.try_sign(&mut rng, &params, &msg).unwrap();
        assert!(
            kp.public_key().verify(&params, &msg, &sig),
            "Signature didn't verify!!"
        );
    }

    #[test]
    fn fail_verification_of_different_message() {
        let mut rng = rng();
        let params = Params::generate_using_label(b"bbs test", 3);
        let kp = KeyPair::new(&mut rng, &params);
        let msg = Message::random(&mut rng, 3);
        let bad_msg = Message::random(&mut rng, 3);

        let sig = kp.try_sign(&mut rng, &params, &msg).unwrap();
        assert!(
            !kp.public_key().verify(&params, &bad_msg, &sig),
            "Signature verified on the wrong message!"
        );
    }

    #[test]
    fn fail_verification_with_wrong_keypair() {
        let mut rng = rng();
        let params = Params::new(&mut rng, 3);
        let kp = KeyPair::new(&mut rng, &params);
        let other = KeyPair::new(&mut rng, &params);
        let msg = Message::random(&mut rng, 3);

        let sig = other.try_sign(&mut rng, &params, &msg).unwrap();
        assert!(!kp.public_key().verify(&params, &msg, &sig));
    }

    #[test]
    fn fail_unit_signature() {
        let mut rng = rng();
        let params = Params::new(&mut rng, 2);
        let kp = KeyPair::new(&mut rng, &params);
        let msg = Message::random(&mut rng, 2);

        let bad_sig = Signature {
            a: G1Affine::identity(),
            e: Scalar::random(&mut rng),
        };
        assert!(!kp.public_key().verify(&params, &msg, &bad_sig));
    }

    #[test]
    fn signing_rejects_wrong_length() {
        let mut rng = rng();
        let params = Params::new(&mut rng, 2);
        let kp = KeyPair::new(&mut rng, &params);
        let msg = Message::random(&mut rng, 3);

        assert_eq!(
            kp.try_sign(&mut rng, &params, &msg),
            Err(Error::MessageLengthMismatch {
                expected: 2,
                got: 3
            })
        );
    }
}
