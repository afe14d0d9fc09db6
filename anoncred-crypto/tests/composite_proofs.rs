mod test_utils;

use anoncred_crypto::{
    bbs, bbs_plus,
    composite::{
        self, ParamsRef, ProofSpec, ProofSpecEnvelope, SetupParam, Statement, Witness,
    },
    decode, encode, mac,
    pedersen::PedersenParameters,
    pointcheval_sanders as ps, BlindingFactor, Message,
};
use bls12_381::{G1Projective, Scalar};
use ff::Field;
use std::collections::{BTreeMap, BTreeSet};
use test_utils::seeded_rng;

fn set(pairs: &[(usize, usize)]) -> BTreeSet<(usize, usize)> {
    pairs.iter().copied().collect()
}

/// A BBS+ credential and a PS credential that share their first message.
fn two_credentials(
    rng: &mut (impl rand::CryptoRng + rand::RngCore),
    second_first_message: Option<Scalar>,
) -> (ProofSpec, Vec<Witness>) {
    let bbs_plus_params = bbs_plus::Params::new(&mut *rng, 4);
    let bbs_plus_kp = bbs_plus::KeyPair::new(&mut *rng, &bbs_plus_params);
    let msg1 = Message::random(&mut *rng, 4);
    let sig1 = bbs_plus_kp.try_sign(&mut *rng, &bbs_plus_params, &msg1).unwrap();

    let ps_params = ps::Params::new(&mut *rng);
    let ps_kp = ps::KeyPair::new(&mut *rng, &ps_params, 3);
    let mut msg2 = Message::random(&mut *rng, 3).to_vec();
    msg2[0] = second_first_message.unwrap_or(msg1[0]);
    let msg2 = Message::new(msg2);
    let sig2 = ps_kp.try_sign(&mut *rng, &msg2).unwrap();

    let (revealed1, hidden1) = msg1.split(&[3]).unwrap();
    let (revealed2, hidden2) = msg2.split(&[2]).unwrap();

    let spec = ProofSpec::new(
        vec![
            Statement::BbsPlusSignature {
                params: ParamsRef::Inline(bbs_plus_params),
                public_key: ParamsRef::Inline(*bbs_plus_kp.public_key()),
                revealed: revealed1,
            },
            Statement::PsSignature {
                public_key: ParamsRef::Inline(ps_kp.public_key().clone()),
                revealed: revealed2,
            },
        ],
        vec![set(&[(0, 0), (1, 0)])],
    );
    let witnesses = vec![
        Witness::BbsPlusSignature {
            signature: sig1,
            hidden: hidden1,
        },
        Witness::PsSignature {
            signature: sig2,
            hidden: hidden2,
        },
    ];
    (spec, witnesses)
}

#[test]
fn equal_messages_across_schemes_verify() {
    let mut rng = seeded_rng();
    let (spec, witnesses) = two_credentials(&mut rng, None);

    let proof = spec.prove(&mut rng, &witnesses, Some(&b"nonce"[..])).unwrap();
    assert!(spec.verify(&proof, Some(&b"nonce"[..])).unwrap());
}

#[test]
fn unequal_messages_fail_verification() {
    let mut rng = seeded_rng();
    let (spec, witnesses) = two_credentials(&mut rng, Some(Scalar::random(&mut seeded_rng())));

    let proof = spec.prove(&mut rng, &witnesses, None).unwrap();
    assert!(!spec.verify(&proof, None).unwrap());
}

#[test]
fn nonce_and_context_are_bound() {
    let mut rng = seeded_rng();
    let (mut spec, witnesses) = two_credentials(&mut rng, None);
    spec.context = Some(b"presentation context".to_vec());

    let proof = spec.prove(&mut rng, &witnesses, Some(&b"nonce"[..])).unwrap();
    assert!(spec.verify(&proof, Some(&b"nonce"[..])).unwrap());
    assert!(!spec.verify(&proof, Some(&b"other nonce"[..])).unwrap());
    assert!(!spec.verify(&proof, None).unwrap());

    spec.context = Some(b"other context".to_vec());
    assert!(!spec.verify(&proof, Some(&b"nonce"[..])).unwrap());
}

#[test]
fn statements_share_setup_params() {
    let mut rng = seeded_rng();
    let params = bbs::Params::generate_using_label(b"shared", 3);
    let kp = bbs::KeyPair::new(&mut rng, &params);
    let msgs: Vec<Message> = (0..2).map(|_| Message::random(&mut rng, 3)).collect();

    let mut statements = Vec::new();
    let mut witnesses = Vec::new();
    for msg in &msgs {
        let signature = kp.try_sign(&mut rng, &params, msg).unwrap();
        let (revealed, hidden) = msg.split(&[1]).unwrap();
        statements.push(Statement::BbsSignature {
            params: ParamsRef::Setup(0),
            public_key: ParamsRef::Setup(1),
            revealed,
        });
        witnesses.push(Witness::BbsSignature { signature, hidden });
    }
    let mut spec = ProofSpec::new(statements, Vec::new());
    spec.setup_params = vec![
        SetupParam::BbsParams(params),
        SetupParam::BbsPublicKey(*kp.public_key()),
    ];

    let proof = spec.prove(&mut rng, &witnesses, None).unwrap();
    assert!(spec.verify(&proof, None).unwrap());
}

#[test]
fn commitment_links_to_signed_message() {
    let mut rng = seeded_rng();
    let params = bbs::Params::new(&mut rng, 3);
    let kp = bbs::KeyPair::new(&mut rng, &params);
    let msg = Message::random(&mut rng, 3);
    let signature = kp.try_sign(&mut rng, &params, &msg).unwrap();

    let pedersen = PedersenParameters::<G1Projective>::new(&mut rng, 1);
    let bf = BlindingFactor::new(&mut rng);
    let commitment = pedersen.commit(&Message::from(msg[2]), bf).unwrap();

    let (revealed, hidden) = msg.split(&[]).unwrap();
    let spec = ProofSpec::new(
        vec![
            Statement::BbsSignature {
                params: ParamsRef::Inline(params),
                public_key: ParamsRef::Inline(*kp.public_key()),
                revealed,
            },
            Statement::PedersenCommitment {
                params: ParamsRef::Inline(pedersen),
                commitment,
            },
        ],
        vec![set(&[(0, 2), (1, 0)])],
    );
    let witnesses = [
        Witness::BbsSignature { signature, hidden },
        Witness::PedersenCommitment {
            blinding_factor: bf,
            opening: Message::from(msg[2]),
        },
    ];

    let proof = spec.prove(&mut rng, &witnesses, None).unwrap();
    assert!(spec.verify(&proof, None).unwrap());
}

#[test]
fn mac_proof_through_byte_interface() {
    let mut rng = seeded_rng();
    let params = mac::Params::new(&mut rng, 3);
    let kp = mac::KeyPair::new(&mut rng, &params);
    let msg = Message::random(&mut rng, 3);
    let mac = kp.try_mac(&mut rng, &params, &msg).unwrap();
    let (revealed, hidden): (BTreeMap<usize, Scalar>, _) = msg.split(&[0]).unwrap();

    let spec = ProofSpecEnvelope {
        statements: vec![encode(&Statement::MacSignature {
            params: ParamsRef::Setup(0),
            public_key: ParamsRef::Inline(*kp.public_key()),
            revealed,
        })
        .unwrap()],
        setup_params: vec![encode(&SetupParam::MacParams(params)).unwrap()],
        ..ProofSpecEnvelope::default()
    };
    let witnesses = vec![encode(&Witness::MacSignature { mac, hidden }).unwrap()];

    let proof = composite::generate_proof(&mut rng, &spec, &witnesses, Some(&b"n"[..])).unwrap();
    let result = composite::verify_proof(&proof, &spec, Some(&b"n"[..]));
    assert!(result.verified, "{:?}", result.error);

    let keyed = composite::keyed_proofs(&proof).unwrap();
    assert_eq!(keyed.len(), 1);
    assert!(kp.secret_key().verify_keyed_proof(&keyed[&0]));
    let other_params = mac::Params::new(&mut rng, 3);
    let other = mac::KeyPair::new(&mut rng, &other_params);
    assert!(!other.secret_key().verify_keyed_proof(&keyed[&0]));
}

#[test]
fn malformed_bytes_fail_verification_with_reason() {
    let mut rng = seeded_rng();
    let (spec, witnesses) = two_credentials(&mut rng, None);
    let envelope = ProofSpecEnvelope {
        statements: spec
            .statements
            .iter()
            .map(|statement| encode(statement).unwrap())
            .collect(),
        equalities: spec.equalities.clone(),
        ..ProofSpecEnvelope::default()
    };
    let proof = encode(&spec.prove(&mut rng, &witnesses, None).unwrap()).unwrap();
    assert!(composite::verify_proof(&proof, &envelope, None).verified);

    let result = composite::verify_proof(&proof[..proof.len() / 2], &envelope, None);
    assert!(!result.verified);
    assert!(result.error.is_some());

    let decoded: composite::Proof = decode(&proof).unwrap();
    assert_eq!(decoded.statement_proofs().len(), 2);
}
