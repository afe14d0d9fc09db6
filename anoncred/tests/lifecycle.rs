mod test_utils;

use anoncred::{
    blind,
    credential::Credential,
    disclosure::{encode_revealed, partition},
    encoding::EncodingKind,
    issuer::Config,
    meta_statements::{build_equality, MetaStatements},
    presentation::PresentationBuilder,
    proof_spec::{NativeEngine, ProofSpec, SetupParams, Statements, Witnesses},
    revocation::{add_then_commit, AccumulatorState, InMemoryState, Member},
    schema::Schema,
    scheme::{KeyPair, SignatureScheme, VerificationKey},
    statements::{signature_statement, signature_witness, KeySource},
    Error,
};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use test_utils::{person, person_schema, seeded_rng};

fn names(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| name.to_string()).collect()
}

#[test]
fn selective_disclosure_is_bound_to_nonce() {
    let mut rng = seeded_rng();
    let schema = person_schema();
    let params = schema.signature_params(SignatureScheme::Bbs);
    let key_pair = KeyPair::new(&mut rng, &params, schema.message_count()).unwrap();
    let key = VerificationKey::new(params.clone(), key_pair.public_key()).unwrap();

    let encoded = schema.encode(&person()).unwrap();
    assert_eq!(encoded.names(), ["city", "email", "fname", "lname", "ssn"]);
    let signature = key_pair.sign(&mut rng, &params, encoded.messages()).unwrap();

    let parts = partition(&person(), &schema, &names(&["lname", "city"])).unwrap();
    let statement = signature_statement(KeySource::Inline(&key), &parts.revealed).unwrap();
    // Leaves sort as city, email, fname, lname, ssn, so city is 0 and lname is 3.
    assert_eq!(
        statement.revealed_indices(),
        &vec![0, 3].into_iter().collect::<BTreeSet<_>>()
    );

    let spec = ProofSpec::new(
        vec![statement].into(),
        MetaStatements::new(),
        SetupParams::default(),
        None,
    );
    let witnesses: Witnesses = vec![signature_witness(&key, &signature, &parts.unrevealed).unwrap()].into();
    let proof = spec
        .generate(&NativeEngine, &mut rng, &witnesses, Some(&b"some unique nonce"[..]))
        .unwrap();

    assert!(
        spec.verify(&NativeEngine, &proof, Some(&b"some unique nonce"[..]))
            .verified
    );
    assert!(
        !spec
            .verify(&NativeEngine, &proof, Some(&b"another nonce"[..]))
            .verified
    );
}

#[test]
fn encoding_is_deterministic() {
    let schema = person_schema();
    let first = schema.encode(&person()).unwrap();
    let second = Schema::from_json(&schema.to_canonical_json().unwrap())
        .unwrap()
        .encode(&person())
        .unwrap();
    let hex = |encoded: &anoncred::schema::EncodedMessages| {
        encoded
            .messages()
            .iter()
            .map(|m| hex::encode(m.to_bytes()))
            .collect::<Vec<_>>()
    };
    assert_eq!(hex(&first), hex(&second));

    let parts = partition(&person(), &schema, &names(&["email"])).unwrap();
    assert_eq!(parts.revealed.len() + parts.unrevealed.len(), first.len());
    assert_eq!(
        encode_revealed(&parts.revealed_values, &schema).unwrap(),
        parts.revealed
    );
}

#[test]
fn declared_equality_over_different_values_does_not_verify() {
    let mut rng = seeded_rng();
    let schema = person_schema();
    let params = schema.signature_params(SignatureScheme::BbsPlus);

    let mut other = person();
    other["ssn"] = json!("999-999999-9");

    let mut setup = SetupParams::default();
    let mut statements = Statements::new();
    let mut witnesses = Witnesses::new();
    for object in &[person(), other] {
        let key_pair = KeyPair::new(&mut rng, &params, schema.message_count()).unwrap();
        let key = VerificationKey::new(params.clone(), key_pair.public_key()).unwrap();
        let encoded = schema.encode(object).unwrap();
        let signature = key_pair.sign(&mut rng, &params, encoded.messages()).unwrap();

        let parts = partition(object, &schema, &names(&["city"])).unwrap();
        let source = KeySource::setup(&key, &mut setup).unwrap();
        let _ = statements.add(signature_statement(source, &parts.revealed).unwrap());
        let _ = witnesses.add(signature_witness(&key, &signature, &parts.unrevealed).unwrap());
    }

    let mut equality = BTreeMap::new();
    let _ = equality.insert(0, (vec!["ssn".to_string()], &schema));
    let _ = equality.insert(1, (vec!["ssn".to_string()], &schema));
    let meta_statements = vec![build_equality(&equality).unwrap()].into();

    let spec = ProofSpec::new(statements, meta_statements, setup, None);
    let proof = spec
        .generate(&NativeEngine, &mut rng, &witnesses, None)
        .unwrap();
    assert!(!spec.verify(&NativeEngine, &proof, None).verified);
}

#[test]
fn signing_checks_the_schema_first() {
    let mut rng = seeded_rng();
    let subject = vec![
        ("name".to_string(), EncodingKind::String.into()),
        ("age".to_string(), EncodingKind::Integer { minimum: 0, maximum: None }.into()),
    ]
    .into_iter()
    .collect();
    let schema = Schema::for_credential(subject).unwrap();
    let issuer = Config::new(&mut rng, SignatureScheme::Ps, &schema).unwrap();

    let missing = Credential::new(schema.clone(), json!({"name": "Ann"}));
    assert!(matches!(
        issuer.issue(&mut rng, missing),
        Err(Error::SchemaMismatch { ref missing, .. }) if missing == &["credentialSubject.age".to_string()]
    ));

    let extra = Credential::new(schema, json!({"name": "Ann", "age": 3, "dob": "2020-01-01"}));
    assert!(matches!(
        issuer.issue(&mut rng, extra),
        Err(Error::SchemaMismatch { ref unexpected, .. }) if unexpected == &["credentialSubject.dob".to_string()]
    ));
}

#[test]
fn blind_signatures_verify_on_the_merged_messages() {
    let mut rng = seeded_rng();
    let subject = vec![
        ("name".to_string(), EncodingKind::ReversibleString.into()),
        ("linkSecret".to_string(), EncodingKind::String.into()),
        ("issued".to_string(), EncodingKind::Timestamp.into()),
    ]
    .into_iter()
    .collect();
    let schema = Schema::for_credential(subject).unwrap();
    let object = json!({"name": "Ann", "linkSecret": "correct horse", "issued": "2024-02-01"});

    for &scheme in &[SignatureScheme::BbsPlus, SignatureScheme::Ps, SignatureScheme::Mac] {
        let issuer = Config::new(&mut rng, scheme, &schema).unwrap();
        let key = issuer.verification_key();
        let nonce = Some(&b"issuance nonce"[..]);

        let (request, committed) = blind::request(
            &mut rng,
            &NativeEngine,
            Credential::new(schema.clone(), object.clone()),
            &key,
            &names(&["credentialSubject.linkSecret"]),
            nonce,
        )
        .unwrap();
        let request_json = serde_json::to_string(&request).unwrap();
        assert!(!request_json.contains("correct horse"));

        let blind_signature = issuer
            .blind_sign(
                &mut rng,
                &NativeEngine,
                &schema,
                &serde_json::from_str(&request_json).unwrap(),
                nonce,
            )
            .unwrap();
        let credential = committed.complete(blind_signature, &key).unwrap();

        assert!(credential.verify(&key).verified, "{}", scheme);
        assert!(issuer.verify_credential(&credential).verified, "{}", scheme);
        let parsed = Credential::from_json(&credential.to_json().unwrap()).unwrap();
        assert!(parsed.verify(&key).verified, "{}", scheme);
    }
}

#[test]
fn presentation_across_credentials() {
    let mut rng = seeded_rng();
    let subject = vec![
        ("id".to_string(), EncodingKind::String.into()),
        ("name".to_string(), EncodingKind::ReversibleString.into()),
    ]
    .into_iter()
    .collect();
    let identity_schema = Schema::for_credential(subject).unwrap();
    let subject = vec![
        ("holder".to_string(), EncodingKind::String.into()),
        ("limit".to_string(), EncodingKind::Decimal { minimum: 0.0, decimal_places: 2 }.into()),
    ]
    .into_iter()
    .collect();
    let account_schema = Schema::for_credential(subject).unwrap();

    let identity = Config::new(&mut rng, SignatureScheme::Bbs, &identity_schema).unwrap();
    let bank = Config::new(&mut rng, SignatureScheme::Mac, &account_schema).unwrap();
    let keys = [identity.verification_key(), bank.verification_key()];
    let passport = identity
        .issue(
            &mut rng,
            Credential::new(identity_schema, json!({"id": "P-1", "name": "Ann"})),
        )
        .unwrap();
    let account = bank
        .issue(
            &mut rng,
            Credential::new(account_schema, json!({"holder": "P-1", "limit": 250.5})),
        )
        .unwrap();

    let mut builder = PresentationBuilder::new().with_context("bank.example");
    let p = builder.add_credential(&passport, &keys[0]).unwrap();
    let a = builder.add_credential(&account, &keys[1]).unwrap();
    builder.mark_revealed(p, vec!["credentialSubject.name"]).unwrap();
    let _ = builder
        .enforce_equality(vec![(p, "credentialSubject.id"), (a, "credentialSubject.holder")])
        .unwrap();
    let presentation = builder
        .finalize(&mut rng, &NativeEngine, Some(&b"session"[..]))
        .unwrap();

    assert_eq!(
        presentation.credentials()[p].revealed["credentialSubject"],
        json!({"name": "Ann"})
    );
    assert!(presentation.credentials()[a].revealed["credentialSubject"].is_null());
    assert!(
        bank.verify_presentation(&NativeEngine, &presentation, &keys, Some(&b"session"[..]))
            .verified
    );
    assert!(
        !presentation
            .verify(&NativeEngine, &keys, Some(&b"replayed"[..]))
            .verified
    );
}

#[test]
fn accumulator_state_rejects_inconsistent_updates() {
    let mut state = InMemoryState::new();
    let [e1, e2, e3, e4] = [
        Member::from_id("e1"),
        Member::from_id("e2"),
        Member::from_id("e3"),
        Member::from_id("e4"),
    ];

    state.add(e1).unwrap();
    assert_eq!(state.add(e1), Err(Error::DuplicateMember));
    assert_eq!(state.remove(&e2), Err(Error::NotAMember));

    let mut accumulator_updates = 0;
    let mut update = |members: &[Member]| {
        accumulator_updates += members.len();
        Ok::<(), Error>(())
    };
    add_then_commit(&mut state, &[e3, e4], &mut update).unwrap();
    assert_eq!(
        add_then_commit(&mut state, &[e3, e4], &mut update),
        Err(Error::DuplicateMember)
    );

    assert_eq!(state.size(), 3);
    assert_eq!(accumulator_updates, 2);
}
