use anoncred::{encoding::EncodingKind, schema::Schema};
use rand::SeedableRng;
use serde_json::{json, Value};

// Seeded rng for replicable tests.
pub fn seeded_rng() -> impl rand::CryptoRng + rand::RngCore {
    const TEST_RNG_SEED: [u8; 32] = *b"NEVER USE THIS FOR ANYTHING REAL";
    rand::rngs::StdRng::from_seed(TEST_RNG_SEED)
}

/// A flat schema of five string attributes.
#[allow(unused)]
pub fn person_schema() -> Schema {
    let names = ["ssn", "fname", "lname", "email", "city"];
    Schema::new(
        names
            .iter()
            .map(|name| (name.to_string(), EncodingKind::String.into()))
            .collect(),
    )
    .unwrap()
}

#[allow(unused)]
pub fn person() -> Value {
    json!({
        "ssn": "123-456789-0",
        "fname": "John",
        "lname": "Smith",
        "email": "john.smith@example.com",
        "city": "New York",
    })
}
