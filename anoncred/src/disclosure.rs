//! Splitting an encoded credential into what a presentation reveals and what it hides.

use crate::{
    schema::{flatten_value, Schema},
    types::*,
    Error,
};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Encoded messages split by disclosure.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Revealed messages by index.
    pub revealed: BTreeMap<usize, Scalar>,
    /// Hidden messages by index.
    pub unrevealed: BTreeMap<usize, Scalar>,
    /// The raw values of the revealed leaves, nested as in the original object. Arrays become
    /// objects keyed by position so that partially revealed lists keep their indices.
    pub revealed_values: Value,
}

/// Partition the encoding of `object` into the leaves named in `revealed_names` and the rest.
///
/// Every name must be a leaf of `schema`.
pub fn partition(
    object: &Value,
    schema: &Schema,
    revealed_names: &BTreeSet<String>,
) -> Result<Partition, Error> {
    let encoded = schema.encode(object)?;
    let revealed_indices = schema.indices_of(revealed_names.iter().map(String::as_str))?;

    let mut leaves = BTreeMap::new();
    flatten_value(String::new(), object, &mut leaves);

    let mut revealed = BTreeMap::new();
    let mut unrevealed = BTreeMap::new();
    let mut revealed_values = Map::new();
    for (i, (name, message)) in encoded
        .names()
        .iter()
        .zip(encoded.messages().iter())
        .enumerate()
    {
        if revealed_indices.contains(&i) {
            let _ = revealed.insert(i, *message);
            insert_at_path(&mut revealed_values, name, leaves[name].clone());
        } else {
            let _ = unrevealed.insert(i, *message);
        }
    }
    tracing::debug!(
        revealed = revealed.len(),
        hidden = unrevealed.len(),
        "partitioned encoded messages"
    );

    Ok(Partition {
        revealed,
        unrevealed,
        revealed_values: Value::Object(revealed_values),
    })
}

fn insert_at_path(root: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments = path.split('.').peekable();
    let mut node = root;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            let _ = node.insert(segment.to_string(), value);
            return;
        }
        let child = node
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !child.is_object() {
            *child = Value::Object(Map::new());
        }
        node = match child {
            Value::Object(map) => map,
            _ => return,
        };
    }
}

/// Re-encode revealed values, as nested by [`partition`], on the verifier's side.
///
/// The result is byte-identical to [`Partition::revealed`] for the same values.
pub fn encode_revealed(
    revealed_values: &Value,
    schema: &Schema,
) -> Result<BTreeMap<usize, Scalar>, Error> {
    let mut leaves = BTreeMap::new();
    flatten_value(String::new(), revealed_values, &mut leaves);
    let _ = schema.indices_of(leaves.keys().map(String::as_str))?;

    leaves
        .into_iter()
        .map(|(path, value)| {
            let i = schema.index_of(&path).ok_or(Error::UnknownFieldName {
                count: 1,
                names: vec![path.clone()],
            })?;
            let (_, kind) = &schema.leaves()[i];
            Ok((i, kind.encode(&path, value)?))
        })
        .collect()
}

/// Decode the revealed messages whose encodings are reversible.
pub fn decode_revealed(
    revealed: &BTreeMap<usize, Scalar>,
    schema: &Schema,
) -> BTreeMap<String, Value> {
    revealed
        .iter()
        .filter_map(|(&i, message)| {
            let (path, kind) = schema.leaves().get(i)?;
            kind.decode(*message).ok().map(|value| (path.clone(), value))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::SCHEMA_VERSION;
    use serde_json::json;

    fn schema() -> Schema {
        serde_json::from_value(json!({
            "version": SCHEMA_VERSION,
            "structure": {
                "name": {"type": "string"},
                "city": {"type": "reversibleString"},
                "scores": [{"type": "integer", "minimum": 0}, {"type": "integer", "minimum": 0}]
            }
        }))
        .unwrap()
    }

    fn object() -> Value {
        json!({"name": "John", "city": "Berlin", "scores": [7, 9]})
    }

    fn names(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn partition_splits_all_indices() {
        let partition = partition(&object(), &schema(), &names(&["city", "scores.1"])).unwrap();
        assert_eq!(partition.revealed.keys().copied().collect::<Vec<_>>(), [0, 3]);
        assert_eq!(
            partition.unrevealed.keys().copied().collect::<Vec<_>>(),
            [1, 2]
        );
        assert_eq!(
            partition.revealed_values,
            json!({"city": "Berlin", "scores": {"1": 9}})
        );
    }

    #[test]
    fn verifier_encoding_matches_holder() {
        let partition = partition(&object(), &schema(), &names(&["city", "scores.1"])).unwrap();
        assert_eq!(
            encode_revealed(&partition.revealed_values, &schema()).unwrap(),
            partition.revealed
        );
    }

    #[test]
    fn reversible_values_decode() {
        let partition = partition(&object(), &schema(), &names(&["city", "name"])).unwrap();
        let decoded = decode_revealed(&partition.revealed, &schema());
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded["city"], json!("Berlin"));
    }

    #[test]
    fn unknown_names_fail_with_count() {
        assert_eq!(
            partition(&object(), &schema(), &names(&["age", "city", "zip"])),
            Err(Error::UnknownFieldName {
                count: 2,
                names: vec!["age".to_string(), "zip".to_string()],
            })
        );
        assert!(matches!(
            encode_revealed(&json!({"age": 3}), &schema()),
            Err(Error::UnknownFieldName { count: 1, .. })
        ));
    }
}
