//! Constraints between the hidden messages of different statements.

use crate::{schema::Schema, Error};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A set of `(statement index, message index)` pairs whose messages must all be equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaStatement(BTreeSet<(usize, usize)>);

impl MetaStatement {
    /// A constraint over the given pairs.
    pub fn equality(pairs: impl IntoIterator<Item = (usize, usize)>) -> Self {
        Self(pairs.into_iter().collect())
    }

    /// The constrained pairs.
    pub fn pairs(&self) -> &BTreeSet<(usize, usize)> {
        &self.0
    }

    pub(crate) fn into_pairs(self) -> BTreeSet<(usize, usize)> {
        self.0
    }
}

/// The meta statements of a proof specification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaStatements(Vec<MetaStatement>);

impl MetaStatements {
    /// No constraints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constraint and return its position.
    pub fn add(&mut self, meta_statement: MetaStatement) -> usize {
        self.0.push(meta_statement);
        self.0.len() - 1
    }

    /// Append every constraint of `other`.
    pub fn extend(&mut self, other: MetaStatements) {
        self.0.extend(other.0)
    }

    /// The constraints in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &MetaStatement> {
        self.0.iter()
    }

    /// The number of constraints.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no constraints.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<MetaStatement>> for MetaStatements {
    fn from(meta_statements: Vec<MetaStatement>) -> Self {
        Self(meta_statements)
    }
}

/// Build an equality constraint from attribute names.
///
/// `spec` maps a statement index to the attribute names that take part in the constraint and the
/// schema those names resolve against. Every unresolvable name is reported together.
pub fn build_equality(
    spec: &BTreeMap<usize, (Vec<String>, &Schema)>,
) -> Result<MetaStatement, Error> {
    let mut pairs = BTreeSet::new();
    let mut unknown = Vec::new();
    for (&statement, (names, schema)) in spec {
        for name in names {
            match schema.index_of(name) {
                Some(message) => {
                    let _ = pairs.insert((statement, message));
                }
                None => unknown.push(name.clone()),
            }
        }
    }
    if !unknown.is_empty() {
        return Err(Error::UnknownFieldName {
            count: unknown.len(),
            names: unknown,
        });
    }
    Ok(MetaStatement(pairs))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::encoding::EncodingKind;

    fn schema(names: &[&str]) -> Schema {
        Schema::new(
            names
                .iter()
                .map(|name| (name.to_string(), EncodingKind::String.into()))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn names_resolve_per_statement() {
        let first = schema(&["email", "name", "ssn"]);
        let second = schema(&["account", "ssn"]);
        let mut spec = BTreeMap::new();
        let _ = spec.insert(0, (vec!["ssn".to_string()], &first));
        let _ = spec.insert(1, (vec!["ssn".to_string()], &second));

        assert_eq!(
            build_equality(&spec).unwrap(),
            MetaStatement::equality(vec![(0, 2), (1, 1)])
        );
    }

    #[test]
    fn unknown_names_are_all_reported() {
        let first = schema(&["email"]);
        let mut spec = BTreeMap::new();
        let _ = spec.insert(0, (vec!["ssn".to_string(), "email".to_string()], &first));
        let _ = spec.insert(3, (vec!["dob".to_string()], &first));

        assert_eq!(
            build_equality(&spec),
            Err(Error::UnknownFieldName {
                count: 2,
                names: vec!["ssn".to_string(), "dob".to_string()],
            })
        );
    }

    #[test]
    fn meta_statements_accumulate() {
        let mut meta_statements = MetaStatements::new();
        assert_eq!(meta_statements.add(MetaStatement::equality(vec![(0, 1), (1, 1)])), 0);
        meta_statements.extend(vec![MetaStatement::equality(vec![(0, 2), (2, 0)])].into());
        assert_eq!(meta_statements.len(), 2);
    }
}
