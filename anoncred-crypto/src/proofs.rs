//! Primitive components of zero-knowledge proofs, implemented as building blocks for larger proofs.
//!
//! Every proof here follows the same Schnorr shape: a builder runs the commitment phase, the caller
//! derives one [`Challenge`] over every builder it wants to bind together, and each builder then
//! runs the response phase. Hidden messages that must be equal across proofs share a commitment
//! scalar, which makes their response scalars equal.

mod bbs;
mod bbs_plus;
mod challenge;
mod commitment;
mod signature;

pub use self::{bbs::*, bbs_plus::*, challenge::*, commitment::*, signature::*};

use crate::common::*;
use std::collections::BTreeMap;

/// The message indices in `0..length` that do not appear in `revealed`.
pub(crate) fn hidden_indices<T>(length: usize, revealed: &BTreeMap<usize, T>) -> Vec<usize> {
    (0..length).filter(|i| !revealed.contains_key(i)).collect()
}

/// Fail if any key of `map` is not a message index in `0..length`.
pub(crate) fn check_indices<T>(length: usize, map: &BTreeMap<usize, T>) -> Result<(), Error> {
    match map.keys().find(|&&index| index >= length) {
        Some(&index) => Err(Error::IndexOutOfRange { index, length }),
        None => Ok(()),
    }
}

/// Fail unless the keys of `hidden` are exactly the indices in `0..length` missing from `revealed`.
pub(crate) fn check_partition<T, U>(
    length: usize,
    revealed: &BTreeMap<usize, T>,
    hidden: &BTreeMap<usize, U>,
) -> Result<(), Error> {
    check_indices(length, revealed)?;
    check_indices(length, hidden)?;
    if revealed.len() + hidden.len() != length || hidden.keys().any(|i| revealed.contains_key(i)) {
        return Err(Error::MessageLengthMismatch {
            expected: length,
            got: revealed.len() + hidden.len(),
        });
    }
    Ok(())
}
