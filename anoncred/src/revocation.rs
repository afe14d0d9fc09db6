/*!
Membership state behind a revocation accumulator.

The accumulator's own arithmetic lives outside this crate. What lives here is the set of members
it currently holds, behind the [`AccumulatorState`] trait so that it can be stored wherever the
issuer keeps its records, and the rule for changing it together with the accumulator: check the
state first, run the accumulator update, and commit to the state only if the update succeeded.
*/

use crate::{encoding::hash_to_scalar, types::*, Error};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Domain separator for members derived from identifiers.
const MEMBER_DOMAIN: &[u8] = b"anoncred accumulator member";

/// An accumulator member: a field element in its canonical encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Member([u8; 32]);

impl Member {
    /// Derive a member from an application identifier, such as a credential's revocation id.
    pub fn from_id(id: &str) -> Self {
        hash_to_scalar(MEMBER_DOMAIN, id.as_bytes()).into()
    }

    /// The member as a field element.
    pub fn to_scalar(&self) -> Option<Scalar> {
        Option::from(Scalar::from_bytes(&self.0))
    }

    /// The canonical encoding.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<Scalar> for Member {
    fn from(scalar: Scalar) -> Self {
        Self(scalar.to_bytes())
    }
}

/// Storage for the members of an accumulator.
///
/// Single updates fail with [`Error::DuplicateMember`] or [`Error::NotAMember`]. Batch updates
/// apply entirely or not at all.
pub trait AccumulatorState {
    /// Whether `member` is present.
    fn has(&self, member: &Member) -> bool;

    /// Add a member that is not yet present.
    fn add(&mut self, member: Member) -> Result<(), Error>;

    /// Remove a present member.
    fn remove(&mut self, member: &Member) -> Result<(), Error>;

    /// Add every member, none of which may be present or repeated.
    fn add_batch(&mut self, members: &[Member]) -> Result<(), Error> {
        check_can_add(self, members)?;
        for member in members {
            self.add(*member)?;
        }
        Ok(())
    }

    /// Remove every member, all of which must be present and distinct.
    fn remove_batch(&mut self, members: &[Member]) -> Result<(), Error> {
        check_can_remove(self, members)?;
        for member in members {
            self.remove(member)?;
        }
        Ok(())
    }

    /// The number of members.
    fn size(&self) -> usize;
}

/// An [`AccumulatorState`] held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InMemoryState {
    members: BTreeSet<Member>,
}

impl InMemoryState {
    /// An empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// The members, in order of their encoding.
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.iter()
    }
}

impl AccumulatorState for InMemoryState {
    fn has(&self, member: &Member) -> bool {
        self.members.contains(member)
    }

    fn add(&mut self, member: Member) -> Result<(), Error> {
        if self.members.insert(member) {
            Ok(())
        } else {
            Err(Error::DuplicateMember)
        }
    }

    fn remove(&mut self, member: &Member) -> Result<(), Error> {
        if self.members.remove(member) {
            Ok(())
        } else {
            Err(Error::NotAMember)
        }
    }

    fn size(&self) -> usize {
        self.members.len()
    }
}

fn check_can_add<S: AccumulatorState + ?Sized>(state: &S, members: &[Member]) -> Result<(), Error> {
    let mut seen = BTreeSet::new();
    if members
        .iter()
        .any(|member| state.has(member) || !seen.insert(*member))
    {
        return Err(Error::DuplicateMember);
    }
    Ok(())
}

fn check_can_remove<S: AccumulatorState + ?Sized>(
    state: &S,
    members: &[Member],
) -> Result<(), Error> {
    let mut seen = BTreeSet::new();
    if members
        .iter()
        .any(|member| !state.has(member) || !seen.insert(*member))
    {
        return Err(Error::NotAMember);
    }
    Ok(())
}

/// Add `members` to the accumulator through `update`, then to `state`.
///
/// The state is checked before `update` runs and is left untouched if either fails.
pub fn add_then_commit<S, T>(
    state: &mut S,
    members: &[Member],
    update: impl FnOnce(&[Member]) -> Result<T, Error>,
) -> Result<T, Error>
where
    S: AccumulatorState + ?Sized,
{
    check_can_add(state, members)?;
    let updated = update(members)?;
    state.add_batch(members)?;
    tracing::info!(added = members.len(), size = state.size(), "accumulator updated");
    Ok(updated)
}

/// Remove `members` from the accumulator through `update`, then from `state`.
///
/// The state is checked before `update` runs and is left untouched if either fails.
pub fn remove_then_commit<S, T>(
    state: &mut S,
    members: &[Member],
    update: impl FnOnce(&[Member]) -> Result<T, Error>,
) -> Result<T, Error>
where
    S: AccumulatorState + ?Sized,
{
    check_can_remove(state, members)?;
    let updated = update(members)?;
    state.remove_batch(members)?;
    tracing::info!(removed = members.len(), size = state.size(), "accumulator updated");
    Ok(updated)
}

#[cfg(test)]
mod test {
    use super::*;

    fn member(id: &str) -> Member {
        Member::from_id(id)
    }

    #[test]
    fn single_updates() {
        let mut state = InMemoryState::new();
        state.add(member("a")).unwrap();
        assert!(state.has(&member("a")));
        assert_eq!(state.add(member("a")), Err(Error::DuplicateMember));
        state.remove(&member("a")).unwrap();
        assert_eq!(state.remove(&member("a")), Err(Error::NotAMember));
        assert_eq!(state.size(), 0);
    }

    #[test]
    fn batches_are_atomic() {
        let mut state = InMemoryState::new();
        state.add_batch(&[member("a"), member("b")]).unwrap();

        assert_eq!(
            state.add_batch(&[member("c"), member("a")]),
            Err(Error::DuplicateMember)
        );
        assert_eq!(
            state.add_batch(&[member("d"), member("d")]),
            Err(Error::DuplicateMember)
        );
        assert!(!state.has(&member("c")));
        assert!(!state.has(&member("d")));

        assert_eq!(
            state.remove_batch(&[member("a"), member("z")]),
            Err(Error::NotAMember)
        );
        assert_eq!(state.size(), 2);
    }

    #[test]
    fn failed_update_leaves_state_untouched() {
        let mut state = InMemoryState::new();
        let result: Result<(), Error> = add_then_commit(&mut state, &[member("a")], |_| {
            Err(Error::Unsupported("accumulator offline".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(state.size(), 0);

        let mut calls = 0;
        let result = add_then_commit(&mut state, &[member("a"), member("a")], |_| {
            calls += 1;
            Ok(())
        });
        assert_eq!(result, Err(Error::DuplicateMember));
        assert_eq!(calls, 0);
    }

    #[test]
    fn commit_returns_update_output() {
        let mut state = InMemoryState::new();
        let added = add_then_commit(&mut state, &[member("a"), member("b")], |members| {
            Ok(members.len())
        })
        .unwrap();
        assert_eq!(added, 2);
        remove_then_commit(&mut state, &[member("b")], |_| Ok(())).unwrap();
        assert_eq!(state.members().collect::<Vec<_>>(), vec![&member("a")]);
    }

    #[test]
    fn members_round_trip_through_scalars() {
        let scalar = Scalar::from(42u64);
        assert_eq!(Member::from(scalar).to_scalar(), Some(scalar));
    }
}
