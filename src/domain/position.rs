//! Ordering primitives shared by the client store and the server.
//!
//! Two strategies live here. Reference order treats the sequence itself as
//! the order and is used for moving whole members around a `Vec`. Integer
//! position gives each member a `position` equal to its index, renumbered
//! contiguously from 0 on every write that touches the container. There is
//! no gap or fractional scheme.

use crate::error::{BoardhubError, Result};
use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;

/// Integer rank of a member inside its container
pub type Position = u32;

/// A member of an ordered container carrying an integer position
pub trait Positioned {
    fn position(&self) -> Position;
    fn set_position(&mut self, position: Position);
}

/// Indices past the end clamp to an append.
pub fn clamp_index(len: usize, index: usize) -> usize {
    index.min(len)
}

/// Inserts `item` at `index` (clamped) and returns the index actually used.
pub fn insert_at<T>(items: &mut Vec<T>, index: usize, item: T) -> usize {
    let index = clamp_index(items.len(), index);
    items.insert(index, item);
    index
}

/// Moves the member at `from` so that it ends up at `to`.
///
/// `to` is interpreted against the sequence with the member already removed,
/// which is what a drop indicator shows. Returns the final index, or `None`
/// if `from` is out of range.
pub fn move_to<T>(items: &mut Vec<T>, from: usize, to: usize) -> Option<usize> {
    if from >= items.len() {
        return None;
    }
    let item = items.remove(from);
    Some(insert_at(items, to, item))
}

/// Position for the member at `index`.
///
/// A container holds at most `Position::MAX + 1` members; larger indices are
/// a validation error.
pub fn position_at(index: usize) -> Result<Position> {
    Position::try_from(index).map_err(|_| {
        BoardhubError::Validation(format!(
            "container cannot hold more than {} members",
            u64::from(Position::MAX) + 1
        ))
    })
}

/// Assigns `position = index` to every member.
///
/// Returns how many members actually changed, so callers can skip writing
/// untouched records.
pub fn renumber<T: Positioned>(items: &mut [T]) -> Result<usize> {
    Ok(renumber_changed(items)?.len())
}

/// Like [`renumber`], but returns the indices of the members that changed.
pub fn renumber_changed<T: Positioned>(items: &mut [T]) -> Result<Vec<usize>> {
    let mut changed = Vec::new();
    for (index, item) in items.iter_mut().enumerate() {
        let position = position_at(index)?;
        if item.position() != position {
            item.set_position(position);
            changed.push(index);
        }
    }
    Ok(changed)
}

/// True when positions read 0, 1, 2, ... in sequence order.
pub fn is_contiguous<T: Positioned>(items: &[T]) -> bool {
    items
        .iter()
        .enumerate()
        .all(|(index, item)| position_at(index).map_or(false, |p| p == item.position()))
}

/// Checks that `proposed` is a permutation of `current`.
///
/// Missing, foreign and duplicated ids are all rejected with a validation
/// error naming the first offender.
pub fn check_permutation<K>(current: &[K], proposed: &[K]) -> Result<()>
where
    K: Eq + Hash + Display,
{
    let known: HashSet<&K> = current.iter().collect();
    let mut seen: HashSet<&K> = HashSet::with_capacity(proposed.len());

    for id in proposed {
        if !known.contains(id) {
            return Err(BoardhubError::Validation(format!(
                "unknown member in new order: {id}"
            )));
        }
        if !seen.insert(id) {
            return Err(BoardhubError::Validation(format!(
                "duplicate member in new order: {id}"
            )));
        }
    }

    if let Some(missing) = current.iter().find(|id| !seen.contains(id)) {
        return Err(BoardhubError::Validation(format!(
            "new order is missing member: {missing}"
        )));
    }

    Ok(())
}
