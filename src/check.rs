//! Invariant checks over any [`IntSet`].
//!
//! A failure here is a correctness bug in the set, never a condition to recover from.

use crate::IntSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantError {
    #[error("range yielded {next} after {prev}; members must be strictly ascending")]
    OutOfOrder { prev: i64, next: i64 },
    #[error("len() reports {reported} members but range visited {visited}")]
    CountMismatch { reported: usize, visited: usize },
}

/// Walks `set` once, checking that members come out strictly ascending (which also rules out
/// duplicates). Returns how many were visited.
///
/// Safe to call while other threads mutate the set.
pub fn ascending<S: IntSet>(set: &S) -> Result<usize, InvariantError> {
    let mut prev: Option<i64> = None;
    let mut visited = 0;
    let mut failure = None;
    set.range(|v| {
        if let Some(p) = prev {
            if v <= p {
                failure = Some(InvariantError::OutOfOrder { prev: p, next: v });
                return false;
            }
        }
        prev = Some(v);
        visited += 1;
        true
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(visited),
    }
}

/// [`ascending`], plus the running count must match the members actually linked.
///
/// Only meaningful once every in-flight insert and delete has returned.
pub fn quiescent<S: IntSet>(set: &S) -> Result<(), InvariantError> {
    let visited = ascending(set)?;
    let reported = set.len();
    if reported != visited {
        return Err(InvariantError::CountMismatch { reported, visited });
    }
    Ok(())
}
