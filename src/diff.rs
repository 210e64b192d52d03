//! Change detection between the source corpus and the destination index.
//!
//! Compares two metadata snapshots keyed by path and classifies every file
//! as new, updated, deleted, or unchanged. The result is a
//! [`ReconciliationPlan`] that the pipeline driver consumes once.
//!
//! The comparison is a pure function of the two snapshots: no I/O, no hidden
//! state. Re-running it on identical snapshots yields an identical plan.

use std::collections::{HashMap, HashSet};

use crate::models::{FileMetadata, ReconciliationPlan};

/// Compute the mutation plan from the current source listing and the
/// aggregated index listing (one record per distinct indexed path).
///
/// Classification per source path:
/// - absent from the index → new (process);
/// - present with a different token → updated (process, delete old entries);
/// - present with an equal non-empty token → unchanged (skip).
///
/// A missing or empty token on either side is treated as always-changed:
/// reprocessing a file needlessly is cheaper than silently skipping a stale
/// one. Every indexed path absent from the source is deleted.
pub fn compute_plan(
    source: &[FileMetadata],
    indexed: &[FileMetadata],
) -> ReconciliationPlan {
    let indexed_by_path: HashMap<&str, &FileMetadata> =
        indexed.iter().map(|m| (m.path.as_str(), m)).collect();
    let source_paths: HashSet<&str> = source.iter().map(|m| m.path.as_str()).collect();

    let mut plan = ReconciliationPlan::default();

    for file in source {
        match indexed_by_path.get(file.path.as_str()) {
            None => plan.to_process.push(file.clone()),
            Some(old) => {
                let tokens_match = !file.change_token.is_empty()
                    && !old.change_token.is_empty()
                    && file.change_token == old.change_token;
                if tokens_match {
                    plan.unchanged.push(file.path.clone());
                } else {
                    plan.updated.push(file.path.clone());
                    plan.to_process.push(file.clone());
                    plan.to_delete.push(file.path.clone());
                }
            }
        }
    }

    for old in indexed {
        if !source_paths.contains(old.path.as_str()) {
            plan.to_delete.push(old.path.clone());
        }
    }

    plan
}
