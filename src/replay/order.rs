//! The change orderer: one changeset's raw changes to one replay sequence.
//!
//! Changes are partitioned by their full-masked flags (core mask plus
//! `SourceRename`) into nine buckets, emitted in [`Bucket`] order. Within a
//! bucket the source order is kept. Changes with no flags left after masking
//! are dropped.
//!
//! Swap buckets come last: by the time they run, ordinary renames have
//! already settled which destinations are genuinely occupied.

use std::fmt;

use serde::Serialize;

use crate::error::ReplayError;
use crate::model::{CanonicalAction, Change, ChangeFlags, Changeset, UnmanagedFlags, classify};

/// Replay priority group. Variants are declared in emission order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Bucket {
    /// Rename, Rename+Edit, Rename+Delete.
    Rename,
    /// Undelete [+ Edit].
    Undelete,
    /// Add [+ Edit].
    Add,
    /// Delete.
    Delete,
    /// Edit.
    Edit,
    /// Branch [+ Edit].
    Branch,
    /// SourceRename + Delete: the vacated side of a swap.
    SwapDelete,
    /// SourceRename with Edit and/or Rename: the incoming side of a swap.
    SwapIncoming,
    /// SourceRename + Add [+ Edit]: items introduced as part of a swap.
    SwapAdd,
}

impl Bucket {
    /// All buckets in emission order.
    pub const ALL: [Self; 9] = [
        Self::Rename,
        Self::Undelete,
        Self::Add,
        Self::Delete,
        Self::Edit,
        Self::Branch,
        Self::SwapDelete,
        Self::SwapIncoming,
        Self::SwapAdd,
    ];

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rename => "rename",
            Self::Undelete => "undelete",
            Self::Add => "add",
            Self::Delete => "delete",
            Self::Edit => "edit",
            Self::Branch => "branch",
            Self::SwapDelete => "swap-delete",
            Self::SwapIncoming => "swap-rename/edit",
            Self::SwapAdd => "swap-add",
        };
        f.write_str(name)
    }
}

const SR: ChangeFlags = ChangeFlags::SOURCE_RENAME;
const SR_DELETE: ChangeFlags = SR.union(ChangeFlags::DELETE);
const SR_EDIT: ChangeFlags = SR.union(ChangeFlags::EDIT);
const SR_RENAME: ChangeFlags = SR.union(ChangeFlags::RENAME);
const SR_RENAME_EDIT: ChangeFlags = SR_RENAME.union(ChangeFlags::EDIT);
const SR_ADD: ChangeFlags = SR.union(ChangeFlags::ADD);
const SR_ADD_EDIT: ChangeFlags = SR_ADD.union(ChangeFlags::EDIT);
const UNDELETE_EDIT: ChangeFlags = ChangeFlags::UNDELETE.union(ChangeFlags::EDIT);
const RENAME_EDIT: ChangeFlags = ChangeFlags::RENAME.union(ChangeFlags::EDIT);
const RENAME_DELETE: ChangeFlags = ChangeFlags::RENAME.union(ChangeFlags::DELETE);
const BRANCH_EDIT: ChangeFlags = ChangeFlags::BRANCH.union(ChangeFlags::EDIT);
const ADD_EDIT: ChangeFlags = ChangeFlags::ADD.union(ChangeFlags::EDIT);

/// The bucket for `flags`, `None` if the change is dropped.
///
/// # Errors
/// Returns [`UnmanagedFlags`] (masked with the full mask) for combinations
/// no bucket accepts.
pub fn bucket_for(flags: ChangeFlags) -> Result<Option<Bucket>, UnmanagedFlags> {
    let masked = flags.masked(ChangeFlags::FULL_MASK);
    let bucket = match masked {
        SR_DELETE => Bucket::SwapDelete,
        SR_EDIT | SR_RENAME | SR_RENAME_EDIT => Bucket::SwapIncoming,
        SR_ADD | SR_ADD_EDIT => Bucket::SwapAdd,
        ChangeFlags::UNDELETE | UNDELETE_EDIT => Bucket::Undelete,
        ChangeFlags::RENAME | RENAME_EDIT | RENAME_DELETE => Bucket::Rename,
        ChangeFlags::BRANCH | BRANCH_EDIT => Bucket::Branch,
        ChangeFlags::ADD | ADD_EDIT => Bucket::Add,
        ChangeFlags::DELETE => Bucket::Delete,
        ChangeFlags::EDIT => Bucket::Edit,
        ChangeFlags::EMPTY => return Ok(None),
        _ => return Err(UnmanagedFlags { raw: flags, masked }),
    };
    Ok(Some(bucket))
}

/// One entry of the replay sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlannedChange {
    /// The raw change.
    pub change: Change,
    /// The bucket it was ordered into.
    pub bucket: Bucket,
    /// What replaying it does.
    pub action: CanonicalAction,
}

/// Order every change of `changeset` for replay.
///
/// Classification happens here for the whole changeset, so an unmanaged
/// change is reported before anything is applied.
///
/// # Errors
/// Returns [`ReplayError::UnorderableChange`] or
/// [`ReplayError::UnmanagedChange`] for the first rejected change.
pub fn order_changes(changeset: &Changeset) -> Result<Vec<PlannedChange>, ReplayError> {
    let mut buckets: [Vec<PlannedChange>; 9] = Default::default();

    for change in &changeset.changes {
        let bucket = bucket_for(change.flags).map_err(|e| ReplayError::UnorderableChange {
            changeset: changeset.id,
            path: change.path().to_owned(),
            raw: e.raw,
            masked: e.masked,
        })?;
        let Some(bucket) = bucket else {
            continue;
        };
        let action = classify(change.flags).map_err(|e| ReplayError::UnmanagedChange {
            changeset: changeset.id,
            path: change.path().to_owned(),
            raw: e.raw,
            masked: e.masked,
        })?;
        buckets[bucket.index()].push(PlannedChange {
            change: change.clone(),
            bucket,
            action,
        });
    }

    let ordered: Vec<PlannedChange> = buckets.into_iter().flatten().collect();

    tracing::debug!(changeset = %changeset.id, "ordered changes - begin");
    for planned in &ordered {
        tracing::debug!(
            path = %planned.change.path(),
            flags = %planned.change.flags,
            bucket = %planned.bucket,
            action = %planned.action,
            "ordered change"
        );
    }
    tracing::debug!(changeset = %changeset.id, "ordered changes - end");

    Ok(ordered)
}


// ---------------------------------------------------------------------------
// Property tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod proptests {
    use chrono::Utc;
    use proptest::prelude::*;

    use super::*;
    use crate::model::{ChangesetId, Item, ItemKind};

    fn arb_orderable_flags() -> impl Strategy<Value = ChangeFlags> {
        prop_oneof![
            Just(ChangeFlags::EMPTY),
            Just(ChangeFlags::ADD),
            Just(ADD_EDIT),
            Just(ChangeFlags::EDIT),
            Just(ChangeFlags::DELETE),
            Just(ChangeFlags::RENAME),
            Just(RENAME_EDIT),
            Just(RENAME_DELETE),
            Just(ChangeFlags::BRANCH),
            Just(BRANCH_EDIT),
            Just(ChangeFlags::UNDELETE),
            Just(UNDELETE_EDIT),
            Just(SR_DELETE),
            Just(SR_EDIT),
            Just(SR_RENAME),
            Just(SR_RENAME_EDIT),
            Just(SR_ADD),
            Just(SR_ADD_EDIT),
            Just(ChangeFlags::LOCK | ChangeFlags::EDIT),
        ]
    }

    fn arb_changeset() -> impl Strategy<Value = Changeset> {
        prop::collection::vec(arb_orderable_flags(), 0..24).prop_map(|flags| Changeset {
            id: ChangesetId::new(1),
            committer: "x".to_owned(),
            comment: String::new(),
            created_at: Utc::now(),
            changes: flags
                .into_iter()
                .enumerate()
                .map(|(i, f)| {
                    Change::new(
                        Item::new(format!("$/P/{i}"), ItemKind::File, i as u64, ChangesetId::new(1)),
                        f,
                    )
                })
                .collect(),
        })
    }

    proptest! {
        #[test]
        fn prop_sequence_is_permutation_of_kept_changes(cs in arb_changeset()) {
            let ordered = order_changes(&cs).unwrap();
            let mut kept: Vec<u64> = cs
                .changes
                .iter()
                .filter(|c| !c.flags.masked(ChangeFlags::FULL_MASK).is_empty())
                .map(|c| c.item.item_id)
                .collect();
            let mut got: Vec<u64> = ordered.iter().map(|p| p.change.item.item_id).collect();
            kept.sort_unstable();
            got.sort_unstable();
            prop_assert_eq!(got, kept);
        }

        #[test]
        fn prop_buckets_non_decreasing_and_stable(cs in arb_changeset()) {
            let ordered = order_changes(&cs).unwrap();
            for pair in ordered.windows(2) {
                prop_assert!(pair[0].bucket <= pair[1].bucket);
                if pair[0].bucket == pair[1].bucket {
                    // ids were assigned in source order
                    prop_assert!(pair[0].change.item.item_id < pair[1].change.item.item_id);
                }
            }
        }

        #[test]
        fn prop_no_none_actions_survive(cs in arb_changeset()) {
            let ordered = order_changes(&cs).unwrap();
            prop_assert!(ordered.iter().all(|p| p.action != CanonicalAction::None));
        }

        #[test]
        fn prop_ordering_is_deterministic(cs in arb_changeset()) {
            prop_assert_eq!(order_changes(&cs).unwrap(), order_changes(&cs).unwrap());
        }
    }
}
