//! History model for histport.
//!
//! Types describing what the history source reports ([`types`], [`flags`])
//! and the change classifier that reduces raw flags to one
//! [`CanonicalAction`](action::CanonicalAction) ([`action`]).

pub mod action;
pub mod flags;
pub mod types;

pub use action::{CanonicalAction, UnmanagedFlags, classify};
pub use flags::ChangeFlags;
pub use types::{Change, Changeset, ChangesetId, Item, ItemKind};
