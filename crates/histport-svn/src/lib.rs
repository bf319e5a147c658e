//! Replication-target layer for histport.
//!
//! This crate defines the [`ReplicaTarget`] trait: the single interface
//! through which the replay engine touches the downstream repository and its
//! working copy. The engine never shells out to `svn` itself; it programs
//! against the trait, which keeps it testable with recording fakes.
//!
//! # Crate layout
//!
//! - [`target`]: the [`ReplicaTarget`] trait definition.
//! - [`types`]: value types used in trait signatures ([`Revision`]).
//! - [`error`]: the [`SvnError`] enum returned by all trait methods.

pub mod error;
pub mod target;
pub mod types;

// svn command-line implementation
mod cli;

pub use cli::SvnCli;

pub use error::SvnError;
pub use target::ReplicaTarget;
pub use types::{Revision, RevisionParseError};
