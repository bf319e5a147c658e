//! histport: replays version-control history into Subversion, one changeset
//! per revision, keeping authors, dates and structural operations.
//!
//! The `histport` binary is a thin layer over this library. Library callers
//! plug in their own [`source::HistorySource`] and
//! [`histport_svn::ReplicaTarget`] and drive a [`replay::Replicator`].
//!
//! ```no_run
//! use histport::progress::NoopObserver;
//! use histport::replay::{ReplicationOptions, Replicator};
//! use histport::source::DumpSource;
//! use histport::users::UsernameMap;
//! use histport_svn::SvnCli;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = DumpSource::open(Path::new("export"))?;
//! let target = SvnCli::new("file:///srv/svn/project", Path::new("/tmp/wc"));
//! let replicator = Replicator::new(
//!     &source,
//!     &target,
//!     "$/Project/Main",
//!     UsernameMap::new(),
//!     ReplicationOptions::default(),
//! );
//! let summary = replicator.run(&mut NoopObserver)?;
//! println!("replayed {} changesets", summary.replayed);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod progress;
pub mod replay;
pub mod source;
pub mod telemetry;
pub mod users;

pub use error::ReplayError;
