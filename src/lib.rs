//! flatrepo - summaries and summary indexes for flatpak-style repositories
//!
//! a repository is a content-addressed object store (blobs, trees, commits) with
//! refs such as `app/org.foo.Bar/x86_64/stable`. clients discover what it
//! contains through published summaries:
//!
//! - **summary**: the compat summary, every ref in one file
//! - **summary.idx**: the index, one partition summary per (subset, arch) pair
//! - **summaries/<digest>.gz**: partition summaries, addressed by sha256
//! - **summaries/<from>-<to>.delta**: diffs that let clients update a cached
//!   partition summary without fetching it whole
//!
//! [`ops::update_repo`] regenerates all of these in one pass.
//!
//! # Example usage
//!
//! ```no_run
//! use flatrepo::{ops, Repo};
//! use std::path::Path;
//!
//! let repo = Repo::open(Path::new("/srv/repo")).unwrap();
//! let report = ops::update_repo(&repo, &ops::UpdateOptions::default(), None).unwrap();
//! println!("index {:?}", report.index_digest);
//! ```

mod config;
mod error;
mod hash;
mod object;
mod refs;
mod repo;

pub mod deltas;
pub mod fs;
pub mod ops;
pub mod sign;
pub mod summary;
pub mod types;

pub use config::{Config, CoreConfig, FlatpakConfig, DEFAULT_SUMMARY_HISTORY_LENGTH};
pub use error::{Error, Result};
pub use hash::Hash;
pub use object::{
    blob_path, commit_exists, commit_path, load_commit, read_blob, read_commit, read_commit_file,
    read_tree, tree_path, write_blob, write_commit, write_tree, LoadedCommit,
};
pub use refs::{list_ref_commits, list_refs, read_ref, write_ref};
pub use repo::{Repo, RepoLock};
pub use types::{Commit, EntryKind, MetaDict, MetaValue, PackageRef, RefKind, Tree, TreeEntry};
