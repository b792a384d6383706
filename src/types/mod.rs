mod commit;
pub mod refname;
mod tree;
mod variant;

pub use commit::Commit;
pub use refname::{PackageRef, RefKind};
pub use tree::{EntryKind, Tree, TreeEntry};
pub use variant::{MetaDict, MetaValue};
