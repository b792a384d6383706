//! high-level operations on flatpak repositories

mod update;

pub use update::{update_repo, UpdateOptions, UpdateReport};
