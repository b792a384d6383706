//! object store: blobs, trees and commits, each zstd compressed and content addressed

pub mod blob;
pub mod commit;
pub mod tree;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, IoResultExt, Result};
use crate::hash::Hash;
use crate::repo::Repo;

pub use blob::{blob_path, read_blob, write_blob};
pub use commit::{commit_exists, commit_path, load_commit, read_commit, write_commit, LoadedCommit};
pub use tree::{read_commit_file, read_tree, tree_path, write_tree};

/// zstd level used for all objects (fast, reasonable ratio)
const ZSTD_LEVEL: i32 = 3;

fn object_path(base: &Path, hash: &Hash) -> PathBuf {
    let (dir, file) = hash.to_path_components();
    base.join(dir).join(file)
}

/// compress and store `raw` under `base`, keyed by `hash`
///
/// dedup: an object that already exists is not rewritten.
fn store_object(repo: &Repo, base: &Path, hash: &Hash, compressed: &[u8]) -> Result<()> {
    let path = object_path(base, hash);
    if path.exists() {
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_path(parent)?;
    }

    crate::fs::write_atomic(&repo.tmp_path(), &path, compressed)
}

fn compress(raw: &[u8]) -> Result<Vec<u8>> {
    zstd::encode_all(raw, ZSTD_LEVEL).with_path("<zstd>")
}

/// read the compressed bytes of an object, mapping a missing file to ObjectNotFound
fn load_compressed(base: &Path, hash: &Hash) -> Result<(PathBuf, Vec<u8>)> {
    let path = object_path(base, hash);
    let compressed = fs::read(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::ObjectNotFound(*hash)
        } else {
            Error::Io {
                path: path.clone(),
                source: e,
            }
        }
    })?;
    Ok((path, compressed))
}

fn decompress(path: &Path, compressed: &[u8]) -> Result<Vec<u8>> {
    zstd::decode_all(compressed).with_path(path)
}
