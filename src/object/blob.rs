use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::repo::Repo;

/// write file content to the object store
///
/// the hash is computed over the uncompressed content.
pub fn write_blob(repo: &Repo, content: &[u8]) -> Result<Hash> {
    let hash = Hash::digest(content);
    let compressed = super::compress(content)?;
    super::store_object(repo, &repo.blobs_path(), &hash, &compressed)?;
    Ok(hash)
}

/// read file content from the object store, verifying its hash
pub fn read_blob(repo: &Repo, hash: &Hash) -> Result<Vec<u8>> {
    let (path, compressed) = super::load_compressed(&repo.blobs_path(), hash)?;
    let content = super::decompress(&path, &compressed)?;

    if Hash::digest(&content) != *hash {
        return Err(Error::CorruptObject(*hash));
    }

    Ok(content)
}

/// get the filesystem path to a blob object
pub fn blob_path(repo: &Repo, hash: &Hash) -> PathBuf {
    super::object_path(&repo.blobs_path(), hash)
}
