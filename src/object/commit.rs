use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::repo::Repo;
use crate::types::Commit;

/// a commit together with the size of its serialized form
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedCommit {
    pub commit: Commit,
    /// length of the uncompressed CBOR encoding
    pub size: u64,
}

/// write a commit to the object store
///
/// commits are serialized as CBOR, then zstd compressed.
/// the hash is computed over the compressed bytes.
pub fn write_commit(repo: &Repo, commit: &Commit) -> Result<Hash> {
    let mut cbor_bytes = Vec::new();
    ciborium::into_writer(commit, &mut cbor_bytes)?;

    let compressed = super::compress(&cbor_bytes)?;
    let hash = Hash::digest(&compressed);
    super::store_object(repo, &repo.commits_path(), &hash, &compressed)?;

    Ok(hash)
}

/// load a commit and its serialized size
pub fn load_commit(repo: &Repo, hash: &Hash) -> Result<LoadedCommit> {
    let (path, compressed) = super::load_compressed(&repo.commits_path(), hash)?;

    if Hash::digest(&compressed) != *hash {
        return Err(Error::CorruptObject(*hash));
    }

    let cbor_bytes = super::decompress(&path, &compressed)?;
    let commit: Commit = ciborium::from_reader(&cbor_bytes[..])?;

    Ok(LoadedCommit {
        commit,
        size: cbor_bytes.len() as u64,
    })
}

/// read a commit from the object store
pub fn read_commit(repo: &Repo, hash: &Hash) -> Result<Commit> {
    load_commit(repo, hash).map(|loaded| loaded.commit)
}

/// get the filesystem path to a commit object
pub fn commit_path(repo: &Repo, hash: &Hash) -> PathBuf {
    super::object_path(&repo.commits_path(), hash)
}

/// check if a commit exists in the object store
pub fn commit_exists(repo: &Repo, hash: &Hash) -> bool {
    commit_path(repo, hash).exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let repo = Repo::init(&dir.path().join("repo")).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_write_and_load_commit() {
        let (_dir, repo) = test_repo();

        let commit = Commit::with_timestamp(Hash::ZERO, vec![], 1234567890, "test commit")
            .with_metadata("xa.installed-size", 42u64);

        let hash = write_commit(&repo, &commit).unwrap();
        assert!(commit_exists(&repo, &hash));

        let loaded = load_commit(&repo, &hash).unwrap();
        assert_eq!(loaded.commit, commit);

        let mut expected = Vec::new();
        ciborium::into_writer(&commit, &mut expected).unwrap();
        assert_eq!(loaded.size, expected.len() as u64);
    }

    #[test]
    fn test_commit_deduplication() {
        let (_dir, repo) = test_repo();

        let commit = Commit::with_timestamp(Hash::ZERO, vec![], 1234567890, "test");
        let h1 = write_commit(&repo, &commit).unwrap();
        let h2 = write_commit(&repo, &commit).unwrap();

        assert_eq!(h1, h2);
    }

    #[test]
    fn test_read_nonexistent_commit() {
        let (_dir, repo) = test_repo();

        let result = read_commit(&repo, &Hash::digest(b"nope"));
        assert!(matches!(result, Err(Error::ObjectNotFound(_))));
    }

    #[test]
    fn test_corrupt_commit_detected() {
        let (_dir, repo) = test_repo();

        let hash = write_commit(&repo, &Commit::with_timestamp(Hash::ZERO, vec![], 1, "x")).unwrap();
        std::fs::write(commit_path(&repo, &hash), b"garbage").unwrap();

        assert!(matches!(read_commit(&repo, &hash), Err(Error::CorruptObject(_))));
    }
}
