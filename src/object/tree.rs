use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::{read_blob, read_commit};
use crate::repo::Repo;
use crate::types::{EntryKind, Tree};

/// write a tree to the object store
///
/// trees are serialized as CBOR, then zstd compressed.
/// the hash is computed over the compressed bytes.
pub fn write_tree(repo: &Repo, tree: &Tree) -> Result<Hash> {
    let mut cbor_bytes = Vec::new();
    ciborium::into_writer(tree, &mut cbor_bytes)?;

    let compressed = super::compress(&cbor_bytes)?;
    let hash = Hash::digest(&compressed);
    super::store_object(repo, &repo.trees_path(), &hash, &compressed)?;

    Ok(hash)
}

/// read a tree from the object store
pub fn read_tree(repo: &Repo, hash: &Hash) -> Result<Tree> {
    let (path, compressed) = super::load_compressed(&repo.trees_path(), hash)?;

    if Hash::digest(&compressed) != *hash {
        return Err(Error::CorruptObject(*hash));
    }

    let cbor_bytes = super::decompress(&path, &compressed)?;
    let tree: Tree = ciborium::from_reader(&cbor_bytes[..])?;

    Ok(tree)
}

/// get the filesystem path to a tree object
pub fn tree_path(repo: &Repo, hash: &Hash) -> PathBuf {
    super::object_path(&repo.trees_path(), hash)
}

/// read a file from the root tree of a commit, e.g. the `metadata` file
///
/// `path` is relative to the commit root and may contain '/'.
pub fn read_commit_file(repo: &Repo, commit: &Hash, path: &str) -> Result<Vec<u8>> {
    let not_found = || Error::FileNotInCommit {
        commit: *commit,
        path: path.to_string(),
    };

    let mut tree = read_tree(repo, &read_commit(repo, commit)?.tree)?;
    let mut components = path.split('/').filter(|c| !c.is_empty()).peekable();

    while let Some(name) = components.next() {
        let last = components.peek().is_none();
        let subtree = match (&tree.get(name).ok_or_else(not_found)?.kind, last) {
            (EntryKind::File { hash, .. }, true) => return read_blob(repo, hash),
            (EntryKind::Directory { hash }, false) => *hash,
            _ => return Err(not_found()),
        };
        tree = read_tree(repo, &subtree)?;
    }

    Err(not_found())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{write_blob, write_commit};
    use crate::types::{Commit, TreeEntry};
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let repo = Repo::init(&dir.path().join("repo")).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_write_and_read_tree() {
        let (_dir, repo) = test_repo();

        let blob = write_blob(&repo, b"content").unwrap();
        let tree = Tree::new(vec![TreeEntry::file("metadata", blob, 7)]).unwrap();

        let hash = write_tree(&repo, &tree).unwrap();
        assert!(tree_path(&repo, &hash).exists());
        assert_eq!(read_tree(&repo, &hash).unwrap(), tree);
    }

    #[test]
    fn test_read_commit_file() {
        let (_dir, repo) = test_repo();

        let meta = write_blob(&repo, b"[Runtime]\n").unwrap();
        let nested = write_blob(&repo, b"nested").unwrap();
        let files = write_tree(&repo, &Tree::new(vec![TreeEntry::file("x", nested, 6)]).unwrap())
            .unwrap();
        let root = write_tree(
            &repo,
            &Tree::new(vec![
                TreeEntry::file("metadata", meta, 10),
                TreeEntry::directory("files", files),
            ])
            .unwrap(),
        )
        .unwrap();
        let commit = write_commit(&repo, &Commit::with_timestamp(root, vec![], 1, "c")).unwrap();

        assert_eq!(read_commit_file(&repo, &commit, "metadata").unwrap(), b"[Runtime]\n");
        assert_eq!(read_commit_file(&repo, &commit, "files/x").unwrap(), b"nested");
        assert!(matches!(
            read_commit_file(&repo, &commit, "files"),
            Err(Error::FileNotInCommit { .. })
        ));
        assert!(matches!(
            read_commit_file(&repo, &commit, "missing"),
            Err(Error::FileNotInCommit { .. })
        ));
    }
}
