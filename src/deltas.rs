//! static deltas stored in the repository
//!
//! a static delta lives at `deltas/<name>/superblock`, where name is `TO` (from scratch)
//! or `FROM-TO`, both hex commit checksums. per-target indexes are kept in
//! `delta-indexes/<TO>.index` as a CBOR list of delta names.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::str::FromStr;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::Hash;
use crate::repo::Repo;

const SUPERBLOCK: &str = "superblock";
const INDEX_SUFFIX: &str = ".index";

/// a parsed static delta name
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeltaName {
    pub from: Option<Hash>,
    pub to: Hash,
}

impl FromStr for DeltaName {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        let invalid = || Error::InvalidDeltaName(name.to_string());
        match name.split_once('-') {
            Some((from, to)) => Ok(Self {
                from: Some(Hash::from_hex(from).map_err(|_| invalid())?),
                to: Hash::from_hex(to).map_err(|_| invalid())?,
            }),
            None => Ok(Self {
                from: None,
                to: Hash::from_hex(name).map_err(|_| invalid())?,
            }),
        }
    }
}

impl fmt::Display for DeltaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.from {
            Some(from) => write!(f, "{}-{}", from, self.to),
            None => write!(f, "{}", self.to),
        }
    }
}

/// names of all static deltas with a superblock, sorted
pub fn list_static_delta_names(repo: &Repo) -> Result<Vec<String>> {
    let dir = repo.deltas_path();
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(&dir).with_path(&dir)? {
        let entry = entry.with_path(&dir)?;
        let path = entry.path();
        if path.join(SUPERBLOCK).is_file() {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
    }

    names.sort();
    Ok(names)
}

/// raw superblock bytes of a static delta
pub fn read_static_delta_superblock(repo: &Repo, name: &str) -> Result<Vec<u8>> {
    let path = repo.deltas_path().join(name).join(SUPERBLOCK);
    fs::read(&path).with_path(&path)
}

/// store a static delta superblock
pub fn write_static_delta(repo: &Repo, name: &DeltaName, superblock: &[u8]) -> Result<()> {
    let dir = repo.deltas_path().join(name.to_string());
    fs::create_dir_all(&dir).with_path(&dir)?;
    crate::fs::write_atomic(&repo.tmp_path(), &dir.join(SUPERBLOCK), superblock)
}

/// a static delta as advertised in summaries
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticDelta {
    pub name: String,
    pub to: Hash,
    /// sha256 of the superblock
    pub digest: Hash,
}

/// load the named static deltas; names that do not parse are skipped
pub fn load_static_deltas(repo: &Repo, names: &[String]) -> Result<Vec<StaticDelta>> {
    let mut deltas = Vec::with_capacity(names.len());
    for name in names {
        let parsed = match name.parse::<DeltaName>() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!("ignoring static delta with invalid name {}", name);
                continue;
            }
        };
        let superblock = read_static_delta_superblock(repo, name)?;
        deltas.push(StaticDelta {
            name: name.clone(),
            to: parsed.to,
            digest: Hash::digest(&superblock),
        });
    }
    Ok(deltas)
}

/// rebuild the per-target delta indexes
///
/// every target commit gets an index listing the deltas that lead to it;
/// index files for targets without deltas are removed. names that do not parse
/// are left out of the index.
pub fn reindex_static_deltas(repo: &Repo) -> Result<()> {
    let mut by_target: BTreeMap<Hash, Vec<String>> = BTreeMap::new();
    for name in list_static_delta_names(repo)? {
        match name.parse::<DeltaName>() {
            Ok(parsed) => by_target.entry(parsed.to).or_default().push(name),
            Err(_) => tracing::warn!("ignoring static delta with invalid name {}", name),
        }
    }

    let index_dir = repo.delta_indexes_path();
    fs::create_dir_all(&index_dir).with_path(&index_dir)?;

    for (target, names) in &by_target {
        let mut cbor = Vec::new();
        ciborium::into_writer(names, &mut cbor)?;
        let path = index_dir.join(format!("{}{}", target, INDEX_SUFFIX));
        crate::fs::write_atomic(&repo.tmp_path(), &path, &cbor)?;
    }

    for entry in fs::read_dir(&index_dir).with_path(&index_dir)? {
        let entry = entry.with_path(&index_dir)?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        let Some(hex) = file_name.strip_suffix(INDEX_SUFFIX) else {
            continue;
        };
        let stale = match Hash::from_hex(hex) {
            Ok(target) => !by_target.contains_key(&target),
            Err(_) => false,
        };
        if stale {
            let path = entry.path();
            fs::remove_file(&path).with_path(&path)?;
        }
    }

    Ok(())
}

/// read the delta index for a target commit
pub fn read_delta_index(repo: &Repo, target: &Hash) -> Result<Vec<String>> {
    let path = repo
        .delta_indexes_path()
        .join(format!("{}{}", target, INDEX_SUFFIX));
    match crate::fs::read_optional(&path)? {
        Some(cbor) => Ok(ciborium::from_reader(&cbor[..])?),
        None => Ok(vec![]),
    }
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
    fn test_parse_delta_names() {
        let a = Hash::digest(b"a");
        let b = Hash::digest(b"b");

        let scratch: DeltaName = b.to_hex().parse().unwrap();
        assert_eq!(scratch, DeltaName { from: None, to: b });
        assert_eq!(scratch.to_string(), b.to_hex());

        let name = format!("{}-{}", a, b);
        let delta: DeltaName = name.parse().unwrap();
        assert_eq!(delta.from, Some(a));
        assert_eq!(delta.to, b);
        assert_eq!(delta.to_string(), name);

        assert!("nope".parse::<DeltaName>().is_err());
        assert!(format!("{}-zz", a).parse::<DeltaName>().is_err());
    }

    #[test]
    fn test_list_and_read_superblock() {
        let (_dir, repo) = test_repo();
        assert!(list_static_delta_names(&repo).unwrap().is_empty());

        let to = Hash::digest(b"to");
        let name = DeltaName { from: None, to };
        write_static_delta(&repo, &name, b"superblock-bytes").unwrap();

        assert_eq!(list_static_delta_names(&repo).unwrap(), vec![to.to_hex()]);
        assert_eq!(
            read_static_delta_superblock(&repo, &to.to_hex()).unwrap(),
            b"superblock-bytes"
        );
    }

    #[test]
    fn test_load_static_deltas() {
        let (_dir, repo) = test_repo();

        let to = Hash::digest(b"to");
        let name = DeltaName { from: None, to };
        write_static_delta(&repo, &name, b"superblock-bytes").unwrap();
        fs::create_dir_all(repo.deltas_path().join("bogus")).unwrap();
        fs::write(repo.deltas_path().join("bogus").join(SUPERBLOCK), b"x").unwrap();

        let names = list_static_delta_names(&repo).unwrap();
        assert_eq!(names.len(), 2);

        let deltas = load_static_deltas(&repo, &names).unwrap();
        assert_eq!(
            deltas,
            vec![StaticDelta {
                name: to.to_hex(),
                to,
                digest: Hash::digest(b"superblock-bytes"),
            }]
        );
    }

    #[test]
    fn test_reindex_static_deltas() {
        let (_dir, repo) = test_repo();

        let from = Hash::digest(b"from");
        let to = Hash::digest(b"to");
        let scratch = DeltaName { from: None, to };
        let incremental = DeltaName { from: Some(from), to };
        write_static_delta(&repo, &scratch, b"1").unwrap();
        write_static_delta(&repo, &incremental, b"2").unwrap();

        reindex_static_deltas(&repo).unwrap();
        let mut indexed = read_delta_index(&repo, &to).unwrap();
        indexed.sort();
        let mut expected = vec![scratch.to_string(), incremental.to_string()];
        expected.sort();
        assert_eq!(indexed, expected);

        // drop the deltas, the index goes away on the next reindex
        fs::remove_dir_all(repo.deltas_path().join(scratch.to_string())).unwrap();
        fs::remove_dir_all(repo.deltas_path().join(incremental.to_string())).unwrap();
        reindex_static_deltas(&repo).unwrap();
        assert!(read_delta_index(&repo, &to).unwrap().is_empty());
        assert_eq!(fs::read_dir(repo.delta_indexes_path()).unwrap().count(), 0);
    }
}
