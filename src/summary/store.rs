//! content-addressed storage of partition summaries and the deltas between them
//!
//! everything lives flat in `summaries/`:
//!
//! ```text
//! <digest>.gz           gzip'd summary bytes, digest = sha256 of the uncompressed bytes
//! <from>-<to>.delta     gzip'd diff stream turning summary <from> into summary <to>
//! <digest>.idx.sig      signatures of the index with that digest
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;

use walkdir::WalkDir;

use crate::error::{Error, IoResultExt, Result};
use crate::fs::{file_size, gzip_compress, gzip_decompress, read_optional, write_atomic};
use crate::hash::Hash;
use crate::repo::Repo;
use crate::summary::diff;
use crate::summary::format::Summary;

const SUMMARY_SUFFIX: &str = ".gz";
const DELTA_SUFFIX: &str = ".delta";
const INDEX_SIG_SUFFIX: &str = ".idx.sig";

/// what a gc pass removed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GcStats {
    pub summaries_removed: usize,
    pub deltas_removed: usize,
    pub signatures_removed: usize,
    pub bytes_freed: u64,
}

/// summaries keyed by digest, with an in-memory cache for the current pass
pub struct DigestedSummaryStore<'a> {
    repo: &'a Repo,
    cache: HashMap<Hash, Vec<u8>>,
}

impl<'a> DigestedSummaryStore<'a> {
    pub fn new(repo: &'a Repo) -> Self {
        Self {
            repo,
            cache: HashMap::new(),
        }
    }

    pub fn summary_path(&self, digest: &Hash) -> PathBuf {
        self.repo
            .summaries_path()
            .join(format!("{}{}", digest, SUMMARY_SUFFIX))
    }

    pub fn delta_path(&self, from: &Hash, to: &Hash) -> PathBuf {
        self.repo
            .summaries_path()
            .join(format!("{}-{}{}", from, to, DELTA_SUFFIX))
    }

    pub fn index_sig_path(&self, index_digest: &Hash) -> PathBuf {
        self.repo
            .summaries_path()
            .join(format!("{}{}", index_digest, INDEX_SIG_SUFFIX))
    }

    /// store a summary, returning its digest
    pub fn save(&mut self, summary: &Summary) -> Result<Hash> {
        self.save_bytes(summary.to_bytes()?)
    }

    /// store serialized summary bytes, returning their digest
    ///
    /// a non-empty file already at the digest path is kept as is.
    pub fn save_bytes(&mut self, bytes: Vec<u8>) -> Result<Hash> {
        let digest = Hash::digest(&bytes);
        let path = self.summary_path(&digest);

        if file_size(&path)?.is_some_and(|size| size > 0) {
            tracing::debug!("summary {} already stored", digest);
        } else {
            write_atomic(&self.repo.tmp_path(), &path, &gzip_compress(&bytes)?)?;
            tracing::debug!("stored summary {}", digest);
        }

        self.cache.insert(digest, bytes);
        Ok(digest)
    }

    /// serialized bytes of a stored summary, verified against the digest
    pub fn load(&mut self, digest: &Hash) -> Result<&[u8]> {
        if !self.cache.contains_key(digest) {
            let bytes = self.read_verified(digest)?;
            self.cache.insert(*digest, bytes);
        }
        self.cache
            .get(digest)
            .map(Vec::as_slice)
            .ok_or(Error::SummaryNotFound(*digest))
    }

    /// a stored summary, parsed
    pub fn load_summary(&mut self, digest: &Hash) -> Result<Summary> {
        Summary::from_bytes(self.load(digest)?)
    }

    fn read_verified(&self, digest: &Hash) -> Result<Vec<u8>> {
        let path = self.summary_path(digest);
        let compressed = read_optional(&path)?.ok_or(Error::SummaryNotFound(*digest))?;

        let bytes = gzip_decompress(&compressed, &path)
            .map_err(|e| Error::InvalidSummary(format!("{}: {}", path.display(), e)))?;
        if Hash::digest(&bytes) != *digest {
            return Err(Error::InvalidSummary(format!(
                "{}: digest mismatch",
                path.display()
            )));
        }
        Ok(bytes)
    }

    /// digests loaded or saved during this pass
    pub fn cached_digests(&self) -> impl Iterator<Item = &Hash> {
        self.cache.keys()
    }

    /// store the delta from one summary to another; an existing delta is kept
    pub fn save_delta(&mut self, from: &Hash, to: &Hash) -> Result<()> {
        let path = self.delta_path(from, to);
        if path.exists() {
            return Ok(());
        }

        let old = self.load(from)?.to_vec();
        let new = self.load(to)?;
        let delta = diff::diff_summaries(&old, new)?;

        write_atomic(&self.repo.tmp_path(), &path, &gzip_compress(&delta)?)?;
        tracing::debug!("stored delta {}-{}", from, to);
        Ok(())
    }

    /// raw diff stream of a stored delta
    pub fn load_delta(&self, from: &Hash, to: &Hash) -> Result<Vec<u8>> {
        let path = self.delta_path(from, to);
        let compressed = fs::read(&path).with_path(&path)?;
        gzip_decompress(&compressed, &path)
    }

    /// remove files no longer reachable from the published index
    ///
    /// - summaries whose digest is not in `referenced`
    /// - deltas whose target is not in `generated`
    /// - index signatures other than those of the current and previous index
    ///
    /// files that match none of these patterns are left alone.
    pub fn gc(
        &self,
        current_index: &Hash,
        previous_index: Option<&Hash>,
        referenced: &HashSet<Hash>,
        generated: &HashSet<Hash>,
    ) -> Result<GcStats> {
        let dir = self.repo.summaries_path();
        let mut stats = GcStats::default();

        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| Error::Io {
                path: dir.clone(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();

            // checked before .gz/.delta; "<digest>.idx.sig" has its own suffix
            let stale = if let Some(hex) = name.strip_suffix(INDEX_SIG_SUFFIX) {
                match Hash::from_hex(hex) {
                    Ok(digest) => {
                        let keep = digest == *current_index || previous_index == Some(&digest);
                        (!keep).then_some(GcKind::Signature)
                    }
                    Err(_) => {
                        tracing::warn!("unexpected file {} in summaries, keeping", name);
                        None
                    }
                }
            } else if let Some(hex) = name.strip_suffix(SUMMARY_SUFFIX) {
                match Hash::from_hex(hex) {
                    Ok(digest) => (!referenced.contains(&digest)).then_some(GcKind::Summary),
                    Err(_) => {
                        tracing::warn!("unexpected file {} in summaries, keeping", name);
                        None
                    }
                }
            } else if let Some(pair) = name.strip_suffix(DELTA_SUFFIX) {
                match parse_delta_name(pair) {
                    Some((_, to)) => (!generated.contains(&to)).then_some(GcKind::Delta),
                    None => {
                        tracing::warn!("unexpected file {} in summaries, keeping", name);
                        None
                    }
                }
            } else {
                tracing::warn!("unexpected file {} in summaries, keeping", name);
                None
            };

            let Some(kind) = stale else {
                continue;
            };

            let path = entry.path();
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(Error::Io {
                        path: path.to_path_buf(),
                        source: e,
                    })
                }
            }

            tracing::debug!("removed {}", name);
            stats.bytes_freed += size;
            match kind {
                GcKind::Summary => stats.summaries_removed += 1,
                GcKind::Delta => stats.deltas_removed += 1,
                GcKind::Signature => stats.signatures_removed += 1,
            }
        }

        Ok(stats)
    }
}

enum GcKind {
    Summary,
    Delta,
    Signature,
}

fn parse_delta_name(pair: &str) -> Option<(Hash, Hash)> {
    let (from, to) = pair.split_once('-')?;
    Some((Hash::from_hex(from).ok()?, Hash::from_hex(to).ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::file_mtime;
    use crate::summary::SummaryRef;
    use crate::types::MetaDict;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let repo = Repo::init(&dir.path().join("repo")).unwrap();
        (dir, repo)
    }

    fn summary(names: &[&str]) -> Summary {
        let refs = names
            .iter()
            .map(|n| SummaryRef::new(*n, 10, Hash::digest(n.as_bytes()), MetaDict::new()))
            .collect();
        Summary::new(refs, MetaDict::new()).unwrap()
    }

    #[test]
    fn test_save_and_load() {
        let (_dir, repo) = test_repo();
        let s = summary(&["app/a/x86_64/stable"]);

        let digest = DigestedSummaryStore::new(&repo).save(&s).unwrap();
        assert_eq!(digest, Hash::digest(&s.to_bytes().unwrap()));

        // a fresh store has to go to disk
        let mut store = DigestedSummaryStore::new(&repo);
        assert_eq!(store.load_summary(&digest).unwrap(), s);
        assert_eq!(store.cached_digests().count(), 1);
    }

    #[test]
    fn test_save_is_idempotent() {
        let (_dir, repo) = test_repo();
        let mut store = DigestedSummaryStore::new(&repo);
        let s = summary(&["app/a/x86_64/stable"]);

        let digest = store.save(&s).unwrap();
        let path = store.summary_path(&digest);
        crate::fs::set_mtime(&path, 1_000_000).unwrap();
        let size = file_size(&path).unwrap();

        assert_eq!(store.save(&s).unwrap(), digest);
        assert_eq!(file_mtime(&path).unwrap(), Some(1_000_000));
        assert_eq!(file_size(&path).unwrap(), size);
    }

    #[test]
    fn test_load_missing_and_corrupt() {
        let (_dir, repo) = test_repo();
        let mut store = DigestedSummaryStore::new(&repo);

        let missing = Hash::digest(b"missing");
        assert!(matches!(store.load(&missing), Err(Error::SummaryNotFound(_))));

        // not gzip
        let bogus = Hash::digest(b"bogus");
        fs::write(store.summary_path(&bogus), b"not gzip").unwrap();
        assert!(matches!(store.load(&bogus), Err(Error::InvalidSummary(_))));

        // valid gzip, wrong content
        let wrong = Hash::digest(b"wrong");
        fs::write(store.summary_path(&wrong), gzip_compress(b"other").unwrap()).unwrap();
        assert!(matches!(store.load(&wrong), Err(Error::InvalidSummary(_))));
    }

    #[test]
    fn test_save_delta_reconstructs() {
        let (_dir, repo) = test_repo();
        let mut store = DigestedSummaryStore::new(&repo);

        let old = store.save(&summary(&["app/a/x86_64/stable"])).unwrap();
        let new = store
            .save(&summary(&["app/a/x86_64/stable", "app/b/x86_64/stable"]))
            .unwrap();
        store.save_delta(&old, &new).unwrap();
        assert!(store.delta_path(&old, &new).exists());

        let delta = store.load_delta(&old, &new).unwrap();
        let old_bytes = store.load(&old).unwrap().to_vec();
        let rebuilt = diff::apply(&old_bytes, &delta).unwrap();
        assert_eq!(Hash::digest(&rebuilt), new);
    }

    #[test]
    fn test_gc() {
        let (_dir, repo) = test_repo();
        let mut store = DigestedSummaryStore::new(&repo);

        let a = store.save(&summary(&["a"])).unwrap();
        let b = store.save(&summary(&["b"])).unwrap();
        let c = store.save(&summary(&["c"])).unwrap();
        store.save_delta(&a, &b).unwrap();
        store.save_delta(&b, &c).unwrap();

        let index_old = Hash::digest(b"index-old");
        let index_prev = Hash::digest(b"index-prev");
        let index_cur = Hash::digest(b"index-cur");
        for idx in [index_old, index_prev, index_cur] {
            fs::write(store.index_sig_path(&idx), b"sig").unwrap();
        }
        let stray = repo.summaries_path().join("README");
        fs::write(&stray, b"keep me").unwrap();

        let referenced: HashSet<Hash> = [b, c].into_iter().collect();
        let generated: HashSet<Hash> = [c].into_iter().collect();
        let stats = store
            .gc(&index_cur, Some(&index_prev), &referenced, &generated)
            .unwrap();

        assert_eq!(stats.summaries_removed, 1);
        assert_eq!(stats.deltas_removed, 1);
        assert_eq!(stats.signatures_removed, 1);
        assert!(stats.bytes_freed > 0);

        assert!(!store.summary_path(&a).exists());
        assert!(store.summary_path(&b).exists());
        assert!(store.summary_path(&c).exists());
        assert!(!store.delta_path(&a, &b).exists());
        assert!(store.delta_path(&b, &c).exists());
        assert!(!store.index_sig_path(&index_old).exists());
        assert!(store.index_sig_path(&index_prev).exists());
        assert!(store.index_sig_path(&index_cur).exists());
        assert!(stray.exists());

        // nothing left to do
        let stats = store
            .gc(&index_cur, Some(&index_prev), &referenced, &generated)
            .unwrap();
        assert_eq!(stats, GcStats::default());
    }
}
