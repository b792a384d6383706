//! per-commit data cached for the duration of one update pass

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::{load_commit, read_commit_file};
use crate::repo::Repo;
use crate::summary::format::SummaryRef;
use crate::summary::index::{parse_partition_name, SummaryIndex};
use crate::summary::keys;
use crate::summary::store::DigestedSummaryStore;
use crate::types::refname::appstream_subset;
use crate::types::{MetaDict, MetaValue};

/// format version of the data embedded in summaries; older indexes are not reused
pub const CACHE_VERSION: u32 = 2;

/// file in the commit root read when `xa.metadata` is absent
const METADATA_FILE: &str = "metadata";

/// what summaries need to know about a commit
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitData {
    pub installed_size: u64,
    pub download_size: u64,
    /// contents of the flatpak metadata file
    pub metadata_contents: String,
    /// sorted, deduplicated subset names
    pub subsets: Option<Vec<String>>,
    /// small annotations such as end-of-life, keyed by the short sparse keys
    pub sparse_data: Option<MetaDict>,
    pub commit_size: u64,
    pub commit_timestamp: u64,
}

impl CommitData {
    /// read a commit from the store and extract its data
    pub fn load(repo: &Repo, checksum: &Hash) -> Result<Self> {
        let loaded = load_commit(repo, checksum)?;
        let commit = &loaded.commit;

        let metadata_contents = match commit.meta(keys::COMMIT_METADATA).and_then(|v| v.as_str()) {
            Some(contents) => contents.to_string(),
            None => match read_commit_file(repo, checksum, METADATA_FILE) {
                Ok(bytes) => String::from_utf8(bytes).map_err(|_| {
                    Error::InvalidSummary(format!("metadata of commit {} is not utf-8", checksum))
                })?,
                Err(Error::FileNotInCommit { .. }) => String::new(),
                Err(e) => return Err(e),
            },
        };

        let subsets = commit
            .meta(keys::COMMIT_SUBSETS)
            .and_then(|v| v.as_str_list())
            .map(|list| normalize_subsets(list.to_vec()));

        let size = |key: &str| commit.meta(key).and_then(|v| v.as_u64()).unwrap_or(0);

        Ok(Self {
            installed_size: size(keys::COMMIT_INSTALLED_SIZE),
            download_size: size(keys::COMMIT_DOWNLOAD_SIZE),
            metadata_contents,
            subsets,
            sparse_data: sparse_data(&commit.metadata),
            commit_size: loaded.size,
            commit_timestamp: commit.timestamp,
        })
    }

    /// the `xa.data` tuple: (installed size, download size, metadata)
    pub fn xa_data(&self) -> MetaValue {
        MetaValue::List(vec![
            MetaValue::U64(self.installed_size),
            MetaValue::U64(self.download_size),
            MetaValue::str(self.metadata_contents.as_str()),
        ])
    }

    /// does this commit belong to the named subset
    pub fn in_subset(&self, subset: &str) -> bool {
        self.subsets
            .as_ref()
            .is_some_and(|subsets| subsets.iter().any(|s| s == subset))
    }

    /// recover commit data from a record of a partitioned summary
    fn from_record(record: &SummaryRef) -> Option<Self> {
        let xa_data = record.metadata.get(keys::XA_DATA)?.as_list()?;
        let [installed, download, metadata] = xa_data else {
            return None;
        };

        let mut sparse = MetaDict::new();
        for key in keys::SPARSE_KEYS {
            if let Some(value) = record.metadata.get(key) {
                sparse.insert(key.to_string(), value.clone());
            }
        }

        Some(Self {
            installed_size: installed.as_u64()?,
            download_size: download.as_u64()?,
            metadata_contents: metadata.as_str()?.to_string(),
            subsets: None,
            sparse_data: (!sparse.is_empty()).then_some(sparse),
            commit_size: record.commit_size,
            commit_timestamp: record.metadata.get(keys::TIMESTAMP)?.as_u64()?,
        })
    }

    fn add_subset(&mut self, subset: &str) {
        let subsets = self.subsets.get_or_insert_with(Vec::new);
        if let Err(pos) = subsets.binary_search_by(|s| s.as_str().cmp(subset)) {
            subsets.insert(pos, subset.to_string());
        }
    }
}

fn normalize_subsets(mut subsets: Vec<String>) -> Vec<String> {
    subsets.sort();
    subsets.dedup();
    subsets
}

/// collect the sparse annotations of a commit
fn sparse_data(metadata: &MetaDict) -> Option<MetaDict> {
    let mut sparse = MetaDict::new();

    if let Some(eol) = metadata.get(keys::COMMIT_ENDOFLIFE).and_then(|v| v.as_str()) {
        sparse.insert(keys::SPARSE_ENDOFLIFE.to_string(), MetaValue::str(eol));
    }
    if let Some(rebase) = metadata
        .get(keys::COMMIT_ENDOFLIFE_REBASE)
        .and_then(|v| v.as_str())
    {
        sparse.insert(keys::SPARSE_ENDOFLIFE_REBASE.to_string(), MetaValue::str(rebase));
    }
    if let Some(token_type) = metadata.get(keys::COMMIT_TOKEN_TYPE).and_then(|v| v.as_i32()) {
        sparse.insert(keys::SPARSE_TOKEN_TYPE.to_string(), MetaValue::I32(token_type));
    }

    // sources are [name, download size, installed size, checksum, uri]
    if let Some(sources) = metadata
        .get(keys::COMMIT_EXTRA_DATA_SOURCES)
        .and_then(|v| v.as_list())
    {
        if !sources.is_empty() {
            let total: u64 = sources
                .iter()
                .filter_map(|source| source.as_list()?.get(1)?.as_u64())
                .sum();
            sparse.insert(
                keys::SPARSE_EXTRA_DATA_SIZE.to_string(),
                MetaValue::List(vec![
                    MetaValue::U32(sources.len() as u32),
                    MetaValue::U64(total),
                ]),
            );
        }
    }

    (!sparse.is_empty()).then_some(sparse)
}

/// commit data keyed by checksum; several refs may share one commit
#[derive(Debug, Default)]
pub struct CommitDataCache {
    entries: HashMap<Hash, CommitData>,
}

impl CommitDataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, checksum: &Hash) -> Option<&CommitData> {
        self.entries.get(checksum)
    }

    pub fn insert(&mut self, checksum: Hash, data: CommitData) {
        self.entries.insert(checksum, data);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// cached data for a commit, reading the commit on a miss
    pub fn ensure(&mut self, repo: &Repo, checksum: &Hash) -> Result<&CommitData> {
        match self.entries.entry(*checksum) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let data = CommitData::load(repo, checksum)?;
                Ok(entry.insert(data))
            }
        }
    }

    /// rebuild the cache from the partition summaries of a previous index
    ///
    /// returns an empty cache if the index predates the current cache version or
    /// any of its summaries is unusable; everything is then read from commits.
    pub fn populate_from_index(index: &SummaryIndex, store: &mut DigestedSummaryStore) -> Self {
        let mut cache = Self::new();

        match index.cache_version() {
            Some(version) if version >= CACHE_VERSION => {}
            version => {
                tracing::info!(
                    "previous index has cache version {:?}, recomputing commit data",
                    version
                );
                return cache;
            }
        }

        for (name, entry) in index.subsummaries() {
            let summary = match store.load_summary(&entry.digest) {
                Ok(summary) => summary,
                Err(e) => {
                    tracing::warn!("cannot reuse summary {} for {}: {}", entry.digest, name, e);
                    return Self::new();
                }
            };
            let subset = parse_partition_name(name).0;

            for record in summary.refs() {
                if !cache.entries.contains_key(&record.checksum) {
                    match CommitData::from_record(record) {
                        Some(data) => cache.insert(record.checksum, data),
                        None => continue,
                    }
                }

                // subset appstream refs live only in their own partition
                if let Some(subset) = subset {
                    if appstream_subset(&record.name).is_none() {
                        if let Some(data) = cache.entries.get_mut(&record.checksum) {
                            data.add_subset(subset);
                        }
                    }
                }
            }
        }

        tracing::debug!("reused commit data for {} commits", cache.len());
        cache
    }
}
