//! the summary index: one entry per partition with its digest and delta history

use std::collections::BTreeMap;
use std::iter;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fs::read_optional;
use crate::hash::Hash;
use crate::repo::Repo;
use crate::summary::keys;
use crate::summary::store::DigestedSummaryStore;
use crate::types::{MetaDict, MetaValue};

/// a partition's current summary and the older summaries it has deltas from
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsummaryEntry {
    pub digest: Hash,
    /// most recent first; a delta `<entry>-<digest>` exists for each
    #[serde(default)]
    pub history: Vec<Hash>,
    #[serde(default, skip_serializing_if = "MetaDict::is_empty")]
    pub metadata: MetaDict,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryIndex {
    pub subsummaries: BTreeMap<String, SubsummaryEntry>,
    #[serde(default)]
    pub metadata: MetaDict,
}

impl SummaryIndex {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut cbor = Vec::new();
        ciborium::into_writer(self, &mut cbor)?;
        Ok(cbor)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| Error::InvalidIndex(e.to_string()))
    }

    /// read the published index and its digest, if there is one
    ///
    /// an index that does not decode is treated as absent.
    pub fn load(repo: &Repo) -> Result<Option<(Self, Hash)>> {
        let path = repo.index_path();
        let Some(bytes) = read_optional(&path)? else {
            return Ok(None);
        };

        match Self::from_bytes(&bytes) {
            Ok(index) => Ok(Some((index, Hash::digest(&bytes)))),
            Err(e) => {
                tracing::warn!("ignoring unreadable index {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    pub fn subsummaries(&self) -> &BTreeMap<String, SubsummaryEntry> {
        &self.subsummaries
    }

    pub fn get(&self, partition: &str) -> Option<&SubsummaryEntry> {
        self.subsummaries.get(partition)
    }

    /// format version of the data in the partition summaries
    pub fn cache_version(&self) -> Option<u32> {
        self.metadata
            .get(keys::CACHE_VERSION)
            .and_then(|v| v.as_u32())
    }

    /// every summary digest the index points at, history included
    pub fn digests(&self) -> impl Iterator<Item = &Hash> {
        self.subsummaries
            .values()
            .flat_map(|entry| iter::once(&entry.digest).chain(&entry.history))
    }
}

/// partition name: `ARCH` for the default subset, `SUBSET-ARCH` otherwise
pub fn partition_name(subset: &str, arch: &str) -> String {
    if subset.is_empty() {
        arch.to_string()
    } else {
        format!("{}-{}", subset, arch)
    }
}

/// split a partition name into subset and arch
pub fn parse_partition_name(name: &str) -> (Option<&str>, &str) {
    match name.rsplit_once('-') {
        Some((subset, arch)) if !subset.is_empty() => (Some(subset), arch),
        _ => (None, name),
    }
}

/// build the new index from freshly generated partition digests
///
/// history for each partition is the previous digest followed by the previous
/// history, each with a delta to the new summary, capped at `max_history`.
/// summaries that can no longer be loaded are left out of the history.
pub fn build_index(
    old: Option<&SummaryIndex>,
    digests: &BTreeMap<String, Hash>,
    store: &mut DigestedSummaryStore,
    max_history: usize,
    metadata: MetaDict,
) -> Result<SummaryIndex> {
    let mut subsummaries = BTreeMap::new();

    for (name, digest) in digests {
        let mut history: Vec<Hash> = Vec::new();

        if let Some(old_entry) = old.and_then(|index| index.get(name)) {
            let candidates = iter::once(&old_entry.digest).chain(&old_entry.history);
            for candidate in candidates {
                if history.len() >= max_history {
                    break;
                }
                if candidate == digest || history.contains(candidate) {
                    continue;
                }

                match store.save_delta(candidate, digest) {
                    Ok(()) => history.push(*candidate),
                    Err(e @ (Error::SummaryNotFound(_) | Error::InvalidSummary(_))) => {
                        tracing::warn!("dropping {} from history of {}: {}", candidate, name, e);
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        tracing::debug!("partition {} at {} with {} deltas", name, digest, history.len());
        subsummaries.insert(
            name.clone(),
            SubsummaryEntry {
                digest: *digest,
                history,
                metadata: MetaDict::new(),
            },
        );
    }

    let mut metadata = metadata;
    metadata.insert(
        keys::CACHE_VERSION.to_string(),
        MetaValue::U32(crate::summary::CACHE_VERSION),
    );

    Ok(SummaryIndex {
        subsummaries,
        metadata,
    })
}
