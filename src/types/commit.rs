use serde::{Deserialize, Serialize};

use crate::hash::Hash;
use crate::types::{MetaDict, MetaValue};

/// a commit object pointing to a root tree with typed metadata
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// root tree hash
    pub tree: Hash,
    /// parent commit hashes (empty for initial)
    pub parents: Vec<Hash>,
    pub subject: String,
    /// unix timestamp (seconds since epoch)
    pub timestamp: u64,
    /// commit metadata, e.g. `xa.metadata` or `xa.installed-size`
    #[serde(default, skip_serializing_if = "MetaDict::is_empty")]
    pub metadata: MetaDict,
}

impl Commit {
    /// create a new commit stamped with the current time
    pub fn new(tree: Hash, parents: Vec<Hash>, subject: impl Into<String>) -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self::with_timestamp(tree, parents, timestamp, subject)
    }

    /// create a new commit with explicit timestamp
    pub fn with_timestamp(
        tree: Hash,
        parents: Vec<Hash>,
        timestamp: u64,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            tree,
            parents,
            subject: subject.into(),
            timestamp,
            metadata: MetaDict::new(),
        }
    }

    /// add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// look up a metadata entry
    pub fn meta(&self, key: &str) -> Option<&MetaValue> {
        self.metadata.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_with_metadata() {
        let c = Commit::with_timestamp(Hash::ZERO, vec![], 10, "subject")
            .with_metadata("xa.installed-size", 100u64)
            .with_metadata("xa.metadata", "[Application]\n");
        assert_eq!(c.meta("xa.installed-size").and_then(|v| v.as_u64()), Some(100));
        assert_eq!(c.meta("xa.metadata").and_then(|v| v.as_str()), Some("[Application]\n"));
        assert!(c.meta("missing").is_none());
    }

    #[test]
    fn test_commit_cbor_roundtrip() {
        let c = Commit::with_timestamp(Hash::ZERO, vec![], 1234567890, "message")
            .with_metadata("xa.subsets", MetaValue::StrList(vec!["locale".into()]));

        let mut bytes = Vec::new();
        ciborium::into_writer(&c, &mut bytes).unwrap();

        let parsed: Commit = ciborium::from_reader(&bytes[..]).unwrap();
        assert_eq!(c, parsed);
    }

    #[test]
    fn test_commit_new_has_timestamp() {
        let c = Commit::new(Hash::ZERO, vec![], "now");
        assert!(c.timestamp > 0);
    }
}
