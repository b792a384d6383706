use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hash::Hash;

/// a directory listing, entries kept sorted by name bytes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// validate names, sort, and reject duplicates
    pub fn new(mut entries: Vec<TreeEntry>) -> Result<Self> {
        for entry in &entries {
            validate_entry_name(&entry.name)?;
        }

        entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));

        if let Some(pair) = entries.windows(2).find(|pair| pair[0].name == pair[1].name) {
            return Err(Error::DuplicateEntryName(pair[0].name.clone()));
        }

        Ok(Self { entries })
    }

    pub fn empty() -> Self {
        Self { entries: vec![] }
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    /// binary search by name
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries
            .binary_search_by(|e| e.name.as_bytes().cmp(name.as_bytes()))
            .ok()
            .map(|i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate_entry_name(name: &str) -> Result<()> {
    let reason = match name {
        "" => "empty name",
        "." | ".." => "reserved name",
        _ if name.contains(['/', '\0']) => "separator or null byte in name",
        _ => return Ok(()),
    };
    Err(Error::InvalidEntryName(format!("{}: {:?}", reason, name)))
}

/// a single entry in a tree
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl TreeEntry {
    pub fn file(name: impl Into<String>, hash: Hash, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File { hash, size },
        }
    }

    pub fn directory(name: impl Into<String>, hash: Hash) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory { hash },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryKind {
    /// regular file, content in a blob
    File { hash: Hash, size: u64 },
    /// subdirectory, content in another tree
    Directory { hash: Hash },
}
