//! binary summary encoding
//!
//! layout (integers little-endian):
//!
//! ```text
//! magic        4 bytes  "SUM1"
//! count        u32      number of ref records
//! records      count x (u32 length, CBOR (ref, commit_size, checksum, metadata))
//! metadata     u32 length, CBOR summary metadata dict
//! ```
//!
//! records are sorted by ref name so clients can binary search them. each record is
//! framed separately, which lets the diff codec align old and new summaries per ref.

use std::ops::Range;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::types::MetaDict;

pub const SUMMARY_MAGIC: [u8; 4] = *b"SUM1";

const HEADER_LEN: usize = 8;

/// one ref in a summary
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SummaryRef {
    pub name: String,
    /// size of the serialized commit object
    pub commit_size: u64,
    pub checksum: Hash,
    pub metadata: MetaDict,
}

impl SummaryRef {
    pub fn new(name: impl Into<String>, commit_size: u64, checksum: Hash, metadata: MetaDict) -> Self {
        Self {
            name: name.into(),
            commit_size,
            checksum,
            metadata,
        }
    }
}

/// a published snapshot of refs plus summary-wide metadata
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Summary {
    refs: Vec<SummaryRef>,
    metadata: MetaDict,
}

impl Summary {
    /// build a summary, sorting records by ref name
    pub fn new(mut refs: Vec<SummaryRef>, metadata: MetaDict) -> Result<Self> {
        refs.sort_by(|a, b| a.name.cmp(&b.name));
        for window in refs.windows(2) {
            if window[0].name == window[1].name {
                return Err(Error::InvalidSummary(format!(
                    "duplicate ref {}",
                    window[0].name
                )));
            }
        }
        Ok(Self { refs, metadata })
    }

    pub fn refs(&self) -> &[SummaryRef] {
        &self.refs
    }

    pub fn metadata(&self) -> &MetaDict {
        &self.metadata
    }

    /// binary search for a ref
    pub fn lookup(&self, name: &str) -> Option<&SummaryRef> {
        self.refs
            .binary_search_by(|r| r.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.refs[i])
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// serialize to the binary summary layout
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(&SUMMARY_MAGIC);
        out.extend_from_slice(&frame_len(self.refs.len())?.to_le_bytes());

        for r in &self.refs {
            let mut cbor = Vec::new();
            ciborium::into_writer(&(&r.name, r.commit_size, &r.checksum, &r.metadata), &mut cbor)?;
            push_framed(&mut out, &cbor)?;
        }

        let mut cbor = Vec::new();
        ciborium::into_writer(&self.metadata, &mut cbor)?;
        push_framed(&mut out, &cbor)?;

        Ok(out)
    }

    /// parse and validate a serialized summary
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        parse(bytes).map(|(summary, _)| summary)
    }
}

/// byte ranges of the parts of a serialized summary
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SummaryLayout {
    pub header: Range<usize>,
    /// ref name and the framed record range, in ref order
    pub records: Vec<(String, Range<usize>)>,
    pub metadata: Range<usize>,
}

/// parse a summary, returning the byte range of every part
pub fn parse(bytes: &[u8]) -> Result<(Summary, SummaryLayout)> {
    let mut cursor = Cursor::new(bytes);

    let magic = cursor.take(4)?;
    if magic != SUMMARY_MAGIC {
        return Err(Error::InvalidSummary("bad magic".to_string()));
    }
    let count = cursor.read_u32()? as usize;
    let header = 0..HEADER_LEN;

    // each record needs at least its length prefix
    if count > cursor.remaining() / 4 {
        return Err(Error::InvalidSummary(format!(
            "record count {} exceeds summary size",
            count
        )));
    }

    let mut refs: Vec<SummaryRef> = Vec::with_capacity(count);
    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        let start = cursor.pos;
        let payload = cursor.take_framed()?;
        let (name, commit_size, checksum, metadata): (String, u64, Hash, MetaDict) =
            ciborium::from_reader(payload)
                .map_err(|e| Error::InvalidSummary(format!("bad ref record: {}", e)))?;

        if let Some(prev) = refs.last() {
            if prev.name >= name {
                return Err(Error::InvalidSummary(format!(
                    "refs not sorted at {}",
                    name
                )));
            }
        }

        records.push((name.clone(), start..cursor.pos));
        refs.push(SummaryRef {
            name,
            commit_size,
            checksum,
            metadata,
        });
    }

    let meta_start = cursor.pos;
    let payload = cursor.take_framed()?;
    let metadata: MetaDict = ciborium::from_reader(payload)
        .map_err(|e| Error::InvalidSummary(format!("bad summary metadata: {}", e)))?;

    if cursor.remaining() != 0 {
        return Err(Error::InvalidSummary(format!(
            "{} trailing bytes",
            cursor.remaining()
        )));
    }

    let layout = SummaryLayout {
        header,
        records,
        metadata: meta_start..cursor.pos,
    };
    Ok((Summary { refs, metadata }, layout))
}

fn frame_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::InvalidSummary(format!("length {} too large", len)))
}

fn push_framed(out: &mut Vec<u8>, payload: &[u8]) -> Result<()> {
    out.extend_from_slice(&frame_len(payload.len())?.to_le_bytes());
    out.extend_from_slice(payload);
    Ok(())
}

/// bounds-checked reader over a byte slice
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| Error::InvalidSummary("truncated".to_string()))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn take_framed(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.take(len)
    }
}
