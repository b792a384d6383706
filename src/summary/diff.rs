//! binary diff between two summaries
//!
//! stream layout (integers little-endian):
//!
//! ```text
//! magic    4 bytes  "SDIF"
//! count    u32      number of instructions
//! ops      count x u32, top nibble = kind, low 28 bits = length
//! data     literal bytes consumed by DATA instructions, in order
//! ```
//!
//! REUSE copies bytes from the old buffer at the old cursor, SKIP advances the old
//! cursor, DATA copies bytes from the literal section. the new buffer is the
//! concatenation of everything REUSE and DATA produce.

use std::ops::Range;

use crate::error::{Error, Result};
use crate::summary::format;

pub const DIFF_MAGIC: [u8; 4] = *b"SDIF";

const HEADER_LEN: usize = 8;
const OP_KIND_SHIFT: u32 = 28;
const MAX_OP_LEN: usize = (1 << OP_KIND_SHIFT) - 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OpKind {
    Reuse = 0,
    Skip = 1,
    Data = 2,
}

impl OpKind {
    fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(OpKind::Reuse),
            1 => Some(OpKind::Skip),
            2 => Some(OpKind::Data),
            _ => None,
        }
    }
}

/// diff two arbitrary buffers as a single block
pub fn diff(old: &[u8], new: &[u8]) -> Result<Vec<u8>> {
    let mut builder = DiffBuilder::new(old, new);
    builder.block(0..old.len(), 0..new.len());
    builder.finish()
}

/// diff two serialized summaries, aligning their records by ref name
///
/// refs present in both are diffed against each other, refs only in the old
/// summary are skipped and refs only in the new one become literal data.
/// falls back to a whole-buffer diff if either side is not a valid summary.
pub fn diff_summaries(old: &[u8], new: &[u8]) -> Result<Vec<u8>> {
    let (old_layout, new_layout) = match (format::parse(old), format::parse(new)) {
        (Ok((_, o)), Ok((_, n))) => (o, n),
        _ => return diff(old, new),
    };

    let mut builder = DiffBuilder::new(old, new);
    builder.block(old_layout.header, new_layout.header);

    let mut old_records = old_layout.records.iter().peekable();
    for (name, new_range) in &new_layout.records {
        while old_records.next_if(|(old_name, _)| old_name < name).is_some() {}

        match old_records.next_if(|(old_name, _)| old_name == name) {
            Some((_, old_range)) => builder.block(old_range.clone(), new_range.clone()),
            None => builder.data(new_range.clone()),
        }
    }

    builder.block(old_layout.metadata, new_layout.metadata);
    builder.finish()
}

/// reconstruct the new buffer from the old one and a diff stream
pub fn apply(old: &[u8], diff: &[u8]) -> Result<Vec<u8>> {
    if diff.len() < HEADER_LEN || diff[..4] != DIFF_MAGIC {
        return Err(Error::InvalidDiff("bad header".to_string()));
    }

    let count = u32::from_le_bytes([diff[4], diff[5], diff[6], diff[7]]) as usize;
    let ops_end = count
        .checked_mul(4)
        .and_then(|n| n.checked_add(HEADER_LEN))
        .filter(|&end| end <= diff.len())
        .ok_or_else(|| Error::InvalidDiff(format!("instruction count {} too large", count)))?;

    let ops = &diff[HEADER_LEN..ops_end];
    let data = &diff[ops_end..];

    let mut out = Vec::new();
    let mut old_cur = 0usize;
    let mut data_cur = 0usize;

    for op in ops.chunks_exact(4) {
        let op = u32::from_le_bytes([op[0], op[1], op[2], op[3]]);
        let len = (op as usize) & MAX_OP_LEN;
        let kind = OpKind::from_bits(op >> OP_KIND_SHIFT)
            .ok_or_else(|| Error::InvalidDiff(format!("unknown instruction {:#x}", op)))?;

        match kind {
            OpKind::Reuse => {
                let range = checked_range(old_cur, len, old.len(), "reuse")?;
                out.extend_from_slice(&old[range]);
                old_cur += len;
            }
            OpKind::Skip => {
                checked_range(old_cur, len, old.len(), "skip")?;
                old_cur += len;
            }
            OpKind::Data => {
                let range = checked_range(data_cur, len, data.len(), "data")?;
                out.extend_from_slice(&data[range]);
                data_cur += len;
            }
        }
    }

    if data_cur != data.len() {
        return Err(Error::InvalidDiff(format!(
            "{} unused literal bytes",
            data.len() - data_cur
        )));
    }

    Ok(out)
}

fn checked_range(start: usize, len: usize, limit: usize, what: &str) -> Result<Range<usize>> {
    start
        .checked_add(len)
        .filter(|&end| end <= limit)
        .map(|end| start..end)
        .ok_or_else(|| {
            Error::InvalidDiff(format!(
                "{} of {} bytes at {} exceeds {} available",
                what, len, start, limit
            ))
        })
}

/// accumulates instructions while walking old and new buffers front to back
struct DiffBuilder<'a> {
    old: &'a [u8],
    new: &'a [u8],
    old_cur: usize,
    ops: Vec<(OpKind, usize)>,
    data: Vec<u8>,
}

impl<'a> DiffBuilder<'a> {
    fn new(old: &'a [u8], new: &'a [u8]) -> Self {
        Self {
            old,
            new,
            old_cur: 0,
            ops: Vec::new(),
            data: Vec::new(),
        }
    }

    fn push(&mut self, kind: OpKind, len: usize) {
        if len == 0 {
            return;
        }
        match self.ops.last_mut() {
            Some((last, n)) if *last == kind => *n += len,
            _ => self.ops.push((kind, len)),
        }
    }

    fn reuse(&mut self, len: usize) {
        self.push(OpKind::Reuse, len);
        self.old_cur += len;
    }

    fn skip(&mut self, len: usize) {
        self.push(OpKind::Skip, len);
        self.old_cur += len;
    }

    /// emit new bytes literally
    fn data(&mut self, range: Range<usize>) {
        self.push(OpKind::Data, range.len());
        self.data.extend_from_slice(&self.new[range]);
    }

    /// produce `new[new_range]` reusing what it shares with `old[old_range]`
    ///
    /// old ranges must be visited in increasing order; one that lies behind the
    /// old cursor is treated as no match.
    fn block(&mut self, old_range: Range<usize>, new_range: Range<usize>) {
        if old_range.start < self.old_cur {
            self.data(new_range);
            return;
        }
        self.skip(old_range.start - self.old_cur);

        let old = &self.old[old_range];
        let new = &self.new[new_range.clone()];

        let prefix = common_prefix(old, new);
        let suffix = common_suffix(&old[prefix..], &new[prefix..]);
        let old_middle = old.len() - prefix - suffix;

        self.reuse(prefix);
        self.skip(old_middle);
        self.data(new_range.start + prefix..new_range.end - suffix);
        self.reuse(suffix);
    }

    fn finish(self) -> Result<Vec<u8>> {
        let mut encoded_ops = Vec::new();
        for (kind, mut len) in self.ops {
            while len > 0 {
                let chunk = len.min(MAX_OP_LEN);
                encoded_ops.push(((kind as u32) << OP_KIND_SHIFT) | chunk as u32);
                len -= chunk;
            }
        }

        let count = u32::try_from(encoded_ops.len())
            .map_err(|_| Error::InvalidDiff("too many instructions".to_string()))?;

        let mut out = Vec::with_capacity(HEADER_LEN + encoded_ops.len() * 4 + self.data.len());
        out.extend_from_slice(&DIFF_MAGIC);
        out.extend_from_slice(&count.to_le_bytes());
        for op in encoded_ops {
            out.extend_from_slice(&op.to_le_bytes());
        }
        out.extend_from_slice(&self.data);
        Ok(out)
    }
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn common_suffix(a: &[u8], b: &[u8]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}
