use std::io::{Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{IoResultExt, Result};

/// gzip-compress a buffer
///
/// the gzip header carries no mtime, so equal input gives equal output.
pub fn gzip_compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).with_path("<gzip>")?;
    encoder.finish().with_path("<gzip>")
}

/// decompress a gzip buffer; `origin` is only used for error context
pub fn gzip_decompress(data: &[u8], origin: &Path) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).with_path(origin)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_gzip_roundtrip() {
        let data = b"summary summary summary summary".repeat(10);
        let compressed = gzip_compress(&data).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(gzip_decompress(&compressed, Path::new("x")).unwrap(), data);
    }

    #[test]
    fn test_gzip_deterministic() {
        assert_eq!(gzip_compress(b"abc").unwrap(), gzip_compress(b"abc").unwrap());
    }

    #[test]
    fn test_gzip_corrupt() {
        let result = gzip_decompress(b"definitely not gzip", Path::new("bad.gz"));
        assert!(matches!(result, Err(Error::Io { .. })));
    }
}
