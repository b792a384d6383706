use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use crate::error::{Error, Result};

/// read a whole file, returning None if it does not exist
pub fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// size of a file, None if it does not exist
pub fn file_size(path: &Path) -> Result<Option<u64>> {
    metadata_optional(path).map(|m| m.map(|m| m.len()))
}

/// modification time in seconds since the epoch, None if the file does not exist
pub fn file_mtime(path: &Path) -> Result<Option<i64>> {
    metadata_optional(path).map(|m| m.map(|m| m.mtime()))
}

fn metadata_optional(path: &Path) -> Result<Option<fs::Metadata>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_optional() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file");

        assert!(read_optional(&path).unwrap().is_none());
        assert!(file_size(&path).unwrap().is_none());
        assert!(file_mtime(&path).unwrap().is_none());

        fs::write(&path, b"hello").unwrap();
        assert_eq!(read_optional(&path).unwrap().unwrap(), b"hello");
        assert_eq!(file_size(&path).unwrap(), Some(5));
        assert!(file_mtime(&path).unwrap().is_some());
    }
}
