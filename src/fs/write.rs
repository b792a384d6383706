use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use nix::sys::time::{TimeVal, TimeValLike};

use crate::error::{Error, IoResultExt, Result};

/// atomically replace `dest` with `content`
///
/// temp file in `tmp_dir` -> fsync -> rename -> fsync parent.
/// `tmp_dir` must live on the same filesystem as `dest`.
pub fn write_atomic(tmp_dir: &Path, dest: &Path, content: &[u8]) -> Result<()> {
    let tmp_path = tmp_dir.join(uuid::Uuid::new_v4().to_string());
    {
        let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
        tmp_file.write_all(content).with_path(&tmp_path)?;
        tmp_file.sync_all().with_path(&tmp_path)?;
    }

    if let Err(e) = fs::rename(&tmp_path, dest) {
        let _ = fs::remove_file(&tmp_path);
        return Err(Error::Io {
            path: dest.to_path_buf(),
            source: e,
        });
    }

    if let Some(parent) = dest.parent() {
        fsync_dir(parent)?;
    }

    Ok(())
}

/// sync a directory to disk
pub fn fsync_dir(path: &Path) -> Result<()> {
    let dir = File::open(path).with_path(path)?;
    dir.sync_all().with_path(path)?;
    Ok(())
}

/// set access and modification time of a file, in whole seconds since the epoch
pub fn set_mtime(path: &Path, secs: i64) -> Result<()> {
    let tv = TimeVal::seconds(secs);
    nix::sys::stat::utimes(path, &tv, &tv).map_err(|e| Error::Io {
        path: path.to_path_buf(),
        source: std::io::Error::from(e),
    })
}
