//! filesystem helpers shared by the object store and the summary writers

pub mod compress;
pub mod read;
pub mod write;

pub use compress::{gzip_compress, gzip_decompress};
pub use read::{file_mtime, file_size, read_optional};
pub use write::{fsync_dir, set_mtime, write_atomic};
