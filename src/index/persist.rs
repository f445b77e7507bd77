//! Atomic file persistence
//!
//! Every index artifact is written to a sibling `.tmp` file, fsynced and then
//! renamed over the target, so a concurrent reader sees either the old file or
//! the new one, never a torn write.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Write `data` to `path` atomically
pub fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = temp_path(path);
    let mut file = fs::File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)
}

/// Temporary path used for atomic writes
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Compress with zstd
pub fn compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    zstd::encode_all(data, 3)
}

/// Decompress zstd data
pub fn decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    zstd::decode_all(data)
}
