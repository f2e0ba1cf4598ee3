//! Checksum computation for verifying copied files.
//!
//! Moves across filesystems fall back to copy-then-delete; the source is only
//! removed once both files hash to the same BLAKE3 digest.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Compute the BLAKE3 digest of a file.
pub fn compute_file_checksum(path: &Path) -> io::Result<blake3::Hash> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 65536]; // 64 KB buffer

    loop {
        match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                hasher.update(&buffer[..n]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(hasher.finalize())
}

/// True if both files have identical contents.
pub fn files_match(source: &Path, destination: &Path) -> io::Result<bool> {
    Ok(compute_file_checksum(source)? == compute_file_checksum(destination)?)
}
