//! Filesystem operations module.
//!
//! This module provides the low-level pieces of a relocation:
//! - Creating destination directories recursively
//! - Claiming a collision-free destination name
//! - Moving a file, with a verified copy fallback across filesystems

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::checksums;
use crate::error::SortError;

/// Moves one file to (a free variant of) a desired destination.
///
/// Implementations are shared by all workers of a run.
pub trait Relocator: Send + Sync {
    /// Move `source` to `destination`, or to `name-1.ext`, `name-2.ext`, …
    /// when that path is taken. Returns the path actually used.
    fn relocate(&self, source: &Path, destination: &Path) -> Result<PathBuf, SortError>;
}

/// Moves files on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsRelocator;

impl Relocator for FsRelocator {
    fn relocate(&self, source: &Path, destination: &Path) -> Result<PathBuf, SortError> {
        let move_failed = |e: io::Error| SortError::MoveFailed {
            path: source.to_path_buf(),
            source: e,
        };

        ensure_parent_dir_exists(destination).map_err(move_failed)?;
        let claimed = claim_destination(destination).map_err(move_failed)?;

        match move_file(source, &claimed) {
            Ok(()) => Ok(claimed),
            Err(e) => {
                // Release the placeholder so the name can be reused
                let _ = fs::remove_file(&claimed);
                Err(move_failed(e))
            }
        }
    }
}

/// Atomically reserve the first free name among `name.ext`, `name-1.ext`, …
///
/// The reservation is an empty file created with `create_new`, so two workers
/// can never claim the same path. The caller replaces it with the real file.
pub fn claim_destination(desired: &Path) -> io::Result<PathBuf> {
    let mut attempt: u32 = 0;
    loop {
        let candidate = if attempt == 0 {
            desired.to_path_buf()
        } else {
            suffixed_path(desired, attempt)
        };

        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                attempt = attempt.checked_add(1).ok_or(e)?;
            }
            Err(e) => return Err(e),
        }
    }
}

/// `dir/name.ext` -> `dir/name-<n>.ext`
fn suffixed_path(path: &Path, n: u32) -> PathBuf {
    let mut name = OsString::from(path.file_stem().unwrap_or_default());
    name.push(format!("-{n}"));
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    path.with_file_name(name)
}

/// Move `source` onto `destination`, replacing it.
fn move_file(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => {
            tracing::debug!(src = %source.display(), dest = %destination.display(), "renamed file");
            Ok(())
        }
        Err(e) if is_cross_device(&e) => {
            tracing::debug!(
                src = %source.display(),
                dest = %destination.display(),
                "rename crosses filesystems, copying instead"
            );
            copy_and_remove(source, destination)
        }
        Err(e) => Err(e),
    }
}

/// Copy, verify, then delete the source.
fn copy_and_remove(source: &Path, destination: &Path) -> io::Result<()> {
    copy_file_with_metadata(source, destination)?;

    if !checksums::files_match(source, destination)? {
        let _ = fs::remove_file(destination);
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "copied file does not match its source",
        ));
    }

    if let Err(e) = fs::remove_file(source) {
        // Leave exactly one copy behind
        let _ = fs::remove_file(destination);
        return Err(e);
    }
    Ok(())
}

fn is_cross_device(err: &io::Error) -> bool {
    #[cfg(unix)]
    const CROSS_DEVICE: Option<i32> = Some(18); // EXDEV
    #[cfg(windows)]
    const CROSS_DEVICE: Option<i32> = Some(17); // ERROR_NOT_SAME_DEVICE
    #[cfg(not(any(unix, windows)))]
    const CROSS_DEVICE: Option<i32> = None;

    CROSS_DEVICE.is_some() && err.raw_os_error() == CROSS_DEVICE
}

/// Copy a file from source to destination, preserving its modification time.
///
/// # Returns
/// Number of bytes copied
pub fn copy_file_with_metadata(src: &Path, dst: &Path) -> io::Result<u64> {
    let src_mtime = fs::metadata(src)?.modified().ok();
    let bytes_copied = fs::copy(src, dst)?;

    if let Some(mtime) = src_mtime {
        let _ = filetime::set_file_mtime(dst, filetime::FileTime::from_system_time(mtime));
    }

    Ok(bytes_copied)
}

/// Ensure the parent directory of a path exists, creating it if necessary.
pub fn ensure_parent_dir_exists(path: &Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };

    // Skip if parent is empty path (relative root)
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    match fs::metadata(parent) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} exists but is not a directory", parent.display()),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => fs::create_dir_all(parent),
        Err(e) => Err(e),
    }
}
