//! Filesystem operations module.
//!
//! This module provides low-level operations for:
//! - Listing the direct children of the source directory
//! - Copying one file into a destination directory (the copy primitive)
//! - Counting destination entries for the final report

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::CopyError;
use crate::model::SourceOrder;

/// The copy primitive: put `file` into `destination_dir`.
///
/// Implementations must overwrite an existing file of the same name and be
/// safe to call from several worker threads at once.
pub trait FileCopier: Send + Sync {
    /// Copy `file` into `destination_dir`, returning the bytes written.
    fn copy_to_dir(&self, file: &Path, destination_dir: &Path) -> Result<u64, CopyError>;
}

/// Default `FileCopier` backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsCopier;

impl FileCopier for FsCopier {
    fn copy_to_dir(&self, file: &Path, destination_dir: &Path) -> Result<u64, CopyError> {
        let name = file.file_name().ok_or_else(|| CopyError::NoFileName {
            path: file.to_path_buf(),
        })?;
        copy_file_with_metadata(file, &destination_dir.join(name))
    }
}

/// List the direct children of `source`, files and subdirectories alike.
///
/// # Errors
/// Returns the io error if the directory or one of its entries cannot be read.
pub fn list_source_entries(source: &Path, order: SourceOrder) -> io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(source)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;

    if order == SourceOrder::Name {
        entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    }
    Ok(entries)
}

/// Number of direct entries in `dir`.
pub fn count_entries(dir: &Path) -> io::Result<usize> {
    Ok(fs::read_dir(dir)?.count())
}

/// Copy a file from source to destination with modification time preservation.
///
/// An existing destination file is truncated and overwritten.
///
/// # Errors
/// Returns `CopyError::NotAFile` for directories and other non-files, and
/// read or write errors with the offending path.
pub fn copy_file_with_metadata(src: &Path, dst: &Path) -> Result<u64, CopyError> {
    let mut src_file = fs::File::open(src).map_err(|e| CopyError::Read {
        path: src.to_path_buf(),
        source: e,
    })?;

    let src_metadata = src_file.metadata().map_err(|e| CopyError::Read {
        path: src.to_path_buf(),
        source: e,
    })?;
    if !src_metadata.is_file() {
        return Err(CopyError::NotAFile {
            path: src.to_path_buf(),
        });
    }
    let src_mtime = src_metadata.modified().ok();

    let mut dst_file = fs::File::create(dst).map_err(|e| CopyError::Write {
        path: dst.to_path_buf(),
        source: e,
    })?;

    let bytes_copied = io::copy(&mut src_file, &mut dst_file).map_err(|e| {
        if e.kind() == io::ErrorKind::PermissionDenied {
            CopyError::Write {
                path: dst.to_path_buf(),
                source: e,
            }
        } else {
            CopyError::Read {
                path: src.to_path_buf(),
                source: e,
            }
        }
    })?;

    if let Some(mtime) = src_mtime {
        let _ = filetime::set_file_mtime(dst, filetime::FileTime::from_system_time(mtime));
    }

    Ok(bytes_copied)
}
