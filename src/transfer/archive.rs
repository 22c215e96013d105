// src/transfer/archive.rs

//! Artifact archive packing and extraction
//!
//! Artifacts travel as `.tar.xz` archives. Extraction accepts gzip as a
//! fallback for externally produced archives, detected by magic bytes with
//! the file extension as a tiebreaker. Extraction goes through a scratch
//! directory renamed into place at the end, so a failed extraction never
//! leaves a partial artifact tree behind.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Compression applied to an artifact archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// XZ/LZMA (.tar.xz) - the native format for pushed artifacts
    Xz,
    /// Gzip (.tar.gz) - accepted on fetch for externally produced archives
    Gzip,
}

impl ArchiveFormat {
    /// Detect format from a file name
    pub fn from_extension(path: &str) -> Option<Self> {
        if path.ends_with(".xz") {
            Some(Self::Xz)
        } else if path.ends_with(".gz") || path.ends_with(".tgz") {
            Some(Self::Gzip)
        } else {
            None
        }
    }

    /// Detect format from magic bytes
    ///
    /// XZ: `fd 37 7a 58 5a 00`; Gzip: `1f 8b`.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() >= 6 && data[..6] == [0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00] {
            Some(Self::Xz)
        } else if data.len() >= 2 && data[..2] == [0x1f, 0x8b] {
            Some(Self::Gzip)
        } else {
            None
        }
    }
}

/// Pack a directory tree into a `.tar.xz` archive
///
/// Entries are added in sorted order so identical trees produce identical
/// archives regardless of filesystem enumeration order.
pub fn pack_directory(src_dir: &Path, archive_path: &Path) -> Result<()> {
    if !src_dir.is_dir() {
        return Err(Error::IoError(format!(
            "Cannot pack {}: not a directory",
            src_dir.display()
        )));
    }

    let file = File::create(archive_path).map_err(|e| {
        Error::IoError(format!("Failed to create {}: {e}", archive_path.display()))
    })?;
    let encoder = xz2::write::XzEncoder::new(file, 6);
    let mut builder = tar::Builder::new(encoder);

    for entry in WalkDir::new(src_dir).min_depth(1).sort_by_file_name() {
        let entry =
            entry.map_err(|e| Error::IoError(format!("Failed to walk {}: {e}", src_dir.display())))?;
        let rel = entry
            .path()
            .strip_prefix(src_dir)
            .map_err(|e| Error::IoError(format!("Path outside source tree: {e}")))?;

        if entry.file_type().is_dir() {
            builder
                .append_dir(rel, entry.path())
                .map_err(|e| Error::IoError(format!("Failed to add {}: {e}", rel.display())))?;
        } else {
            builder
                .append_path_with_name(entry.path(), rel)
                .map_err(|e| Error::IoError(format!("Failed to add {}: {e}", rel.display())))?;
        }
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| Error::IoError(format!("Failed to finalize archive: {e}")))?;
    encoder
        .finish()
        .map_err(|e| Error::IoError(format!("Failed to finish compression: {e}")))?;

    debug!(
        "Packed {} into {}",
        src_dir.display(),
        archive_path.display()
    );
    Ok(())
}

/// Extract an archive into a directory, creating it if needed
pub fn extract_archive(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let mut file = File::open(archive_path).map_err(|e| {
        Error::IoError(format!("Failed to open {}: {e}", archive_path.display()))
    })?;

    let mut magic = [0u8; 6];
    let read = file
        .read(&mut magic)
        .map_err(|e| Error::IoError(format!("Failed to read {}: {e}", archive_path.display())))?;
    file.seek(SeekFrom::Start(0))
        .map_err(|e| Error::IoError(format!("Failed to rewind {}: {e}", archive_path.display())))?;

    let format = ArchiveFormat::from_magic_bytes(&magic[..read])
        .or_else(|| ArchiveFormat::from_extension(&archive_path.to_string_lossy()))
        .ok_or_else(|| {
            Error::TransferError(format!(
                "Unrecognized archive format: {}",
                archive_path.display()
            ))
        })?;

    let reader = BufReader::new(file);
    let decoder: Box<dyn Read> = match format {
        ArchiveFormat::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
        ArchiveFormat::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
    };

    std::fs::create_dir_all(dest_dir)
        .map_err(|e| Error::IoError(format!("Failed to create {}: {e}", dest_dir.display())))?;
    tar::Archive::new(decoder).unpack(dest_dir).map_err(|e| {
        Error::TransferError(format!(
            "Failed to extract {}: {e}",
            archive_path.display()
        ))
    })?;
    Ok(())
}

/// Extract an archive so the destination appears atomically
///
/// Extracts into a `.partial` scratch sibling and renames it into place.
/// On any failure the scratch is removed and `final_dir` is untouched.
pub fn extract_archive_atomic(archive_path: &Path, final_dir: &Path) -> Result<()> {
    let parent = final_dir
        .parent()
        .ok_or_else(|| Error::IoError(format!("No parent for {}", final_dir.display())))?;
    std::fs::create_dir_all(parent)
        .map_err(|e| Error::IoError(format!("Failed to create {}: {e}", parent.display())))?;

    let dir_name = final_dir
        .file_name()
        .ok_or_else(|| Error::IoError(format!("No directory name in {}", final_dir.display())))?
        .to_string_lossy()
        .into_owned();
    let scratch = parent.join(format!(".{dir_name}.partial"));
    if scratch.exists() {
        std::fs::remove_dir_all(&scratch)
            .map_err(|e| Error::IoError(format!("Failed to clear {}: {e}", scratch.display())))?;
    }

    if let Err(e) = extract_archive(archive_path, &scratch) {
        let _ = std::fs::remove_dir_all(&scratch);
        return Err(e);
    }

    std::fs::rename(&scratch, final_dir).map_err(|e| {
        let _ = std::fs::remove_dir_all(&scratch);
        Error::IoError(format!(
            "Failed to move extraction into {}: {e}",
            final_dir.display()
        ))
    })
}
