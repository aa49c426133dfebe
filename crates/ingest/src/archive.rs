// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

//! Archive extractor.
//!
//! Unpacks `.zip`, `.tar` and `.7z` archives of raw run files into a working
//! directory. Every entry is checked before anything is written: absolute
//! paths, `..` components and special entries (symlinks, devices) fail the
//! extraction and leave the target untouched. Existing files with the same
//! name are overwritten.

use crate::error::{IngestError, Result};
use sevenz_rust::{Password, SevenZArchiveEntry, SevenZReader};
use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tar::EntryType;
use tracing::info;

/// Unix file-type bits for a symbolic link.
const S_IFLNK: u32 = 0o120000;
/// Mask selecting the unix file-type bits.
const S_IFMT: u32 = 0o170000;
/// 7z attribute flag: the high 16 bits carry a unix mode.
const UNIX_EXTENSION: u32 = 0x8000;
/// Windows reparse point attribute (symlinks and junctions).
const REPARSE_POINT: u32 = 0x0400;

/// Supported archive containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Deflate-compressed zip archive.
    Zip,
    /// Plain tar archive.
    Tar,
    /// 7-Zip archive.
    SevenZ,
}

impl ArchiveFormat {
    /// Pick the format from the archive's extension.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Archive`] for unsupported extensions.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("zip") => Ok(Self::Zip),
            Some("tar") => Ok(Self::Tar),
            Some("7z") => Ok(Self::SevenZ),
            _ => Err(IngestError::archive(
                path,
                "unsupported archive format (expected .zip, .tar or .7z)",
            )),
        }
    }
}

/// Result of a successful extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArchive {
    /// Directory the entries were written into.
    pub root: PathBuf,
    /// Regular files written.
    pub files: usize,
}

/// Extract every entry of `archive` into `target`, creating `target` if needed.
///
/// All entries are validated first; nothing is written unless every entry
/// passes.
///
/// # Errors
///
/// Returns [`IngestError::Archive`] when the archive cannot be read or an
/// entry would be written outside `target`, and [`IngestError::Io`] when
/// the target cannot be written.
#[tracing::instrument(
    skip_all,
    fields(archive = %archive.display(), target = %target.display())
)]
pub fn extract_archive(archive: &Path, target: &Path) -> Result<ExtractedArchive> {
    let format = ArchiveFormat::from_path(archive)?;

    let files = match format {
        ArchiveFormat::Zip => extract_zip(archive, target)?,
        ArchiveFormat::Tar => extract_tar(archive, target)?,
        ArchiveFormat::SevenZ => extract_7z(archive, target)?,
    };

    info!(files, "extracted archive");
    Ok(ExtractedArchive {
        root: target.to_path_buf(),
        files,
    })
}

/// A validated entry waiting to be written.
struct PlannedEntry {
    index: usize,
    relative: PathBuf,
    is_dir: bool,
}

fn extract_zip(archive: &Path, target: &Path) -> Result<usize> {
    let file = fs::File::open(archive).map_err(|e| IngestError::archive(archive, e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| IngestError::archive(archive, e))?;

    let mut plan = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        let entry = zip
            .by_index(index)
            .map_err(|e| IngestError::archive(archive, e))?;
        let name = entry.name().to_string();

        let relative = entry
            .enclosed_name()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| {
                IngestError::archive(
                    archive,
                    format!("entry '{name}' escapes the target directory"),
                )
            })?;
        validate_relative_path(archive, &relative)?;

        if entry.unix_mode().is_some_and(|mode| mode & S_IFMT == S_IFLNK) {
            return Err(IngestError::archive(
                archive,
                format!("entry '{name}' is a symbolic link"),
            ));
        }
        plan.push(PlannedEntry {
            index,
            relative,
            is_dir: entry.is_dir(),
        });
    }

    fs::create_dir_all(target).map_err(|e| IngestError::io(target, e))?;
    let mut files = 0;
    for planned in plan {
        let dest = target.join(&planned.relative);
        if planned.is_dir {
            fs::create_dir_all(&dest).map_err(|e| IngestError::io(&dest, e))?;
            continue;
        }
        let mut entry = zip
            .by_index(planned.index)
            .map_err(|e| IngestError::archive(archive, e))?;
        write_entry(&dest, &mut entry)?;
        files += 1;
    }
    Ok(files)
}

fn extract_tar(archive: &Path, target: &Path) -> Result<usize> {
    let open = || -> Result<tar::Archive<fs::File>> {
        let file = fs::File::open(archive).map_err(|e| IngestError::archive(archive, e))?;
        Ok(tar::Archive::new(file))
    };

    let mut scan = open()?;
    for entry in scan.entries().map_err(|e| IngestError::archive(archive, e))? {
        let entry = entry.map_err(|e| IngestError::archive(archive, e))?;
        let entry_type = entry.header().entry_type();
        let relative = entry.path().map_err(|e| IngestError::archive(archive, e))?;
        match entry_type {
            EntryType::Regular | EntryType::Directory => {}
            EntryType::XGlobalHeader | EntryType::XHeader => continue,
            _ => {
                return Err(IngestError::archive(
                    archive,
                    format!(
                        "entry '{}' is not a regular file or directory",
                        relative.display()
                    ),
                ));
            }
        }
        validate_relative_path(archive, &relative)?;
    }

    fs::create_dir_all(target).map_err(|e| IngestError::io(target, e))?;
    let mut unpack = open()?;
    let mut files = 0;
    for entry in unpack.entries().map_err(|e| IngestError::archive(archive, e))? {
        let mut entry = entry.map_err(|e| IngestError::archive(archive, e))?;
        let entry_type = entry.header().entry_type();
        let relative = entry
            .path()
            .map_err(|e| IngestError::archive(archive, e))?
            .into_owned();

        let dest = target.join(&relative);
        match entry_type {
            EntryType::Directory => {
                fs::create_dir_all(&dest).map_err(|e| IngestError::io(&dest, e))?;
            }
            EntryType::Regular => {
                write_entry(&dest, &mut entry)?;
                files += 1;
            }
            _ => {}
        }
    }
    Ok(files)
}

fn extract_7z(archive: &Path, target: &Path) -> Result<usize> {
    let mut reader = SevenZReader::open(archive, Password::empty())
        .map_err(|e| IngestError::archive(archive, e))?;

    for entry in &reader.archive().files {
        validate_relative_path(archive, Path::new(entry.name()))?;
        if entry.is_anti_item {
            return Err(IngestError::archive(
                archive,
                format!("entry '{}' is a deletion marker", entry.name()),
            ));
        }
        if is_7z_symlink(entry) {
            return Err(IngestError::archive(
                archive,
                format!("entry '{}' is a symbolic link", entry.name()),
            ));
        }
    }

    fs::create_dir_all(target).map_err(|e| IngestError::io(target, e))?;
    let mut files = 0;
    let mut failure = None;
    reader
        .for_each_entries(|entry, data| {
            let dest = target.join(entry.name());
            let written = if entry.is_directory() {
                fs::create_dir_all(&dest).map_err(|e| IngestError::io(&dest, e))
            } else {
                write_entry(&dest, data).map(|()| files += 1)
            };
            match written {
                Ok(()) => Ok(true),
                Err(err) => {
                    failure = Some(err);
                    Ok(false)
                }
            }
        })
        .map_err(|e| IngestError::archive(archive, e))?;

    match failure {
        Some(err) => Err(err),
        None => Ok(files),
    }
}

fn is_7z_symlink(entry: &SevenZArchiveEntry) -> bool {
    if !entry.has_windows_attributes {
        return false;
    }
    let attributes = entry.windows_attributes;
    let unix_link =
        attributes & UNIX_EXTENSION != 0 && (attributes >> 16) & S_IFMT == S_IFLNK;
    unix_link || attributes & REPARSE_POINT != 0
}

/// Create `dest` (and its parents) and copy `data` into it.
fn write_entry(dest: &Path, data: &mut dyn Read) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| IngestError::io(parent, e))?;
    }
    let mut out = fs::File::create(dest).map_err(|e| IngestError::io(dest, e))?;
    io::copy(data, &mut out).map_err(|e| IngestError::io(dest, e))?;
    Ok(())
}

/// Reject paths that are absolute, empty or climb out of the target.
fn validate_relative_path(archive: &Path, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(IngestError::archive(archive, "entry with an empty path"));
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(IngestError::archive(
                    archive,
                    format!("entry '{}' escapes the target directory", path.display()),
                ));
            }
        }
    }
    Ok(())
}
