//! Filesystem primitives that carry out copy and delete actions.
//!
//! Copies go through a temporary file created next to the destination and are
//! renamed into place once complete. If anything fails, or the process is
//! interrupted, the temporary file is removed when its handle drops and the
//! destination keeps its previous contents.

use crate::utils::paths::{create_parent_dirs_within, prune_empty_parents};
use crate::utils::permissions::FilePermissions;
use filetime::FileTime;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Prefix of in-flight copy files inside the replica
pub const TEMP_PREFIX: &str = ".replisync-";

/// What a copy preserves and how a delete cleans up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Carry permission bits over from the source file
    pub preserve_permissions: bool,
    /// Carry access and modification times over from the source file
    pub preserve_timestamps: bool,
    /// Remove replica directories left empty by a delete
    pub prune_empty_dirs: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            preserve_permissions: true,
            preserve_timestamps: true,
            prune_empty_dirs: false,
        }
    }
}

/// Copy `src` over `dst` inside the replica rooted at `replica_root`
///
/// Missing parent directories are created without following symbolic links.
/// A directory sitting at `dst` is replaced when it holds nothing but empty
/// directories; one that still holds files is an error.
///
/// # Errors
///
/// Returns an error if the source cannot be read, the destination directory
/// cannot be created or written, or the final rename fails.
pub fn copy_file(
    src: &Path,
    dst: &Path,
    replica_root: &Path,
    options: ApplyOptions,
) -> io::Result<()> {
    let mut reader = File::open(src)?;
    let metadata = reader.metadata()?;

    create_parent_dirs_within(replica_root, dst)?;
    if fs::symlink_metadata(dst).is_ok_and(|m| m.is_dir()) {
        remove_empty_tree(dst)?;
    }

    let parent = dst.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no parent directory", dst.display()),
        )
    })?;

    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(".tmp")
        .tempfile_in(parent)?;
    io::copy(&mut reader, temp.as_file_mut())?;
    drop(reader);

    if options.preserve_permissions {
        FilePermissions::from_metadata(&metadata).apply_to_path(temp.path())?;
    }
    if options.preserve_timestamps {
        filetime::set_file_handle_times(
            temp.as_file(),
            Some(FileTime::from_last_access_time(&metadata)),
            Some(FileTime::from_last_modification_time(&metadata)),
        )?;
    }

    temp.persist(dst).map_err(|e| e.error)?;
    Ok(())
}

/// Remove `dir` if it contains only (possibly nested) empty directories
fn remove_empty_tree(dir: &Path) -> io::Result<()> {
    for entry in WalkDir::new(dir).follow_links(false).contents_first(true) {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::DirectoryNotEmpty,
                format!("{} is in the way", entry.path().display()),
            ));
        }
        fs::remove_dir(entry.path())?;
    }
    Ok(())
}

/// Remove `dst` from the replica rooted at `replica_root`
///
/// # Errors
///
/// Returns an error if the file cannot be removed.
pub fn delete_file(dst: &Path, replica_root: &Path, options: ApplyOptions) -> io::Result<()> {
    fs::remove_file(dst)?;
    if options.prune_empty_dirs {
        prune_empty_parents(dst, replica_root);
    }
    Ok(())
}
