use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Separator used in relative path keys on every platform
pub const KEY_SEPARATOR: char = '/';

/// Computes the slash-separated key of `path` relative to `root`
///
/// Keys are compared as case-sensitive strings, so the same file gets the same
/// key regardless of the platform's native separator.
///
/// # Errors
///
/// Returns an error if `path` is not under `root` or a component is not valid
/// UTF-8.
pub fn relative_key(root: &Path, path: &Path) -> io::Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not under {}", path.display(), root.display()),
        )
    })?;

    let mut key = String::new();
    for component in relative.components() {
        let Component::Normal(part) = component else {
            continue;
        };
        let part = part.to_str().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("file name is not valid UTF-8: {}", part.to_string_lossy()),
            )
        })?;
        if !key.is_empty() {
            key.push(KEY_SEPARATOR);
        }
        key.push_str(part);
    }
    Ok(key)
}

/// Like [`relative_key`], but substitutes invalid UTF-8 instead of failing
///
/// Used to name entries in error reports.
#[must_use]
pub fn lossy_key(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Resolves a relative key back onto a tree root
#[must_use]
pub fn resolve_key(root: &Path, key: &str) -> PathBuf {
    key.split(KEY_SEPARATOR)
        .filter(|part| !part.is_empty())
        .fold(root.to_path_buf(), |acc, part| acc.join(part))
}

/// Returns true if `key` equals `prefix` or lies inside the directory `prefix`
///
/// An empty prefix covers every key.
#[must_use]
pub fn key_is_within(key: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || key == prefix
        || (key.starts_with(prefix) && key[prefix.len()..].starts_with(KEY_SEPARATOR))
}

/// Creates the parent directories of `path` below `root`, one level at a time
///
/// Symbolic links are never followed: a link found where a directory is
/// needed is removed and replaced by a real directory, so nothing is ever
/// written outside `root`. `root` itself is taken as is.
///
/// # Errors
///
/// Returns an error if `path` is not under `root`, a non-directory blocks one
/// of the levels, or a directory cannot be created.
pub fn create_parent_dirs_within(root: &Path, path: &Path) -> io::Result<()> {
    let parent = path.parent().unwrap_or(root);
    let relative = parent.strip_prefix(root).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not under {}", path.display(), root.display()),
        )
    })?;

    if let Err(e) = fs::symlink_metadata(root) {
        if e.kind() != io::ErrorKind::NotFound {
            return Err(e);
        }
        fs::create_dir_all(root)?;
    }

    let mut current = root.to_path_buf();
    for component in relative.components() {
        let Component::Normal(part) = component else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unexpected component in {}", path.display()),
            ));
        };
        current.push(part);

        match fs::symlink_metadata(&current) {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                remove_link(&current)?;
                fs::create_dir(&current)?;
            }
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!("{} is not a directory", current.display()),
                ));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => fs::create_dir(&current)?,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Removes a symbolic link itself, never its target
fn remove_link(link: &Path) -> io::Result<()> {
    // Directory links on Windows are removed like directories.
    fs::remove_file(link).or_else(|_| fs::remove_dir(link))
}

/// Removes empty directories from `start` upwards, stopping at `stop_at`
///
/// `stop_at` itself is never removed. Stops at the first directory that is
/// not empty.
pub fn prune_empty_parents(start: &Path, stop_at: &Path) {
    let mut current = start.parent();
    while let Some(dir) = current {
        if dir == stop_at || !dir.starts_with(stop_at) {
            break;
        }
        if fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}

/// Makes a path absolute, resolving relative paths from current directory
///
/// # Errors
///
/// Returns an error if the current directory cannot be determined
pub fn make_absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        let current_dir = std::env::current_dir().context("Could not read current directory")?;
        Ok(current_dir.join(path))
    }
}

/// Lexically normalizes an absolute path, resolving `.` and `..` components
#[must_use]
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Checks whether two trees overlap (equal, or one nested inside the other)
///
/// The longest existing ancestor of each path is canonicalized so symlinked
/// roots are caught too.
///
/// # Errors
///
/// Returns an error if the current directory cannot be determined
pub fn trees_overlap(a: &Path, b: &Path) -> Result<bool> {
    let a = resolve_for_comparison(a)?;
    let b = resolve_for_comparison(b)?;
    Ok(a.starts_with(&b) || b.starts_with(&a))
}

/// Canonicalizes the longest existing ancestor and re-appends the remainder
fn resolve_for_comparison(path: &Path) -> Result<PathBuf> {
    let absolute = normalize_lexically(&make_absolute(path)?);
    let mut existing = absolute.as_path();
    let mut tail = Vec::new();

    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return Ok(tail.iter().rev().fold(canonical, |acc, part| acc.join(part)));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(absolute),
        }
    }
}
