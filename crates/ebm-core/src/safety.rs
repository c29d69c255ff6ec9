//! Safe file operations used by the library manager.
//!
//! Every mutation is logged through [`crate::logging`] so the on-disk effect
//! of an import or removal can be reconstructed from the log.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::logging::{log_file_error, log_fs_modification};

/// Outcome of [`copy_new`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    /// The destination already existed and was left alone
    AlreadyExists,
}

/// Copy `src` to `dst` only if `dst` does not exist yet.
///
/// `on_create` runs as soon as the destination has been created and before
/// any bytes are written, so a caller tracking written paths also sees
/// partially copied files.
pub fn copy_new(src: &Path, dst: &Path, on_create: impl FnOnce(&Path)) -> io::Result<CopyOutcome> {
    let mut reader = fs::File::open(src)?;
    let mut writer = match OpenOptions::new().write(true).create_new(true).open(dst) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Ok(CopyOutcome::AlreadyExists);
        }
        Err(e) => return Err(e),
    };
    on_create(dst);

    io::copy(&mut reader, &mut writer)?;
    writer.sync_all()?;
    if let Ok(metadata) = reader.metadata() {
        if let Err(e) = fs::set_permissions(dst, metadata.permissions()) {
            log_file_error(dst, "set_permissions", &e);
        }
    }

    log_fs_modification("copy", dst, Some(&format!("from {}", src.display())));
    Ok(CopyOutcome::Copied)
}

/// Move a file, creating the destination's parent directories.
///
/// Falls back to copy-then-delete when a rename is not possible
/// (e.g. across filesystems). If the fallback fails, `dst` is removed again
/// and `src` is left where it was.
pub fn move_file(src: &Path, dst: &Path) -> io::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }

    if fs::rename(src, dst).is_err() {
        if let Err(e) = fs::copy(src, dst).and_then(|_| fs::remove_file(src)) {
            if src.exists() {
                remove_quietly(dst);
            }
            return Err(e);
        }
    }

    log_fs_modification("move", src, Some(&format!("to {}", dst.display())));
    Ok(())
}

/// Remove a file, logging instead of failing. A missing file counts as removed.
pub fn remove_quietly(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => {
            log_fs_modification("delete", path, None);
            true
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => {
            log_file_error(path, "delete", &e);
            false
        }
    }
}

/// Remove empty directories from `start` upwards, stopping at `root`
/// (which is never removed) or at the first non-empty directory.
pub fn prune_empty_dirs(start: &Path, root: &Path) {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) {
            break;
        }
        // Fails on non-empty directories, which ends the walk
        if fs::remove_dir(dir).is_err() {
            break;
        }
        log_fs_modification("rmdir", dir, None);
        current = dir.parent();
    }
}

/// Make a title or author list usable as a single path component.
pub fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim();

    match cleaned {
        "" => "Untitled".to_string(),
        "." | ".." => cleaned.replace('.', "_"),
        _ => cleaned.to_string(),
    }
}

/// `path` re-rooted from `from` to `to`; files outside `from` keep only
/// their file name.
pub fn rebase(path: &Path, from: &Path, to: &Path) -> PathBuf {
    match path.strip_prefix(from) {
        Ok(relative) => to.join(relative),
        Err(_) => to.join(path.file_name().unwrap_or(path.as_os_str())),
    }
}
