//! On-disk artifact helpers.
//!
//! Stage outputs are written to a temporary file next to their canonical path
//! and renamed into place, so an interrupted or failed write never replaces a
//! previously produced artifact. The presence of the canonical path is the
//! only signal used to skip a stage.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use log::info;

/// How a stage produced its result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// The artifact was computed and written in this run
    Written,
    /// The artifact already existed and was read back unchanged
    Skipped,
}

/// Whether a stage artifact already exists at its canonical path
pub fn is_present(path: &Path) -> bool {
    path.exists()
}

/// Log and report whether a stage can be skipped because its artifact exists
pub fn skip_if_present(path: &Path, stage: &str) -> bool {
    if is_present(path) {
        info!(
            "{} already created and stored in {}. Proceeding with next step.",
            stage,
            path.display()
        );
        true
    } else {
        false
    }
}

/// Files in `dir` whose name ends with `suffix`, sorted by path
pub fn list_files(dir: &Path, suffix: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(suffix));
        if matches && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Write `path` through a temporary sibling file and rename it into place
pub fn persist_atomically<E, F>(path: &Path, write: F) -> Result<(), E>
where
    E: From<std::io::Error>,
    F: FnOnce(&mut File) -> Result<(), E>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| E::from(e.error))?;
    Ok(())
}
