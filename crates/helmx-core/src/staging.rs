//! Staging directories and manifest discovery
//!
//! A [`StagingDir`] is the private working copy every pipeline stage writes into. It is
//! removed when dropped unless [`StagingDir::keep`] is called.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::error::{CoreError, Result};

/// Exclusively owned temporary directory holding the chart being built
#[derive(Debug)]
pub struct StagingDir {
    temp: TempDir,
    root: PathBuf,
}

impl StagingDir {
    /// Create a fresh, randomly named directory under the system temp dir
    pub fn new() -> Result<Self> {
        let temp = tempfile::Builder::new().prefix("helmx").tempdir()?;
        let root = temp.path().to_path_buf();
        Ok(Self { temp, root })
    }

    /// The temporary directory itself
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// The chart root; differs from [`path`](Self::path) for fetched charts
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn set_root(&mut self, root: PathBuf) {
        self.root = root;
    }

    /// Leave the directory on disk and return the chart root
    pub fn keep(self) -> PathBuf {
        let _ = self.temp.keep();
        self.root
    }
}

/// Recursively copy `src` into `dst`, creating `dst` if needed
pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;

    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry.map_err(|e| CoreError::Io(e.into()))?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        if rel.as_os_str().is_empty() {
            continue;
        }

        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}

/// Whether a path names a gzipped tarball
pub fn is_archive(path: &Path) -> bool {
    let name = path.to_string_lossy();
    name.ends_with(".tgz") || name.ends_with(".tar.gz")
}

/// Extract a `.tgz` into `dest_dir`, delete the archive and return the single extracted entry
///
/// The archive is unpacked into a scratch directory first so sibling archives already
/// extracted into `dest_dir` do not count against the one-entry check.
pub fn untar(archive: &Path, dest_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dest_dir)?;
    let scratch = tempfile::Builder::new()
        .prefix(".untar")
        .tempdir_in(dest_dir)?;

    let file = File::open(archive)?;
    Archive::new(GzDecoder::new(file))
        .unpack(scratch.path())
        .map_err(|e| CoreError::Archive {
            archive: archive.to_path_buf(),
            message: e.to_string(),
        })?;

    let extracted = single_entry(scratch.path())?;
    let name = extracted
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_default();
    let target = dest_dir.join(name);
    fs::rename(&extracted, &target)?;
    fs::remove_file(archive)?;

    Ok(target)
}

/// Return the only entry of `dir`, failing if there are zero or several
pub fn single_entry(dir: &Path) -> Result<PathBuf> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();

    match entries.as_slice() {
        [only] => Ok(dir.join(only)),
        _ => Err(CoreError::UnexpectedEntries {
            dir: dir.to_path_buf(),
            count: entries.len(),
            entries,
        }),
    }
}

/// Find files under `base` whose name ends with `suffix` and which sit below a directory
/// named `match_sub_path` (any depth). An empty `match_sub_path` matches every file.
///
/// Results are sorted by path.
pub fn search_files(base: &Path, match_sub_path: &str, suffix: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(base).sort_by_file_name() {
        let entry = entry.map_err(|e| CoreError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !path.to_string_lossy().ends_with(suffix) {
            continue;
        }

        let rel = path.strip_prefix(base).unwrap_or(path);
        let in_sub_path = match_sub_path.is_empty()
            || rel
                .parent()
                .is_some_and(|parent| parent.iter().any(|c| c == match_sub_path));
        if in_sub_path {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}
