// FilesystemNamer - collision-free destination filenames
//
// `safe_name` is the pure probe used for previews; `reserve` performs the
// same probe with exclusive file creation so that two downloads of the same
// title can never land on one slot.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use super::errors::FetchError;

const INVALID_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const DEFAULT_TITLE: &str = "video";
const MAX_PROBES: usize = 10_000;

pub fn sanitize_filename(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| if INVALID_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        cleaned.to_string()
    }
}

/// `base.ext`, then `base (1).ext`, `base (2).ext`, ...
fn candidate(base: &str, ext: &str, n: usize) -> String {
    match n {
        0 => format!("{}.{}", base, ext),
        n => format!("{} ({}).{}", base, n, ext),
    }
}

/// First candidate not present in `existing`
pub fn safe_name(title: &str, ext: &str, existing: &HashSet<String>) -> String {
    let base = sanitize_filename(title);
    let ext = ext.trim_start_matches('.');
    let mut n = 0;
    loop {
        let name = candidate(&base, ext, n);
        if !existing.contains(&name) {
            return name;
        }
        n += 1;
    }
}

/// Destination file created exclusively; removed on drop unless committed
#[derive(Debug)]
pub struct ReservedFile {
    path: PathBuf,
    committed: bool,
}

impl ReservedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the file and hand back its path
    pub fn commit(mut self) -> PathBuf {
        self.committed = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for ReservedFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "released partial download"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "failed to remove partial download"),
        }
    }
}

/// Reserve the first free name in `dir` for `title.ext`
pub async fn reserve(dir: &Path, title: &str, ext: &str) -> Result<ReservedFile, FetchError> {
    let base = sanitize_filename(title);
    let ext = ext.trim_start_matches('.');
    for n in 0..MAX_PROBES {
        let path = dir.join(candidate(&base, ext, n));
        let created = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;

        match created {
            Ok(_file) => {
                tracing::debug!(path = %path.display(), "reserved destination");
                return Ok(ReservedFile {
                    path,
                    committed: false,
                });
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(FetchError::filesystem("Could not create output file", e)),
        }
    }

    Err(FetchError::Filesystem {
        message: format!(
            "No free filename for \"{}\" in {}",
            base,
            dir.display()
        ),
    })
}

/// Names currently present in `dir`
pub fn existing_names(dir: &Path) -> io::Result<HashSet<String>> {
    let mut names = HashSet::new();
    for entry in std::fs::read_dir(dir)? {
        if let Some(name) = entry?.file_name().to_str() {
            names.insert(name.to_string());
        }
    }
    Ok(names)
}
