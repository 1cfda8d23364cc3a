//! Scoped temp files backing a single acquisition attempt.

use std::{
    io,
    path::{Path, PathBuf},
};

use {
    tempfile::TempPath,
    tracing::{debug, warn},
};

/// A temp file owned by one acquire-and-deliver attempt.
///
/// [`release`](Self::release) deletes it; dropping without releasing (panic,
/// early return) deletes it too. The file may already be gone if a session
/// sweep reclaimed it first.
#[derive(Debug)]
pub struct AcquiredAsset {
    path: TempPath,
}

impl AcquiredAsset {
    /// Create an empty temp file under `dir`.
    pub fn allocate(dir: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let file = tempfile::Builder::new()
            .prefix("reelbot-")
            .suffix(".part")
            .tempfile_in(dir)?;
        Ok(Self {
            path: file.into_temp_path(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn path_buf(&self) -> PathBuf {
        self.path.to_path_buf()
    }

    /// Delete the backing file.
    pub fn release(self) {
        let path = self.path_buf();
        match self.path.close() {
            Ok(()) => debug!(path = %path.display(), "released acquired asset"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "acquired asset already removed");
            },
            Err(e) => warn!(path = %path.display(), error = %e, "failed to release acquired asset"),
        }
    }
}

/// Delete a temp file recorded in a session, tolerating it being gone.
pub fn release_path(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "released orphaned asset"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {},
        Err(e) => warn!(path = %path.display(), error = %e, "failed to release orphaned asset"),
    }
}

/// Format a byte count for captions ("1.4 GB", "512 KB").
#[must_use]
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
