//! Partial-download marker kept next to each destination file.
//!
//! The marker records how many bytes of the destination are known to be on
//! disk. It is rewritten only after those bytes were synced, and always via a
//! temporary file plus rename, so after a crash it never claims more than the
//! file holds.

use crate::error::Result;

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};

/// Extension appended to the destination path to form the marker path.
pub const MARKER_EXTENSION: &str = "haul";

/// Persisted resume information for one destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeMarker {
    /// URL the bytes were fetched from.
    pub source: String,
    /// Bytes durably written to the destination.
    pub bytes_written: u64,
    /// Total size, if it was known when the marker was written.
    #[serde(default)]
    pub total_size: Option<u64>,
}

/// `movie.mkv` -> `movie.mkv.haul`
pub fn marker_path(destination: &Path) -> PathBuf {
    let mut name = OsString::from(destination.as_os_str());
    name.push(".");
    name.push(MARKER_EXTENSION);
    PathBuf::from(name)
}

fn temporary_path(destination: &Path) -> PathBuf {
    let mut name = OsString::from(marker_path(destination).as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Make a rename inside `path`'s directory durable.
#[cfg(unix)]
async fn sync_parent(path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::File::open(parent).await?.sync_all().await?;
    Ok(())
}

#[cfg(not(unix))]
async fn sync_parent(_path: &Path) -> Result<()> {
    Ok(())
}

impl ResumeMarker {
    pub fn new(source: impl Into<String>, bytes_written: u64, total_size: Option<u64>) -> Self {
        Self {
            source: source.into(),
            bytes_written,
            total_size,
        }
    }

    /// Read the marker for `destination`. A missing marker is `Ok(None)`.
    pub async fn load(destination: &Path) -> Result<Option<Self>> {
        let raw = match fs::read(marker_path(destination)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    /// Atomically replace the marker for `destination`.
    pub async fn store(&self, destination: &Path) -> Result<()> {
        let tmp = temporary_path(destination);
        let encoded = serde_json::to_vec(self)?;

        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&encoded).await?;
        file.sync_all().await?;
        drop(file);

        let path = marker_path(destination);
        fs::rename(&tmp, &path).await?;
        sync_parent(&path).await
    }

    /// Delete the marker for `destination`, if any.
    pub async fn remove(destination: &Path) -> Result<()> {
        match fs::remove_file(marker_path(destination)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
