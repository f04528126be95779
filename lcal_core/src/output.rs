//! Writes calendar files without ever leaving a partial file behind.

use std::{fs, io::Write, path::Path};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::Result;

/// Write `bytes` to a temporary file next to `path` and move it over `path` afterwards.
///
/// Readers see either the previous file or the complete new one.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| err.error)?;
    debug!(path = %path.display(), bytes = bytes.len(), "wrote calendar");
    Ok(())
}
