//! Output file access

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{CodegenError, Result};

/// Write `content` to `path` atomically.
///
/// The bytes go to a temporary file next to the target, are synced, and the
/// temporary file is renamed over the target. Parent directories are created.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let write_error = |source| CodegenError::WriteError {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_error)?;
    }

    let temp_path = temp_path(path);
    let result = (|| {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(write_error(e));
    }
    Ok(())
}

/// Read an existing output file as text
pub fn read_existing(path: &Path) -> std::io::Result<String> {
    let text = fs::read_to_string(path)?;
    Ok(text)
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}
