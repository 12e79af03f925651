//! Atomic file output.
//!
//! Content goes to a temporary file next to the target, which is synced and
//! then renamed over the target. A failed write leaves the target untouched.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Writes `target` through `write_fn` without ever exposing a partial file.
///
/// The temporary file is removed if `write_fn` fails.
pub fn write_atomic<F>(target: &Path, write_fn: F) -> io::Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        Some(_) => Path::new("."),
        None => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "target path has no parent directory",
            ));
        }
    };

    fs::create_dir_all(parent)?;

    let tmp_path = tmp_path(parent, target.file_name());
    let mut tmp_file = File::create(&tmp_path)?;

    let written = write_fn(&mut tmp_file).and_then(|()| tmp_file.sync_all());
    if let Err(err) = written {
        drop(tmp_file);
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    drop(tmp_file);

    if let Err(err) = fs::rename(&tmp_path, target) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }

    Ok(())
}

fn tmp_path(parent: &Path, file_name: Option<&OsStr>) -> PathBuf {
    let base_name = file_name
        .and_then(OsStr::to_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("rabbitlock-output");

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();

    let counter = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);

    parent.join(format!(
        ".{base_name}.tmp-{}-{timestamp}-{counter}",
        std::process::id()
    ))
}
