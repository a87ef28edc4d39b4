//! Crash-safe persistence for the book and EPD files.
//!
//! Every overwrite of a persistent artefact goes through the same two
//! steps: copy the existing file to a timestamped backup, then write the
//! new contents to a temp file and rename it into place. The rename is
//! atomic on the platforms this toolchain targets, so a crash mid-write
//! never leaves a half-written book or EPD file behind — worst case, the
//! temp file is orphaned and the previous version (plus its backup) is
//! intact.

use std::fs;
use std::path::Path;

use rootcause::Report;

/// Write `contents` to `path`, backing up any pre-existing file first.
///
/// The backup is named `<path>.<unix-seconds>.bak` and lives next to the
/// original. Missing parent directories are not created — the caller is
/// expected to be writing into a book/EPD directory that already exists.
pub fn write_with_backup(path: &Path, contents: &[u8]) -> Result<(), Report> {
    if path.exists() {
        let stamp = chrono::Utc::now().timestamp();
        let backup = path.with_extension(format!(
            "{}.{stamp}.bak",
            path.extension().and_then(|e| e.to_str()).unwrap_or("epd")
        ));
        fs::copy(path, &backup).map_err(|e| {
            Report::<std::io::Error>::from(e).context(format!("backing up {}", path.display()))
        })?;
    }

    let tmp = path.with_extension("tmp-write");
    fs::write(&tmp, contents)
        .map_err(|e| Report::<std::io::Error>::from(e).context(format!("writing temp file for {}", path.display())))?;
    fs::rename(&tmp, path)
        .map_err(|e| Report::<std::io::Error>::from(e).context(format!("renaming temp file into {}", path.display())))?;
    Ok(())
}

pub fn read_to_string(path: &Path) -> Result<String, Report> {
    Ok(fs::read_to_string(path)
        .map_err(|e| Report::<std::io::Error>::from(e).context(format!("reading {}", path.display())))?)
}
