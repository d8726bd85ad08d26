//! Fixed-width numeric arrays as bytes, and all-or-nothing file replacement.
//!
//! Byte order is chosen per call: IDX header fields go out big-endian, weight
//! payloads little-endian. Nothing here follows the host's byte order.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use byteorder::{ByteOrder, WriteBytesExt};
use log::debug;
use tempfile::Builder;

use crate::error::{ExportError, Result};

/// Writes each value as a 4-byte float in byte order `E`.
pub fn write_f32s<E: ByteOrder, W: Write + ?Sized>(w: &mut W, values: &[f32]) -> io::Result<()> {
    for &v in values {
        w.write_f32::<E>(v)?;
    }
    Ok(())
}

/// Writes each value as a 4-byte signed integer in byte order `E`.
pub fn write_i32s<E: ByteOrder, W: Write + ?Sized>(w: &mut W, values: &[i32]) -> io::Result<()> {
    for &v in values {
        w.write_i32::<E>(v)?;
    }
    Ok(())
}

/// Writes `path` through `write`, replacing it only once every byte is on disk.
///
/// The data goes to a temporary file next to `path`, which is flushed,
/// synced and renamed over `path`. If `write` or any later step fails the
/// temporary file is removed and whatever was at `path` stays as it was.
/// The new file takes the mode of the file it replaces, or `0o644` when
/// there was none. Returns the number of bytes written.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<u64>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let prefix = format!(
        ".{}.",
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    );
    let mut tmp = Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| ExportError::io(path, e))?;
    debug!("writing {} via {}", path.display(), tmp.path().display());

    let mut counter = CountingWriter::new(BufWriter::new(tmp.as_file_mut()));
    write(&mut counter).map_err(|e| ExportError::io(path, e))?;
    counter.flush().map_err(|e| ExportError::io(path, e))?;
    let written = counter.count;
    drop(counter);

    tmp.as_file()
        .sync_all()
        .map_err(|e| ExportError::io(path, e))?;
    set_target_permissions(tmp.as_file(), path).map_err(|e| ExportError::io(path, e))?;
    tmp.persist(path).map_err(|e| ExportError::io(path, e.error))?;
    Ok(written)
}

// `tempfile` creates files 0600.
#[cfg(unix)]
fn set_target_permissions(file: &File, path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let perms = match fs::metadata(path) {
        Ok(meta) if meta.is_file() => meta.permissions(),
        _ => fs::Permissions::from_mode(0o644),
    };
    file.set_permissions(perms)
}

#[cfg(not(unix))]
fn set_target_permissions(_file: &File, _path: &Path) -> io::Result<()> {
    Ok(())
}

/// Length of the file at `path`.
pub fn file_len(path: &Path) -> Result<u64> {
    File::open(path)
        .and_then(|f| f.metadata())
        .map(|m| m.len())
        .map_err(|e| ExportError::io(path, e))
}

struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
