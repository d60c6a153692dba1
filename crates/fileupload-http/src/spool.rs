//! Disk-backed item storage.
//!
//! [`SpoolStore`] keeps small parts in memory and moves a part to a temporary
//! file once it grows past a threshold. Temporary files belong to the
//! [`SpooledItem`] and are removed when it is dropped, unless persisted.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use fileupload_core::{ItemStore, PartHeader, UploadError};

/// Default in-memory threshold (1MB).
pub const DEFAULT_SPOOL_THRESHOLD: usize = 1024 * 1024;

const COPY_CHUNK: usize = 8 * 1024;

static SPOOL_COUNTER: AtomicU64 = AtomicU64::new(1);

/// An [`ItemStore`] that spools large parts to disk.
#[derive(Debug, Clone)]
pub struct SpoolStore {
    threshold: usize,
    dir: PathBuf,
}

impl Default for SpoolStore {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SPOOL_THRESHOLD,
            dir: std::env::temp_dir(),
        }
    }
}

impl SpoolStore {
    /// Create a store with the default threshold in the system temp directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parts larger than `threshold` bytes go to disk.
    #[must_use]
    pub fn threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    /// Directory for temporary files.
    #[must_use]
    pub fn directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    #[must_use]
    pub fn get_threshold(&self) -> usize {
        self.threshold
    }

    #[must_use]
    pub fn get_directory(&self) -> &Path {
        &self.dir
    }

    fn spool(
        &self,
        header: PartHeader,
        buffered: &[u8],
        body: &mut dyn Read,
    ) -> Result<SpooledItem, UploadError> {
        let (path, file) = create_spool_file(&self.dir)?;
        tracing::debug!(
            field = header.field_name(),
            path = %path.display(),
            "spooling part to disk"
        );
        // Owns the path from here on, so an early return removes it.
        let mut item = SpooledItem {
            header,
            storage: Storage::File { path, len: 0 },
        };

        // The handle is closed inside the helper, before `item` can be
        // dropped and unlink the file.
        let written = fill_spool_file(file, buffered, body)?;
        if let Storage::File { len, .. } = &mut item.storage {
            *len = written;
        }
        Ok(item)
    }
}

impl ItemStore for SpoolStore {
    type Item = SpooledItem;

    fn store(&mut self, header: PartHeader, body: &mut dyn Read) -> Result<SpooledItem, UploadError> {
        let mut data = Vec::new();
        let mut chunk = [0u8; COPY_CHUNK];
        loop {
            let n = match body.read(&mut chunk) {
                Ok(0) => {
                    return Ok(SpooledItem {
                        header,
                        storage: Storage::InMemory(data),
                    });
                }
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };
            data.extend_from_slice(&chunk[..n]);
            if data.len() > self.threshold {
                return self.spool(header, &data, body);
            }
        }
    }
}

#[derive(Debug)]
enum Storage {
    InMemory(Vec<u8>),
    File { path: PathBuf, len: u64 },
    Persisted,
}

/// A part held in memory or in a temporary file.
#[derive(Debug)]
pub struct SpooledItem {
    header: PartHeader,
    storage: Storage,
}

impl SpooledItem {
    #[must_use]
    pub fn header(&self) -> &PartHeader {
        &self.header
    }

    #[must_use]
    pub fn field_name(&self) -> &str {
        self.header.field_name()
    }

    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.header.file_name()
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header.content_type()
    }

    #[must_use]
    pub fn is_form_field(&self) -> bool {
        self.header.is_form_field()
    }

    /// Returns true if the body is held in memory.
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        matches!(self.storage, Storage::InMemory(_))
    }

    /// Path of the temporary file, if the body was spooled.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.storage {
            Storage::File { path, .. } => Some(path.as_path()),
            _ => None,
        }
    }

    /// Body size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        match &self.storage {
            Storage::InMemory(data) => as_u64(data.len()),
            Storage::File { len, .. } => *len,
            Storage::Persisted => 0,
        }
    }

    /// Read the whole body.
    pub fn bytes(&self) -> io::Result<Vec<u8>> {
        match &self.storage {
            Storage::InMemory(data) => Ok(data.clone()),
            Storage::File { path, .. } => std::fs::read(path),
            Storage::Persisted => Err(io::Error::other("item has been persisted")),
        }
    }

    /// Move the body to `dest`.
    ///
    /// Spooled bodies are renamed when possible and copied otherwise; the
    /// temporary file is gone afterwards either way.
    pub fn persist(&mut self, dest: &Path) -> io::Result<()> {
        match std::mem::replace(&mut self.storage, Storage::Persisted) {
            Storage::InMemory(data) => std::fs::write(dest, data),
            Storage::File { path, len } => {
                if std::fs::rename(&path, dest).is_ok() {
                    return Ok(());
                }
                let result = std::fs::copy(&path, dest).map(|_| ());
                if result.is_err() {
                    self.storage = Storage::File { path, len };
                    return result;
                }
                remove_quietly(&path);
                Ok(())
            }
            Storage::Persisted => Err(io::Error::other("item has already been persisted")),
        }
    }
}

impl Drop for SpooledItem {
    fn drop(&mut self) {
        if let Storage::File { path, .. } = &self.storage {
            remove_quietly(path);
        }
    }
}

fn remove_quietly(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        if err.kind() != io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %err, "failed to remove spool file");
        }
    }
}

fn create_spool_file(dir: &Path) -> io::Result<(PathBuf, File)> {
    let ts_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    for _ in 0..32 {
        let counter = SPOOL_COUNTER.fetch_add(1, Ordering::Relaxed);
        let candidate = dir.join(format!(
            "fileupload-{}-{ts_nanos}-{counter}.tmp",
            std::process::id()
        ));

        match OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&candidate)
        {
            Ok(file) => return Ok((candidate, file)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
            Err(err) => return Err(err),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        "failed to allocate unique spool file",
    ))
}

fn fill_spool_file(mut file: File, buffered: &[u8], body: &mut dyn Read) -> io::Result<u64> {
    file.write_all(buffered)?;
    let copied = io::copy(body, &mut file)?;
    file.flush()?;
    Ok(as_u64(buffered.len()).saturating_add(copied))
}

fn as_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}
