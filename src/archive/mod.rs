//! Zip-backed settings archive.
//!
//! The rest of the crate only sees named entries with text, byte or file content:
//!
//! - [`ArchiveBuilder`]: collects entries (a later entry with the same name replaces the
//!   earlier one) and writes them to a staging file that is renamed over the destination
//!   on [`ArchiveBuilder::finish`]. A failed build never touches the destination.
//! - [`ArchiveReader`]: opens an existing archive read-only and looks entries up by name.
//!
//! File entries are streamed, so entries are not limited by memory.

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use tempfile::NamedTempFile;
use thiserror::Error;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Entries at or above this size need zip64 headers.
const LARGE_FILE_THRESHOLD: u64 = u32::MAX as u64;

/// Upper bound for preallocating an entry read into memory
const READ_PREALLOC_LIMIT: u64 = 1 << 20;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Errors raised by the archive layer
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("{path} is not a valid settings archive: {source}")]
    InvalidArchive {
        path: Utf8PathBuf,
        #[source]
        source: ZipError,
    },

    #[error("Entry not found in archive: {0}")]
    EntryNotFound(String),

    #[error("Archive entry {0} is not valid UTF-8 text")]
    NotText(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("Archive format error: {0}")]
    Zip(#[from] ZipError),
}

impl ArchiveError {
    fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Content of a pending archive entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryContent {
    Text(String),
    Bytes(Vec<u8>),
    /// Streamed from disk when the archive is written
    File(Utf8PathBuf),
}

/// Builds a new archive at a destination path.
///
/// Nothing is written until [`finish`](Self::finish) is called.
#[derive(Debug)]
pub struct ArchiveBuilder {
    destination: Utf8PathBuf,
    entries: IndexMap<String, EntryContent>,
}

impl ArchiveBuilder {
    pub fn new<P: AsRef<Utf8Path>>(destination: P) -> Self {
        Self {
            destination: destination.as_ref().to_path_buf(),
            entries: IndexMap::new(),
        }
    }

    pub fn destination(&self) -> &Utf8Path {
        &self.destination
    }

    /// Add a text entry, replacing any entry with the same name.
    pub fn add_text(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.insert(name.into(), EntryContent::Text(text.into()));
    }

    /// Add a binary entry, replacing any entry with the same name.
    pub fn add_bytes(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.insert(name.into(), EntryContent::Bytes(bytes.into()));
    }

    /// Add an entry whose content is copied from `source` when the archive is written.
    ///
    /// The file must exist now; it is read again at [`finish`](Self::finish).
    pub fn add_file<P: AsRef<Utf8Path>>(
        &mut self,
        name: impl Into<String>,
        source: P,
    ) -> Result<(), ArchiveError> {
        let source = source.as_ref();
        let metadata = fs::metadata(source)
            .map_err(|e| ArchiveError::io(format!("Failed to read {}", source), e))?;
        if !metadata.is_file() {
            return Err(ArchiveError::io(
                format!("Failed to read {}", source),
                io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }

        self.insert(name.into(), EntryContent::File(source.to_path_buf()));
        Ok(())
    }

    fn insert(&mut self, name: String, content: EntryContent) {
        if self.entries.insert(name.clone(), content).is_some() {
            tracing::debug!("Replaced existing archive entry: {}", name);
        }
    }

    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write all entries and atomically move the archive into place.
    ///
    /// Returns the entry names in archive order.
    pub fn finish(self) -> Result<Vec<String>, ArchiveError> {
        let parent = match self.destination.parent() {
            Some(p) if !p.as_str().is_empty() => p.to_path_buf(),
            _ => Utf8PathBuf::from("."),
        };
        fs::create_dir_all(&parent)
            .map_err(|e| ArchiveError::io(format!("Failed to create directory {}", parent), e))?;

        let staging = NamedTempFile::new_in(&parent).map_err(|e| {
            ArchiveError::io(format!("Failed to create staging file in {}", parent), e)
        })?;

        let mut zip = ZipWriter::new(staging);
        for (name, content) in &self.entries {
            write_entry(&mut zip, name, content)?;
        }

        let mut staging = zip.finish()?;
        staging
            .as_file_mut()
            .sync_all()
            .map_err(|e| ArchiveError::io("Failed to flush staging archive", e))?;

        staging.persist(&self.destination).map_err(|e| {
            ArchiveError::io(format!("Failed to write archive {}", self.destination), e.error)
        })?;

        tracing::debug!(
            "Wrote archive {} with {} entries",
            self.destination,
            self.entries.len()
        );
        Ok(self.entries.into_keys().collect())
    }
}

fn entry_options(large_file: bool) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644)
        .large_file(large_file)
}

fn write_entry<W: Write + io::Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    content: &EntryContent,
) -> Result<(), ArchiveError> {
    match content {
        EntryContent::Text(text) => {
            zip.start_file(name, entry_options(false))?;
            zip.write_all(text.as_bytes())
                .map_err(|e| ArchiveError::io(format!("Failed to write entry {}", name), e))?;
        }
        EntryContent::Bytes(bytes) => {
            let large = bytes.len() as u64 >= LARGE_FILE_THRESHOLD;
            zip.start_file(name, entry_options(large))?;
            zip.write_all(bytes)
                .map_err(|e| ArchiveError::io(format!("Failed to write entry {}", name), e))?;
        }
        EntryContent::File(path) => {
            let mut input = File::open(path)
                .map_err(|e| ArchiveError::io(format!("Failed to open {}", path), e))?;
            let size = input
                .metadata()
                .map_err(|e| ArchiveError::io(format!("Failed to read {}", path), e))?
                .len();
            zip.start_file(name, entry_options(size >= LARGE_FILE_THRESHOLD))?;
            io::copy(&mut input, zip)
                .map_err(|e| ArchiveError::io(format!("Failed to copy {} into archive", path), e))?;
        }
    }
    Ok(())
}

/// Read-only view of an existing archive
pub struct ArchiveReader {
    path: Utf8PathBuf,
    zip: ZipArchive<File>,
}

impl std::fmt::Debug for ArchiveReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveReader")
            .field("path", &self.path)
            .field("entries", &self.zip.len())
            .finish()
    }
}

impl ArchiveReader {
    /// Open `path` as an archive. Anything that is not a readable zip container is
    /// reported as [`ArchiveError::InvalidArchive`].
    pub fn open<P: AsRef<Utf8Path>>(path: P) -> Result<Self, ArchiveError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| ArchiveError::InvalidArchive {
            path: path.clone(),
            source: ZipError::Io(e),
        })?;
        let zip = ZipArchive::new(file).map_err(|source| ArchiveError::InvalidArchive {
            path: path.clone(),
            source,
        })?;

        Ok(Self { path, zip })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.zip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zip.len() == 0
    }

    /// Entry names in archive order
    pub fn entry_names(&self) -> Vec<String> {
        self.zip.file_names().map(str::to_string).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.zip.file_names().any(|n| n == name)
    }

    pub fn read_bytes(&mut self, name: &str) -> Result<Vec<u8>, ArchiveError> {
        let mut entry = self.zip.by_name(name).map_err(|e| match e {
            ZipError::FileNotFound => ArchiveError::EntryNotFound(name.to_string()),
            other => ArchiveError::Zip(other),
        })?;

        // The declared size is untrusted; only use it as a bounded capacity hint
        let mut data = Vec::with_capacity(entry.size().min(READ_PREALLOC_LIMIT) as usize);
        entry
            .read_to_end(&mut data)
            .map_err(|e| ArchiveError::io(format!("Failed to read entry {}", name), e))?;
        Ok(data)
    }

    /// Read an entry as UTF-8 text, dropping a leading byte order mark.
    pub fn read_text(&mut self, name: &str) -> Result<String, ArchiveError> {
        let mut data = self.read_bytes(name)?;
        if data.starts_with(UTF8_BOM) {
            data.drain(..UTF8_BOM.len());
        }
        String::from_utf8(data).map_err(|_| ArchiveError::NotText(name.to_string()))
    }

    /// Like [`read_text`](Self::read_text), but a missing entry is `Ok(None)`.
    pub fn try_read_text(&mut self, name: &str) -> Result<Option<String>, ArchiveError> {
        match self.read_text(name) {
            Ok(text) => Ok(Some(text)),
            Err(ArchiveError::EntryNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Copy an entry to `destination`, replacing any existing file there.
    ///
    /// The content is staged next to the destination and renamed into place, so a
    /// failed copy leaves the old file intact.
    pub fn extract_to<P: AsRef<Utf8Path>>(
        &mut self,
        name: &str,
        destination: P,
    ) -> Result<u64, ArchiveError> {
        let destination = destination.as_ref();
        let parent = destination
            .parent()
            .filter(|p| !p.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));

        let (staging, written) = self.stage_entry(name, parent)?;
        staging.persist(destination).map_err(|e| {
            ArchiveError::io(format!("Failed to replace {}", destination), e.error)
        })?;

        Ok(written)
    }

    /// Copy an entry into a synced staging file in `directory`.
    ///
    /// The caller inspects the staged content and persists it over the real file, or
    /// drops it to discard it.
    pub fn stage_entry(
        &mut self,
        name: &str,
        directory: &Utf8Path,
    ) -> Result<(NamedTempFile, u64), ArchiveError> {
        let mut entry = self.zip.by_name(name).map_err(|e| match e {
            ZipError::FileNotFound => ArchiveError::EntryNotFound(name.to_string()),
            other => ArchiveError::Zip(other),
        })?;

        let mut staging = NamedTempFile::new_in(directory).map_err(|e| {
            ArchiveError::io(format!("Failed to create staging file in {}", directory), e)
        })?;

        let written = io::copy(&mut entry, &mut staging)
            .map_err(|e| ArchiveError::io(format!("Failed to extract entry {}", name), e))?;
        staging
            .as_file_mut()
            .sync_all()
            .map_err(|e| ArchiveError::io(format!("Failed to flush staged entry {}", name), e))?;

        Ok((staging, written))
    }
}
