//! A zip archive viewed as an isolated, read-only file system.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use crate::context::Context;
use crate::metadata::Metadata;
use crate::pattern::{compile_glob, Pattern, SEPARATOR};
use crate::result::{Result, VfsError};
use crate::FileSystem;

mod cp437;
mod deflate;
mod plaintext;
pub mod reader_at;
pub mod result;
mod spec;
pub mod zip_archive;
pub mod zip_file;

use self::reader_at::{ReadAt, SeekReaderAt};
use self::result::ZipError;
use self::zip_archive::ZipArchive;
use self::zip_file::{ZipFile, ZipFileData};

/// [`FileSystem`] over the entries of one zip archive.
///
/// Paths are matched literally against the names stored in the archive; a
/// path also matches the directory entry stored as `path/`. There is no
/// `.`/`..` resolution and no case folding.
pub struct ZipFileSystem {
    archive: ZipArchive,
}

impl ZipFileSystem {
    /// Parses the archive in `stream`.
    ///
    /// The stream is measured once by seeking to its end; from then on it is
    /// only touched through serialized positioned reads, including by the
    /// streams [`open`](FileSystem::open) hands out.
    pub fn new<R>(mut stream: R) -> Result<ZipFileSystem>
    where
        R: Read + Seek + Send + 'static,
    {
        let size = stream
            .seek(SeekFrom::End(0))
            .map_err(|e| VfsError::Open(ZipError::Io(e)))?;

        let reader: Arc<dyn ReadAt> = Arc::new(SeekReaderAt::new(stream));
        let archive = ZipArchive::new(reader, size).map_err(VfsError::Open)?;
        if archive.is_empty() {
            return Err(VfsError::EmptyArchive);
        }

        log::debug!("opened zip archive: {} entries, {} bytes", archive.len(), size);
        Ok(ZipFileSystem { archive })
    }

    pub fn open_path(path: impl AsRef<Path>) -> Result<ZipFileSystem> {
        let file = File::open(path).map_err(|e| VfsError::Open(ZipError::Io(e)))?;
        Self::new(file)
    }

    pub fn archive(&self) -> &ZipArchive {
        &self.archive
    }

    /// Number of entries; never zero.
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    /// Stored entry names in listing order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.archive.entries().iter().map(|data| data.file_name.as_str())
    }

    fn find(&self, path: &str) -> Option<&Arc<ZipFileData>> {
        let found = self.archive.find(path);
        if found.is_none() {
            log::trace!("no archive entry for {:?}", path);
        }
        found
    }

    /// Like [`FileSystem::open`], keeping the concrete stream type.
    pub fn open_entry(&self, path: &str) -> Result<ZipFile> {
        let data = self.find(path).ok_or_else(|| VfsError::not_found(path))?;
        log::trace!("opening archive entry {:?}", data.file_name);
        self.archive.by_data(data).map_err(|source| VfsError::Archive {
            path: path.to_string(),
            source,
        })
    }
}

impl FileSystem for ZipFileSystem {
    fn stat(&self, _ctx: &Context, path: &str) -> Result<Metadata> {
        self.find(path)
            .map(|data| data.metadata())
            .ok_or_else(|| VfsError::not_found(path))
    }

    fn open(&self, _ctx: &Context, path: &str) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(self.open_entry(path)?))
    }

    fn glob(&self, _ctx: &Context, pattern: &str) -> Result<Vec<String>> {
        let pattern = compile_glob(pattern);
        let names = self
            .archive
            .entries()
            .iter()
            .filter(|data| glob_candidate(&pattern, &data.file_name))
            .map(|data| data.file_name.clone())
            .collect();
        Ok(names)
    }
}

/// Directory entries are matched without their trailing `/` unless the
/// pattern itself names a directory.
fn glob_candidate(pattern: &Pattern, name: &str) -> bool {
    match name.strip_suffix(SEPARATOR) {
        Some(dir) if !pattern.as_str().ends_with(SEPARATOR) => pattern.matches(dir),
        _ => pattern.matches(name),
    }
}
