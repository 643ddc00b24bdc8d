use std::io::Cursor;
use std::sync::Arc;

use crate::zip::reader_at::{read_exact_at, ReadAt};
use crate::zip::result::{ZipError, ZipResult};
use crate::zip::spec;
use crate::zip::zip_file::*;

/// Parsed central directory of one archive.
///
/// Entries keep the order in which the central directory lists them and are
/// never changed after parsing.
pub struct ZipArchive {
    file: Arc<dyn ReadAt>,
    entries: Vec<Arc<ZipFileData>>,
    comment: Vec<u8>,
}

impl ZipArchive {
    pub fn new(file: Arc<dyn ReadAt>, size: u64) -> ZipResult<ZipArchive> {
        let (footer, cde_start_pos) = spec::CentralDirectoryEnd::find_and_parse(file.as_ref(), size)?;

        if footer.disk_number != footer.disk_with_central_directory {
            return Err(ZipError::UnsupportedArchive);
        }

        let (archive_offset, directory_start, directory_size, number_of_files) =
            Self::get_directory_counts(file.as_ref(), &footer, cde_start_pos)?;

        let directory_end = directory_start
            .checked_add(directory_size)
            .filter(|end| *end <= size)
            .ok_or(ZipError::InvalidArchive("Invalid central directory size or offset"))?;

        let mut directory = vec![0u8; (directory_end - directory_start) as usize];
        read_exact_at(file.as_ref(), &mut directory, directory_start)?;

        // Each header is at least 46 bytes, which bounds a bogus file count.
        let file_capacity = number_of_files.min(directory.len() / spec::CENTRAL_DIRECTORY_HEADER_SIZE);
        let mut entries = Vec::with_capacity(file_capacity);
        let mut reader = Cursor::new(&directory[..]);

        for _ in 0..number_of_files {
            let data = central_header_to_zip_file(&mut reader, archive_offset)?;
            entries.push(Arc::new(data));
        }

        Ok(ZipArchive {
            file,
            entries,
            comment: footer.zip_file_comment,
        })
    }

    fn get_directory_counts(
        reader: &dyn ReadAt,
        footer: &spec::CentralDirectoryEnd,
        cde_start_pos: u64,
    ) -> ZipResult<(u64, u64, u64, usize)> {
        if !footer.needs_zip64() {
            let archive_offset = cde_start_pos
                .checked_sub(footer.central_directory_size as u64)
                .and_then(|x| x.checked_sub(footer.central_directory_offset as u64))
                .ok_or(ZipError::InvalidArchive("Invalid central directory size or offset"))?;

            let directory_start = footer.central_directory_offset as u64 + archive_offset;
            return Ok((
                archive_offset,
                directory_start,
                footer.central_directory_size as u64,
                footer.number_of_files as usize,
            ));
        }

        let locator64 = spec::Zip64CentralDirectoryEndLocator::parse(reader, cde_start_pos)?;
        if locator64.number_of_disks > 1 || footer.disk_number as u32 != locator64.disk_with_central_directory {
            return Err(ZipError::UnsupportedArchive);
        }

        let footer64 = spec::Zip64CentralDirectoryEnd::parse(reader, locator64.end_of_central_directory_offset)?;
        if footer64.disk_number != footer64.disk_with_central_directory {
            return Err(ZipError::UnsupportedArchive);
        }

        let number_of_files = usize::try_from(footer64.number_of_files)
            .map_err(|_| ZipError::InvalidArchive("Too many files in archive"))?;

        Ok((
            0,
            footer64.central_directory_offset,
            footer64.central_directory_size,
            number_of_files,
        ))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Archive comment from the end of central directory record.
    pub fn comment(&self) -> &[u8] {
        &self.comment
    }

    pub fn entries(&self) -> &[Arc<ZipFileData>] {
        &self.entries
    }

    /// First entry named `name` or, failing that, `name/`.
    pub fn find(&self, name: &str) -> Option<&Arc<ZipFileData>> {
        self.entries.iter().find(|data| {
            data.file_name == name
                || (data.file_name.len() == name.len() + 1
                    && data.file_name.starts_with(name)
                    && data.file_name.ends_with('/'))
        })
    }

    pub fn by_name(&self, name: &str) -> ZipResult<ZipFile> {
        let data = self.find(name).ok_or(ZipError::FileNotFound)?;
        self.by_data(data)
    }

    /// Opens a fresh content stream for an entry of this archive.
    pub fn by_data(&self, data: &Arc<ZipFileData>) -> ZipResult<ZipFile> {
        let reader = find_reader(&self.file, data)?;
        Ok(ZipFile::new(reader, data.clone()))
    }
}
