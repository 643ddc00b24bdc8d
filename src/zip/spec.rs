use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::zip::reader_at::{read_exact_at, ReadAt};
use crate::zip::result::{ZipError, ZipResult};

pub const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;
pub const CENTRAL_DIRECTORY_HEADER_SIGNATURE: u32 = 0x02014b50;
const CENTRAL_DIRECTORY_END_SIGNATURE: u32 = 0x06054b50;
const ZIP64_CENTRAL_DIRECTORY_END_SIGNATURE: u32 = 0x06064b50;
const ZIP64_CENTRAL_DIRECTORY_END_LOCATOR_SIGNATURE: u32 = 0x07064b50;

pub const LOCAL_FILE_HEADER_SIZE: u64 = 30;
pub const CENTRAL_DIRECTORY_HEADER_SIZE: usize = 46;
const CENTRAL_DIRECTORY_END_SIZE: usize = 22;
const ZIP64_CENTRAL_DIRECTORY_END_SIZE: usize = 56;
const ZIP64_CENTRAL_DIRECTORY_END_LOCATOR_SIZE: usize = 20;
const MAX_COMMENT_SIZE: usize = u16::MAX as usize;

pub const ZIP64_BYTES_THR: u64 = u32::MAX as u64;
const ZIP64_ENTRY_THR: u16 = u16::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unsupported(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            v => CompressionMethod::Unsupported(v),
        }
    }
}

pub struct CentralDirectoryEnd {
    pub disk_number: u16,
    pub disk_with_central_directory: u16,
    pub number_of_files_on_this_disk: u16,
    pub number_of_files: u16,
    pub central_directory_size: u32,
    pub central_directory_offset: u32,
    pub zip_file_comment: Vec<u8>,
}

impl CentralDirectoryEnd {
    fn parse(block: &[u8]) -> ZipResult<CentralDirectoryEnd> {
        let mut reader = Cursor::new(block);
        if reader.read_u32::<LittleEndian>()? != CENTRAL_DIRECTORY_END_SIGNATURE {
            return Err(ZipError::InvalidArchive("Invalid digital signature header"));
        }
        let disk_number = reader.read_u16::<LittleEndian>()?;
        let disk_with_central_directory = reader.read_u16::<LittleEndian>()?;
        let number_of_files_on_this_disk = reader.read_u16::<LittleEndian>()?;
        let number_of_files = reader.read_u16::<LittleEndian>()?;
        let central_directory_size = reader.read_u32::<LittleEndian>()?;
        let central_directory_offset = reader.read_u32::<LittleEndian>()?;
        let comment_length = reader.read_u16::<LittleEndian>()? as usize;
        let comment_start = CENTRAL_DIRECTORY_END_SIZE;
        let zip_file_comment = block
            .get(comment_start..comment_start + comment_length)
            .ok_or(ZipError::InvalidArchive("Comment runs past end of archive"))?
            .to_vec();

        Ok(CentralDirectoryEnd {
            disk_number,
            disk_with_central_directory,
            number_of_files_on_this_disk,
            number_of_files,
            central_directory_size,
            central_directory_offset,
            zip_file_comment,
        })
    }

    /// Scans backwards from the end of the archive for the end record.
    /// Returns the record and its absolute position.
    pub fn find_and_parse(reader: &dyn ReadAt, size: u64) -> ZipResult<(CentralDirectoryEnd, u64)> {
        if size < CENTRAL_DIRECTORY_END_SIZE as u64 {
            return Err(ZipError::InvalidArchive("Invalid zip header"));
        }
        let search_len = size.min((CENTRAL_DIRECTORY_END_SIZE + MAX_COMMENT_SIZE) as u64);
        let search_start = size - search_len;
        let mut block = vec![0u8; search_len as usize];
        read_exact_at(reader, &mut block, search_start)?;

        let signature = CENTRAL_DIRECTORY_END_SIGNATURE.to_le_bytes();
        for pos in (0..=block.len() - CENTRAL_DIRECTORY_END_SIZE).rev() {
            if block[pos..pos + 4] != signature {
                continue;
            }
            // A signature-like byte run inside the comment is skipped here.
            if let Ok(footer) = CentralDirectoryEnd::parse(&block[pos..]) {
                return Ok((footer, search_start + pos as u64));
            }
        }

        Err(ZipError::InvalidArchive("Could not find central directory end"))
    }

    pub fn needs_zip64(&self) -> bool {
        self.number_of_files == ZIP64_ENTRY_THR
            || self.number_of_files_on_this_disk == ZIP64_ENTRY_THR
            || self.central_directory_size as u64 == ZIP64_BYTES_THR
            || self.central_directory_offset as u64 == ZIP64_BYTES_THR
    }
}

pub struct Zip64CentralDirectoryEndLocator {
    pub disk_with_central_directory: u32,
    pub end_of_central_directory_offset: u64,
    pub number_of_disks: u32,
}

impl Zip64CentralDirectoryEndLocator {
    /// The locator sits immediately before the end record at `cde_start_pos`.
    pub fn parse(reader: &dyn ReadAt, cde_start_pos: u64) -> ZipResult<Zip64CentralDirectoryEndLocator> {
        let start = cde_start_pos
            .checked_sub(ZIP64_CENTRAL_DIRECTORY_END_LOCATOR_SIZE as u64)
            .ok_or(ZipError::InvalidArchive("Missing zip64 end of central directory locator"))?;
        let mut block = [0u8; ZIP64_CENTRAL_DIRECTORY_END_LOCATOR_SIZE];
        read_exact_at(reader, &mut block, start)?;

        let mut reader = Cursor::new(&block[..]);
        if reader.read_u32::<LittleEndian>()? != ZIP64_CENTRAL_DIRECTORY_END_LOCATOR_SIGNATURE {
            return Err(ZipError::InvalidArchive("Invalid zip64 locator digital signature header"));
        }
        Ok(Zip64CentralDirectoryEndLocator {
            disk_with_central_directory: reader.read_u32::<LittleEndian>()?,
            end_of_central_directory_offset: reader.read_u64::<LittleEndian>()?,
            number_of_disks: reader.read_u32::<LittleEndian>()?,
        })
    }
}

pub struct Zip64CentralDirectoryEnd {
    pub disk_number: u32,
    pub disk_with_central_directory: u32,
    pub number_of_files: u64,
    pub central_directory_size: u64,
    pub central_directory_offset: u64,
}

impl Zip64CentralDirectoryEnd {
    pub fn parse(reader: &dyn ReadAt, offset: u64) -> ZipResult<Zip64CentralDirectoryEnd> {
        let mut block = [0u8; ZIP64_CENTRAL_DIRECTORY_END_SIZE];
        read_exact_at(reader, &mut block, offset)?;

        let mut reader = Cursor::new(&block[..]);
        if reader.read_u32::<LittleEndian>()? != ZIP64_CENTRAL_DIRECTORY_END_SIGNATURE {
            return Err(ZipError::InvalidArchive("Invalid digital signature header"));
        }
        let _record_size = reader.read_u64::<LittleEndian>()?;
        let _version_made_by = reader.read_u16::<LittleEndian>()?;
        let _version_needed_to_extract = reader.read_u16::<LittleEndian>()?;
        let disk_number = reader.read_u32::<LittleEndian>()?;
        let disk_with_central_directory = reader.read_u32::<LittleEndian>()?;
        let _number_of_files_on_this_disk = reader.read_u64::<LittleEndian>()?;
        let number_of_files = reader.read_u64::<LittleEndian>()?;
        let central_directory_size = reader.read_u64::<LittleEndian>()?;
        let central_directory_offset = reader.read_u64::<LittleEndian>()?;

        Ok(Zip64CentralDirectoryEnd {
            disk_number,
            disk_with_central_directory,
            number_of_files,
            central_directory_size,
            central_directory_offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::reader_at::SeekReaderAt;

    fn end_record(comment: &[u8]) -> Vec<u8> {
        let mut record = Vec::new();
        record.extend_from_slice(&CENTRAL_DIRECTORY_END_SIGNATURE.to_le_bytes());
        record.extend_from_slice(&[0, 0, 0, 0]);
        record.extend_from_slice(&3u16.to_le_bytes());
        record.extend_from_slice(&3u16.to_le_bytes());
        record.extend_from_slice(&100u32.to_le_bytes());
        record.extend_from_slice(&12u32.to_le_bytes());
        record.extend_from_slice(&(comment.len() as u16).to_le_bytes());
        record.extend_from_slice(comment);
        record
    }

    #[test]
    fn finds_end_record_behind_comment() {
        let mut data = vec![0xaau8; 112];
        data.extend(end_record(b"built by hand"));
        let reader = SeekReaderAt::new(Cursor::new(data.clone()));

        let (footer, pos) = CentralDirectoryEnd::find_and_parse(&reader, data.len() as u64).unwrap();
        assert_eq!(pos, 112);
        assert_eq!(footer.number_of_files, 3);
        assert_eq!(footer.central_directory_size, 100);
        assert_eq!(footer.central_directory_offset, 12);
        assert_eq!(footer.zip_file_comment, b"built by hand");
        assert!(!footer.needs_zip64());
    }

    #[test]
    fn rejects_data_without_end_record() {
        let data = vec![0u8; 64];
        let reader = SeekReaderAt::new(Cursor::new(data));
        assert!(matches!(
            CentralDirectoryEnd::find_and_parse(&reader, 64),
            Err(ZipError::InvalidArchive(_))
        ));
    }

    #[test]
    fn rejects_tiny_input() {
        let reader = SeekReaderAt::new(Cursor::new(vec![0u8; 4]));
        assert!(CentralDirectoryEnd::find_and_parse(&reader, 4).is_err());
    }

    #[test]
    fn compression_method_codes() {
        assert_eq!(CompressionMethod::from_u16(0), CompressionMethod::Stored);
        assert_eq!(CompressionMethod::from_u16(8), CompressionMethod::Deflate);
        assert_eq!(CompressionMethod::from_u16(14), CompressionMethod::Unsupported(14));
    }
}
