use std::io;
use std::io::{Cursor, Read};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use byteorder::{LittleEndian, ReadBytesExt};
use chrono::NaiveDate;
use flate2::Crc;

use crate::metadata::{FileType, Metadata};
use crate::zip::cp437::FromCp437;
use crate::zip::deflate::DeflateReader;
use crate::zip::plaintext::SectionReader;
use crate::zip::reader_at::{read_exact_at, ReadAt};
use crate::zip::result::{ZipError, ZipResult};
use crate::zip::spec;
use crate::zip::spec::CompressionMethod;

const CREATOR_FAT: u8 = 0;
const CREATOR_UNIX: u8 = 3;
const CREATOR_NTFS: u8 = 11;
const CREATOR_VFAT: u8 = 14;
const CREATOR_MACOS: u8 = 19;

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;
const S_IFLNK: u32 = 0o120000;

const MSDOS_DIR: u32 = 0x10;
const MSDOS_READ_ONLY: u32 = 0x01;

const ZIP64_EXTRA_ID: u16 = 0x0001;
const NTFS_EXTRA_ID: u16 = 0x000a;
const UNIX_EXTRA_ID: u16 = 0x000d;
const EXTENDED_TIMESTAMP_EXTRA_ID: u16 = 0x5455;
const INFO_ZIP_UNIX_EXTRA_ID: u16 = 0x5855;

// 100ns ticks between 1601-01-01 and 1970-01-01
const NTFS_EPOCH_OFFSET: u64 = 116_444_736_000_000_000;

/// One entry of the central directory, exactly as the archive lists it.
#[derive(Debug)]
pub struct ZipFileData {
    pub file_name: String,
    pub version_made_by: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub external_attributes: u32,
    pub header_start: u64,
    pub modified: Option<SystemTime>,
}

impl ZipFileData {
    pub fn is_dir(&self) -> bool {
        self.file_name.ends_with('/')
    }

    pub fn encrypted(&self) -> bool {
        self.flags & 1 == 1
    }

    /// Unix-style mode bits (file type and permissions) derived from the
    /// creating system's attribute encoding.
    pub fn unix_mode(&self) -> u32 {
        let attrs = self.external_attributes;
        let mut mode = match (self.version_made_by >> 8) as u8 {
            CREATOR_UNIX | CREATOR_MACOS => attrs >> 16,
            CREATOR_FAT | CREATOR_NTFS | CREATOR_VFAT => {
                let perm = if attrs & MSDOS_READ_ONLY != 0 { 0o444 } else { 0o666 };
                if attrs & MSDOS_DIR != 0 {
                    S_IFDIR | perm | 0o111
                } else {
                    perm
                }
            }
            _ => 0,
        };
        if self.is_dir() {
            mode = (mode & !S_IFMT) | S_IFDIR;
        }
        mode
    }

    pub fn metadata(&self) -> Metadata {
        let mode = self.unix_mode();
        let file_type = match mode & S_IFMT {
            S_IFDIR => FileType::Directory,
            S_IFLNK => FileType::Symlink,
            _ => FileType::File,
        };
        let base = self.file_name.trim_end_matches('/');
        let name = base.rsplit('/').next().unwrap_or(base);

        Metadata {
            name: name.to_string(),
            file_type,
            len: self.uncompressed_size,
            permissions: mode & 0o7777,
            modified: self.modified,
        }
    }
}

pub fn central_header_to_zip_file(reader: &mut Cursor<&[u8]>, archive_offset: u64) -> ZipResult<ZipFileData> {
    let signature = reader.read_u32::<LittleEndian>()?;
    if signature != spec::CENTRAL_DIRECTORY_HEADER_SIGNATURE {
        Err(ZipError::InvalidArchive("Invalid Central Directory header"))
    } else {
        central_header_to_zip_file_inner(reader, archive_offset)
    }
}

fn central_header_to_zip_file_inner(reader: &mut Cursor<&[u8]>, archive_offset: u64) -> ZipResult<ZipFileData> {
    let version_made_by = reader.read_u16::<LittleEndian>()?;
    let _version_to_extract = reader.read_u16::<LittleEndian>()?;
    let flags = reader.read_u16::<LittleEndian>()?;
    let is_utf8 = flags & (1 << 11) != 0;
    let compression_method = reader.read_u16::<LittleEndian>()?;
    let last_mod_time = reader.read_u16::<LittleEndian>()?;
    let last_mod_date = reader.read_u16::<LittleEndian>()?;
    let crc32 = reader.read_u32::<LittleEndian>()?;
    let compressed_size = reader.read_u32::<LittleEndian>()?;
    let uncompressed_size = reader.read_u32::<LittleEndian>()?;
    let file_name_length = reader.read_u16::<LittleEndian>()? as usize;
    let extra_field_length = reader.read_u16::<LittleEndian>()? as usize;
    let file_comment_length = reader.read_u16::<LittleEndian>()? as usize;
    let _disk_number = reader.read_u16::<LittleEndian>()?;
    let _internal_file_attributes = reader.read_u16::<LittleEndian>()?;
    let external_attributes = reader.read_u32::<LittleEndian>()?;
    let offset = reader.read_u32::<LittleEndian>()? as u64;
    let mut file_name_raw = vec![0; file_name_length];
    reader.read_exact(&mut file_name_raw)?;
    let mut extra_field = vec![0; extra_field_length];
    reader.read_exact(&mut extra_field)?;
    let mut file_comment_raw = vec![0; file_comment_length];
    reader.read_exact(&mut file_comment_raw)?;

    let file_name = match is_utf8 {
        true => String::from_utf8_lossy(&file_name_raw).into_owned(),
        false => file_name_raw.from_cp437(),
    };

    let mut result = ZipFileData {
        file_name,
        version_made_by,
        flags,
        compression_method: CompressionMethod::from_u16(compression_method),
        crc32,
        compressed_size: compressed_size as u64,
        uncompressed_size: uncompressed_size as u64,
        external_attributes,
        header_start: offset,
        modified: None,
    };

    match parse_extra_field(&mut result, &extra_field) {
        Ok(..) | Err(ZipError::Io(..)) => {}
        Err(e) => return Err(e),
    }

    if result.modified.is_none() {
        result.modified = dos_to_system_time(last_mod_date, last_mod_time);
    }

    // Account for shifted zip offsets.
    result.header_start = result
        .header_start
        .checked_add(archive_offset)
        .ok_or(ZipError::InvalidArchive("Archive header is too large"))?;

    Ok(result)
}

fn parse_extra_field(file: &mut ZipFileData, extra_field: &[u8]) -> ZipResult<()> {
    let mut reader = Cursor::new(extra_field);

    while (reader.position() as usize) + 4 <= extra_field.len() {
        let kind = reader.read_u16::<LittleEndian>()?;
        let len = reader.read_u16::<LittleEndian>()? as u64;
        let field_end = reader.position() + len;
        match kind {
            ZIP64_EXTRA_ID => {
                if file.uncompressed_size == spec::ZIP64_BYTES_THR {
                    file.uncompressed_size = reader.read_u64::<LittleEndian>()?;
                }
                if file.compressed_size == spec::ZIP64_BYTES_THR {
                    file.compressed_size = reader.read_u64::<LittleEndian>()?;
                }
                if file.header_start == spec::ZIP64_BYTES_THR {
                    file.header_start = reader.read_u64::<LittleEndian>()?;
                }
            }
            EXTENDED_TIMESTAMP_EXTRA_ID if len >= 5 => {
                let info = reader.read_u8()?;
                if info & 1 != 0 {
                    let secs = reader.read_u32::<LittleEndian>()?;
                    file.modified = Some(SystemTime::UNIX_EPOCH + Duration::from_secs(secs as u64));
                }
            }
            // Both lead with a 4-byte access time, then the modification time.
            UNIX_EXTRA_ID | INFO_ZIP_UNIX_EXTRA_ID if len >= 8 => {
                let _accessed = reader.read_u32::<LittleEndian>()?;
                let secs = reader.read_u32::<LittleEndian>()?;
                file.modified = Some(SystemTime::UNIX_EPOCH + Duration::from_secs(secs as u64));
            }
            NTFS_EXTRA_ID if len >= 4 => {
                let _reserved = reader.read_u32::<LittleEndian>()?;
                while reader.position() + 4 <= field_end {
                    let tag = reader.read_u16::<LittleEndian>()?;
                    let size = reader.read_u16::<LittleEndian>()? as u64;
                    if tag == 1 && size == 24 {
                        let ticks = reader.read_u64::<LittleEndian>()?;
                        if ticks >= NTFS_EPOCH_OFFSET {
                            let since_epoch = ticks - NTFS_EPOCH_OFFSET;
                            file.modified = Some(
                                SystemTime::UNIX_EPOCH
                                    + Duration::from_secs(since_epoch / 10_000_000)
                                    + Duration::from_nanos(since_epoch % 10_000_000 * 100),
                            );
                        }
                        break;
                    }
                    reader.set_position(reader.position() + size);
                }
            }
            _ => {
                // Other fields are ignored
            }
        }
        reader.set_position(field_end);
    }
    Ok(())
}

/// MS-DOS date and time carry no zone; they are read as UTC.
fn dos_to_system_time(date: u16, time: u16) -> Option<SystemTime> {
    let year = ((date >> 9) & 0x7f) as i32 + 1980;
    let month = ((date >> 5) & 0x0f) as u32;
    let day = (date & 0x1f) as u32;
    let hour = ((time >> 11) & 0x1f) as u32;
    let minute = ((time >> 5) & 0x3f) as u32;
    let second = ((time & 0x1f) * 2) as u32;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    Some(SystemTime::from(naive.and_utc()))
}

/// Reads the local header of `data` and builds a decompressing stream over
/// its content.
pub fn find_reader(file: &Arc<dyn ReadAt>, data: &ZipFileData) -> ZipResult<ZipFileReader> {
    if data.encrypted() {
        return Err(ZipError::Encrypted);
    }
    if let CompressionMethod::Unsupported(method) = data.compression_method {
        return Err(ZipError::UnsupportedCompressionMethod(method));
    }

    let mut header = [0u8; spec::LOCAL_FILE_HEADER_SIZE as usize];
    read_exact_at(file.as_ref(), &mut header, data.header_start)?;
    let mut reader = Cursor::new(&header[..]);
    if reader.read_u32::<LittleEndian>()? != spec::LOCAL_FILE_HEADER_SIGNATURE {
        return Err(ZipError::InvalidArchive("Invalid local file header"));
    }
    reader.set_position(26);
    let file_name_length = reader.read_u16::<LittleEndian>()? as u64;
    let extra_field_length = reader.read_u16::<LittleEndian>()? as u64;

    let data_start = data.header_start + spec::LOCAL_FILE_HEADER_SIZE + file_name_length + extra_field_length;
    let data_end = data_start
        .checked_add(data.compressed_size)
        .ok_or(ZipError::InvalidArchive("Entry data is too large"))?;
    let section = SectionReader::new(file.clone(), data_start, data_end);

    match data.compression_method {
        CompressionMethod::Stored => Ok(ZipFileReader::Stored(section)),
        CompressionMethod::Deflate => Ok(ZipFileReader::Deflate(DeflateReader::new(section))),
        CompressionMethod::Unsupported(method) => Err(ZipError::UnsupportedCompressionMethod(method)),
    }
}

pub enum ZipFileReader {
    Stored(SectionReader),
    Deflate(DeflateReader),
}

impl Read for ZipFileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ZipFileReader::Stored(r) => r.read(buf),
            ZipFileReader::Deflate(r) => r.read(buf),
        }
    }
}

/// Content stream of one entry.
///
/// Each stream keeps its own position and decompression state; only the
/// positioned reads against the archive are shared.
pub struct ZipFile {
    reader: ZipFileReader,
    data: Arc<ZipFileData>,
    crc: Crc,
    read: u64,
}

impl ZipFile {
    pub fn new(reader: ZipFileReader, data: Arc<ZipFileData>) -> Self {
        Self {
            reader,
            data,
            crc: Crc::new(),
            read: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.data.file_name
    }

    pub fn len(&self) -> u64 {
        self.data.uncompressed_size
    }

    pub fn is_empty(&self) -> bool {
        self.data.uncompressed_size == 0
    }

    fn finish(&self) -> io::Result<()> {
        if self.read != self.data.uncompressed_size {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "zip: entry shorter than recorded size"));
        }
        if self.data.crc32 != 0 && self.crc.sum() != self.data.crc32 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "zip: checksum error"));
        }
        Ok(())
    }
}

impl Read for ZipFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = self.reader.read(buf)?;
        if n == 0 {
            self.finish()?;
            return Ok(0);
        }
        self.read += n as u64;
        if self.read > self.data.uncompressed_size {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "zip: entry longer than recorded size"));
        }
        self.crc.update(&buf[..n]);
        Ok(n)
    }
}
