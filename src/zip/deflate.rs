use std::io;
use std::io::Read;

use flate2::{Decompress, FlushDecompress, Status};

use crate::zip::plaintext::SectionReader;

const DEFLATE_BUF_SIZE: usize = 32 * 1024;

/// Raw deflate decoder pulling compressed bytes from a [`SectionReader`].
pub struct DeflateReader {
    source: SectionReader,
    decompress: Decompress,
    deflate_buf: Box<[u8]>,
    deflate_size: usize,
    deflate_position: usize,
    eof: bool,
    finished: bool,
}

impl DeflateReader {
    pub fn new(source: SectionReader) -> Self {
        Self {
            source,
            decompress: Decompress::new(false),
            deflate_buf: vec![0u8; DEFLATE_BUF_SIZE].into_boxed_slice(),
            deflate_size: 0,
            deflate_position: 0,
            eof: false,
            finished: false,
        }
    }
}

impl Read for DeflateReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.finished || buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.deflate_position == self.deflate_size && !self.eof {
                self.deflate_size = self.source.read(&mut self.deflate_buf)?;
                self.deflate_position = 0;
                self.eof = self.deflate_size == 0;
            }

            let input = &self.deflate_buf[self.deflate_position..self.deflate_size];
            let flush = if self.eof {
                FlushDecompress::Finish
            } else {
                FlushDecompress::None
            };

            let before_out = self.decompress.total_out();
            let before_in = self.decompress.total_in();
            let status = self
                .decompress
                .decompress(input, buf, flush)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "corrupt deflate stream"))?;
            let read = (self.decompress.total_out() - before_out) as usize;
            let consumed = (self.decompress.total_in() - before_in) as usize;
            self.deflate_position += consumed;

            match status {
                Status::StreamEnd => {
                    self.finished = true;
                    return Ok(read);
                }
                Status::Ok | Status::BufError if read > 0 => return Ok(read),
                Status::Ok | Status::BufError => {
                    let starved = self.deflate_position == self.deflate_size && !self.eof;
                    if consumed == 0 && !starved {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "truncated deflate stream",
                        ));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::reader_at::{ReadAt, SeekReaderAt};
    use flate2::write::DeflateEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};
    use std::sync::Arc;

    fn compress(data: &[u8]) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn reader_over(compressed: Vec<u8>, prefix: usize) -> DeflateReader {
        let mut archive = vec![0x55u8; prefix];
        let end = (prefix + compressed.len()) as u64;
        archive.extend(compressed);
        archive.extend_from_slice(b"trailing bytes");
        let file: Arc<dyn ReadAt> = Arc::new(SeekReaderAt::new(Cursor::new(archive)));
        DeflateReader::new(SectionReader::new(file, prefix as u64, end))
    }

    #[test]
    fn inflates_large_input() {
        let original: Vec<u8> = (0..200_000u32).map(|i| (i % 97) as u8 ^ (i / 1000) as u8).collect();
        let mut reader = reader_over(compress(&original), 17);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, original);
    }

    #[test]
    fn small_output_buffers() {
        let original = b"the quick brown fox jumps over the lazy dog".repeat(40);
        let mut reader = reader_over(compress(&original), 0);
        let mut out = Vec::new();
        let mut buf = [0u8; 3];
        loop {
            let n = reader.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, original);
    }

    #[test]
    fn truncated_stream_fails() {
        let mut compressed = compress(&b"abcdefghij".repeat(500));
        compressed.truncate(compressed.len() / 2);
        let mut reader = reader_over(compressed, 4);
        let mut out = Vec::new();
        assert!(reader.read_to_end(&mut out).is_err());
    }
}
