use std::io;
use std::io::Read;
use std::sync::Arc;

use crate::zip::reader_at::ReadAt;

/// Sequential reader over the byte range `start..end` of the shared archive.
pub struct SectionReader {
    file: Arc<dyn ReadAt>,
    start: u64,
    end: u64,
    position: u64,
}

impl SectionReader {
    pub fn new(file: Arc<dyn ReadAt>, start: u64, end: u64) -> Self {
        Self {
            file,
            start,
            end,
            position: 0,
        }
    }

    fn remaining(&self) -> u64 {
        (self.end - self.start).saturating_sub(self.position)
    }
}

impl Read for SectionReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.remaining();
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let limit = remaining.min(buf.len() as u64) as usize;
        let size = self.file.read_at(&mut buf[..limit], self.start + self.position)?;
        if size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "zip: entry data runs past end of archive",
            ));
        }

        self.position += size as u64;

        Ok(size)
    }
}
