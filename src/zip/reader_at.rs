use std::io;
use std::io::{Read, Seek, SeekFrom};

use parking_lot::Mutex;

/// Positioned reads that may be issued from several threads at once.
pub trait ReadAt: Send + Sync {
    /// Reads up to `buf.len()` bytes starting at `offset`.
    ///
    /// A short count is not an error; callers needing the full buffer use
    /// [`read_exact_at`].
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
}

/// Turns a single seek-then-read stream into a [`ReadAt`].
///
/// Every call takes the lock for exactly one seek and one read, so reads
/// against the wrapped stream never interleave.
pub struct SeekReaderAt<R> {
    inner: Mutex<R>,
}

impl<R: Read + Seek + Send> SeekReaderAt<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }
}

impl<R: Read + Seek + Send> ReadAt for SeekReaderAt<R> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let mut stream = self.inner.lock();
        stream.seek(SeekFrom::Start(offset))?;
        stream.read(buf)
    }
}

/// Fills `buf` from `offset`, issuing as many positioned reads as needed.
pub fn read_exact_at(reader: &dyn ReadAt, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    while !buf.is_empty() {
        match reader.read_at(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ))
            }
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Returns at most `chunk` bytes per read to exercise short reads.
    struct Trickle {
        inner: Cursor<Vec<u8>>,
        chunk: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let limit = buf.len().min(self.chunk);
            self.inner.read(&mut buf[..limit])
        }
    }

    impl Seek for Trickle {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    struct FailingSeek;

    impl Read for FailingSeek {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
    }

    impl Seek for FailingSeek {
        fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
            Err(io::Error::new(io::ErrorKind::Other, "seek refused"))
        }
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[test]
    fn reads_at_offset() {
        let reader = SeekReaderAt::new(Cursor::new(b"hello world".to_vec()));
        let mut buf = [0u8; 5];
        assert_eq!(reader.read_at(&mut buf, 6).unwrap(), 5);
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn read_past_end_returns_zero() {
        let reader = SeekReaderAt::new(Cursor::new(b"abc".to_vec()));
        let mut buf = [0u8; 4];
        assert_eq!(reader.read_at(&mut buf, 10).unwrap(), 0);
    }

    #[test]
    fn seek_failure_propagates_and_releases_lock() {
        let reader = SeekReaderAt::new(FailingSeek);
        let mut buf = [0u8; 1];
        let err = reader.read_at(&mut buf, 0).unwrap_err();
        assert_eq!(err.to_string(), "seek refused");
        // A leaked lock would deadlock here.
        assert!(reader.read_at(&mut buf, 0).is_err());
    }

    #[test]
    fn read_exact_at_spans_short_reads() {
        let data = pattern(100);
        let reader = SeekReaderAt::new(Trickle {
            inner: Cursor::new(data.clone()),
            chunk: 7,
        });
        let mut buf = vec![0u8; 40];
        read_exact_at(&reader, &mut buf, 30).unwrap();
        assert_eq!(buf, &data[30..70]);
    }

    #[test]
    fn read_exact_at_reports_eof() {
        let reader = SeekReaderAt::new(Cursor::new(vec![1u8; 8]));
        let mut buf = [0u8; 16];
        let err = read_exact_at(&reader, &mut buf, 0).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn concurrent_reads_match_sequential() {
        let data = pattern(64 * 1024);
        let reader = SeekReaderAt::new(Trickle {
            inner: Cursor::new(data.clone()),
            chunk: 13,
        });

        std::thread::scope(|scope| {
            for t in 0..8u64 {
                let reader = &reader;
                let data = &data;
                scope.spawn(move || {
                    for i in 0..200u64 {
                        let offset = (t * 7919 + i * 257) % (data.len() as u64 - 64);
                        let mut buf = [0u8; 64];
                        read_exact_at(reader, &mut buf, offset).unwrap();
                        let start = offset as usize;
                        assert_eq!(&buf[..], &data[start..start + 64]);
                    }
                });
            }
        });
    }
}
