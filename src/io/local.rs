use super::ReadAt;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Local file reader with random access support
///
/// Each read is a seek followed by a read, performed under a lock private to
/// this file so that concurrent entry streams never observe each other's
/// cursor.
pub struct LocalFile {
    file: Mutex<File>,
    size: u64,
}

impl LocalFile {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            size,
        })
    }
}

impl ReadAt for LocalFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read(buf)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    #[test]
    fn test_positioned_reads() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"0123456789").unwrap();
        temp.flush().unwrap();

        let file = LocalFile::open(temp.path()).unwrap();
        assert_eq!(file.size(), 10);

        let mut buf = [0u8; 3];
        file.read_fully_at(7, &mut buf).unwrap();
        assert_eq!(&buf, b"789");
        file.read_fully_at(0, &mut buf).unwrap();
        assert_eq!(&buf, b"012");
    }

    #[test]
    fn test_interleaved_threads() {
        let mut temp = NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
        temp.write_all(&data).unwrap();
        temp.flush().unwrap();

        let file = Arc::new(LocalFile::open(temp.path()).unwrap());
        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let file = Arc::clone(&file);
                let data = data.clone();
                std::thread::spawn(move || {
                    for i in 0..200u64 {
                        let off = (t * 997 + i * 131) % (data.len() as u64 - 16);
                        let mut buf = [0u8; 16];
                        file.read_fully_at(off, &mut buf).unwrap();
                        assert_eq!(&buf[..], &data[off as usize..off as usize + 16]);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
