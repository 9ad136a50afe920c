#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zipfs::{Config, ZipFileSystem};

/// A scratch directory holding one archive path.
pub struct Scratch {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl Scratch {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.zip");
        Self { dir, path }
    }

    pub fn create(&self) -> ZipFileSystem {
        ZipFileSystem::open(&self.path, Config::new().create(true)).unwrap()
    }

    pub fn open(&self) -> ZipFileSystem {
        ZipFileSystem::open(&self.path, Config::new()).unwrap()
    }

    pub fn open_with(&self, config: Config) -> ZipFileSystem {
        ZipFileSystem::open(&self.path, config).unwrap()
    }

    /// Names of the files in the scratch directory other than the archive
    pub fn strays(&self) -> Vec<String> {
        list_dir(self.dir.path())
            .into_iter()
            .filter(|n| n != "test.zip")
            .collect()
    }
}

pub fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Build a STORED archive by hand, preceded by `stub`.
///
/// Names ending in `/` are directories. Local offsets are relative to the
/// end of the stub, as when an archive is appended to another file.
pub fn raw_zip(stub: &[u8], entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = stub.to_vec();
    let mut cen = Vec::new();
    let base = stub.len();

    for (name, data) in entries {
        let locoff = (out.len() - base) as u32;
        let crc = crc32fast::hash(data);
        let size = data.len() as u32;

        out.extend_from_slice(b"PK\x03\x04");
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0x0021u16.to_le_bytes());
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(data);

        cen.extend_from_slice(b"PK\x01\x02");
        cen.extend_from_slice(&20u16.to_le_bytes());
        cen.extend_from_slice(&20u16.to_le_bytes());
        cen.extend_from_slice(&0u16.to_le_bytes());
        cen.extend_from_slice(&0u16.to_le_bytes());
        cen.extend_from_slice(&0u16.to_le_bytes());
        cen.extend_from_slice(&0x0021u16.to_le_bytes());
        cen.extend_from_slice(&crc.to_le_bytes());
        cen.extend_from_slice(&size.to_le_bytes());
        cen.extend_from_slice(&size.to_le_bytes());
        cen.extend_from_slice(&(name.len() as u16).to_le_bytes());
        cen.extend_from_slice(&0u16.to_le_bytes());
        cen.extend_from_slice(&0u16.to_le_bytes());
        cen.extend_from_slice(&0u16.to_le_bytes());
        cen.extend_from_slice(&0u16.to_le_bytes());
        cen.extend_from_slice(&0u32.to_le_bytes());
        cen.extend_from_slice(&locoff.to_le_bytes());
        cen.extend_from_slice(name.as_bytes());
    }

    let cenoff = (out.len() - base) as u32;
    out.extend_from_slice(&cen);
    out.extend_from_slice(b"PK\x05\x06");
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    out.extend_from_slice(&(cen.len() as u32).to_le_bytes());
    out.extend_from_slice(&cenoff.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out
}

pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
