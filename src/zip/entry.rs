use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::structures::CompressionMethod;
use super::time::now_millis;

/// Where an entry came from, which decides how commit writes it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Read from the central directory and not modified
    Cen,
    /// Created or replaced in this session; content is staged
    New,
    /// Content staged through a file channel, not yet encoded
    FileChannel,
    /// Renamed or re-stamped copy of an unmodified entry; data stays in the
    /// original archive
    Copy,
}

/// Staged content of an updated entry
#[derive(Debug, Clone, Default)]
pub(crate) enum Content {
    #[default]
    None,
    Bytes(Arc<[u8]>),
    File(PathBuf),
}

/// One archive member.
///
/// Names are absolute byte paths (`/dir/file`) with no trailing slash;
/// the directory flag carries what the trailing slash means on disk.
#[derive(Debug, Clone)]
pub struct Entry {
    pub(crate) name: Vec<u8>,
    pub(crate) is_dir: bool,
    pub(crate) kind: EntryKind,
    pub(crate) flag: u16,
    pub(crate) method: CompressionMethod,
    pub(crate) mtime: i64,
    pub(crate) atime: Option<i64>,
    pub(crate) ctime: Option<i64>,
    pub(crate) crc: u32,
    pub(crate) csize: u64,
    pub(crate) size: u64,
    pub(crate) extra: Option<Vec<u8>>,
    pub(crate) comment: Option<Vec<u8>>,
    pub(crate) locoff: u64,
    pub(crate) content: Content,
    /// `content` is already in `method` form and size, csize and crc are final
    pub(crate) encoded: bool,
}

impl Entry {
    /// A fresh, empty entry stamped with the current time
    pub(crate) fn new(name: Vec<u8>, kind: EntryKind, is_dir: bool, method: CompressionMethod) -> Self {
        let now = now_millis();
        Self {
            name,
            is_dir,
            kind,
            flag: 0,
            method,
            mtime: now,
            atime: Some(now),
            ctime: Some(now),
            crc: 0,
            csize: 0,
            size: 0,
            extra: None,
            comment: None,
            locoff: 0,
            content: Content::None,
            encoded: false,
        }
    }

    /// A metadata copy of `self` with a new lifecycle, without staged content
    pub(crate) fn derive(&self, kind: EntryKind) -> Self {
        Self {
            kind,
            content: Content::None,
            encoded: false,
            ..self.clone()
        }
    }

    pub(crate) fn name_bytes(&self) -> &[u8] {
        &self.name
    }

    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn is_directory(&self) -> bool {
        self.is_dir
    }

    pub fn is_regular_file(&self) -> bool {
        !self.is_dir
    }

    pub fn method(&self) -> CompressionMethod {
        self.method
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn compressed_size(&self) -> u64 {
        self.csize
    }

    pub fn crc(&self) -> u32 {
        self.crc
    }

    pub fn extra(&self) -> Option<&[u8]> {
        self.extra.as_deref()
    }

    pub fn comment(&self) -> Option<&[u8]> {
        self.comment.as_deref()
    }

    pub fn last_modified_time(&self) -> SystemTime {
        to_system_time(self.mtime)
    }

    pub fn last_access_time(&self) -> SystemTime {
        to_system_time(self.atime.unwrap_or(self.mtime))
    }

    pub fn creation_time(&self) -> SystemTime {
        to_system_time(self.ctime.unwrap_or(self.mtime))
    }

    pub(crate) fn has_data_descriptor(&self) -> bool {
        self.flag & super::structures::FLAG_DATADESCR != 0
    }
}

pub(crate) fn to_system_time(millis: i64) -> SystemTime {
    let d = Duration::from_millis(millis.unsigned_abs());
    let t = if millis >= 0 {
        UNIX_EPOCH.checked_add(d)
    } else {
        UNIX_EPOCH.checked_sub(d)
    };
    t.unwrap_or(UNIX_EPOCH)
}

pub(crate) fn from_system_time(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
        Err(e) => i64::try_from(e.duration().as_millis()).map_or(i64::MIN, |m| -m),
    }
}
