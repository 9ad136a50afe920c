//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If a ZIP64 locator precedes it, prefer the ZIP64 EOCD values
//! 3. Read the Central Directory and validate every header in it
//! 4. Decode individual entries lazily from the retained directory bytes
//!
//! Only the directory bytes are kept in memory; entry data is always read
//! through positioned reads against the source.

use byteorder::{ByteOrder, LittleEndian};
use std::sync::Arc;

use crate::config::TimePolicy;
use crate::error::{Result, ZipFsError};
use crate::io::ReadAt;

use super::entry::{Entry, EntryKind};
use super::structures::*;
use super::time::{dos_to_millis, unix_to_millis, win_to_millis};

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Byte offsets of the fixed Central Directory File Header fields
mod cen {
    pub const FLG: usize = 8;
    pub const HOW: usize = 10;
    pub const TIM: usize = 12;
    pub const CRC: usize = 16;
    pub const SIZ: usize = 20;
    pub const LEN: usize = 24;
    pub const NAM: usize = 28;
    pub const EXT: usize = 30;
    pub const COM: usize = 32;
    pub const OFF: usize = 42;
}

fn sh(buf: &[u8], off: usize) -> u16 {
    LittleEndian::read_u16(&buf[off..])
}

fn lg(buf: &[u8], off: usize) -> u32 {
    LittleEndian::read_u32(&buf[off..])
}

fn ll(buf: &[u8], off: usize) -> u64 {
    LittleEndian::read_u64(&buf[off..])
}

/// Location of one header in the retained central directory
#[derive(Debug, Clone)]
pub struct CenName {
    /// Absolute name: leading `/` added, trailing `/` removed
    pub name: Vec<u8>,
    pub is_dir: bool,
    /// Offset of the header within the central directory bytes
    pub pos: usize,
}

/// Low-level ZIP file parser.
///
/// This struct handles reading and parsing ZIP structures from
/// a data source shared with the entry streams.
///
/// ## Example
///
/// ```ignore
/// let parser = ZipParser::new(reader);
/// let end = parser.find_end()?;
/// let (cen, locpos) = parser.read_central_directory(&end)?;
/// for n in ZipParser::scan_central_directory(&cen)? {
///     let entry = parser.read_entry(&cen, n.pos, &n.name, n.is_dir, locpos, TimePolicy::CentralOnly)?;
/// }
/// ```
pub struct ZipParser {
    /// The underlying data source
    reader: Arc<dyn ReadAt>,
    /// Total size of the archive in bytes
    size: u64,
}

impl ZipParser {
    pub fn new(reader: Arc<dyn ReadAt>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Searches backwards from the end of the file through at most a
    /// maximum-length comment. A signature only counts if its comment
    /// length field reaches exactly to the end of the file. When a valid
    /// ZIP64 locator and record precede the EOCD, their values are used.
    ///
    /// # Errors
    ///
    /// Returns a format error if no valid EOCD can be found, indicating
    /// the file is not a valid ZIP archive.
    pub fn find_end(&self) -> Result<End> {
        if self.size < EndOfCentralDirectory::SIZE as u64 {
            return Err(ZipFsError::format("zip END header not found"));
        }

        // Optimization: First try the simple case where there's no comment.
        let offset = self.size - EndOfCentralDirectory::SIZE as u64;
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        self.read_exact_at(offset, &mut buf)?;
        if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
            let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
            return self.resolve_zip64(eocd, offset, None);
        }

        // EOCD not at expected location - the archive carries a comment.
        let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.read_exact_at(search_start, &mut buf)?;

        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
                continue;
            }
            let comment_len = sh(&buf, i + 20) as usize;
            if i + EndOfCentralDirectory::SIZE + comment_len == buf.len() {
                let eocd =
                    EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE])?;
                let comment = buf[i + EndOfCentralDirectory::SIZE..].to_vec();
                return self.resolve_zip64(eocd, search_start + i as u64, Some(comment));
            }
        }

        Err(ZipFsError::format("zip END header not found"))
    }

    /// Merge the legacy EOCD with a ZIP64 EOCD if one is present and agrees
    /// with every legacy field that is not a sentinel.
    fn resolve_zip64(
        &self,
        eocd: EndOfCentralDirectory,
        endpos: u64,
        comment: Option<Vec<u8>>,
    ) -> Result<End> {
        let mut end = End {
            centot: eocd.total_entries as u64,
            cenlen: eocd.cd_size as u64,
            cenoff: eocd.cd_offset as u64,
            endpos,
            comment: comment.filter(|c| !c.is_empty()),
        };

        if endpos < Zip64EOCDLocator::SIZE as u64 {
            return Ok(end);
        }
        let mut loc = vec![0u8; Zip64EOCDLocator::SIZE];
        let n = self
            .reader
            .read_fully_at(endpos - Zip64EOCDLocator::SIZE as u64, &mut loc)?;
        if n != loc.len() || &loc[0..4] != Zip64EOCDLocator::SIGNATURE {
            return Ok(end);
        }
        let locator = Zip64EOCDLocator::from_bytes(&loc)?;

        let mut rec = vec![0u8; Zip64EOCD::MIN_SIZE];
        let n = self.reader.read_fully_at(locator.eocd64_offset, &mut rec)?;
        if n != rec.len() || &rec[0..4] != Zip64EOCD::SIGNATURE {
            return Ok(end);
        }
        let eocd64 = Zip64EOCD::from_bytes(&rec)?;

        if eocd64.cd_size != end.cenlen && end.cenlen != ZIP64_MINVAL
            || eocd64.cd_offset != end.cenoff && end.cenoff != ZIP64_MINVAL
            || eocd64.total_entries != end.centot && end.centot != ZIP64_MINVAL32
        {
            return Ok(end);
        }

        end.cenlen = eocd64.cd_size;
        end.cenoff = eocd64.cd_offset;
        end.centot = eocd64.total_entries;
        end.endpos = locator.eocd64_offset;
        Ok(end)
    }

    /// Read the whole Central Directory.
    ///
    /// The directory is located relative to the trailer position rather
    /// than trusting the recorded offset, so archives with a prefix stub
    /// still open. Returns the directory bytes and the position of the
    /// first local header (`locpos`), which every recorded local offset is
    /// relative to.
    pub fn read_central_directory(&self, end: &End) -> Result<(Vec<u8>, u64)> {
        if end.endpos == 0 {
            // only the END header is present
            return Ok((Vec::new(), 0));
        }
        if end.cenlen > end.endpos {
            return Err(ZipFsError::format(
                "invalid END header (bad central directory size)",
            ));
        }
        let cenpos = end.endpos - end.cenlen;
        let locpos = cenpos.checked_sub(end.cenoff).ok_or_else(|| {
            ZipFsError::format("invalid END header (bad central directory offset)")
        })?;

        let len = usize::try_from(end.cenlen)
            .map_err(|_| ZipFsError::format("central directory too large"))?;
        let mut cen = vec![0u8; len];
        if self.reader.read_fully_at(cenpos, &mut cen)? != len {
            return Err(ZipFsError::format("read CEN tables failed"));
        }
        Ok((cen, locpos))
    }

    /// Validate every header in the directory and list entry names.
    ///
    /// Rejects bad signatures, encrypted entries, compression methods other
    /// than STORED and DEFLATE, and headers overrunning the directory.
    pub fn scan_central_directory(cen: &[u8]) -> Result<Vec<CenName>> {
        let limit = cen.len();
        let mut names = Vec::new();
        let mut pos = 0usize;

        while pos < limit {
            if pos + CDFH_MIN_SIZE > limit || &cen[pos..pos + 4] != CDFH_SIGNATURE {
                return Err(ZipFsError::format("invalid CEN header (bad signature)"));
            }
            let method = sh(cen, pos + cen::HOW);
            let nlen = sh(cen, pos + cen::NAM) as usize;
            let elen = sh(cen, pos + cen::EXT) as usize;
            let clen = sh(cen, pos + cen::COM) as usize;
            if sh(cen, pos + cen::FLG) & FLAG_ENCRYPTED != 0 {
                return Err(ZipFsError::format("invalid CEN header (encrypted entry)"));
            }
            if let CompressionMethod::Unknown(m) = CompressionMethod::from_u16(method) {
                return Err(ZipFsError::Format(format!(
                    "invalid CEN header (unsupported compression method: {m})"
                )));
            }
            if pos + CDFH_MIN_SIZE + nlen > limit {
                return Err(ZipFsError::format("invalid CEN header (bad header size)"));
            }

            let raw = &cen[pos + CDFH_MIN_SIZE..pos + CDFH_MIN_SIZE + nlen];
            let (raw, is_dir) = match raw.split_last() {
                Some((b'/', rest)) => (rest, true),
                _ => (raw, false),
            };
            let name = if raw.first() == Some(&b'/') {
                raw.to_vec()
            } else {
                let mut name = Vec::with_capacity(raw.len() + 1);
                name.push(b'/');
                name.extend_from_slice(raw);
                name
            };
            names.push(CenName { name, is_dir, pos });

            pos += CDFH_MIN_SIZE + nlen + elen + clen;
        }
        if pos != limit {
            return Err(ZipFsError::format("invalid CEN header (bad header size)"));
        }

        Ok(names)
    }

    /// Decode one Central Directory File Header into an [`Entry`].
    ///
    /// The extra field is consumed here: ZIP64 sizes and offset are
    /// applied first, then an extended timestamp block, then an NTFS block
    /// (which wins when both are present). Unrecognised blocks are kept
    /// verbatim on the entry.
    pub fn read_entry(
        &self,
        cen: &[u8],
        pos: usize,
        name: &[u8],
        is_dir: bool,
        locpos: u64,
        policy: TimePolicy,
    ) -> Result<Entry> {
        if pos + CDFH_MIN_SIZE > cen.len() || &cen[pos..pos + 4] != CDFH_SIGNATURE {
            return Err(ZipFsError::format("invalid CEN header (bad signature)"));
        }
        let nlen = sh(cen, pos + cen::NAM) as usize;
        let elen = sh(cen, pos + cen::EXT) as usize;
        let clen = sh(cen, pos + cen::COM) as usize;

        let mut entry = Entry {
            name: name.to_vec(),
            is_dir,
            kind: EntryKind::Cen,
            flag: sh(cen, pos + cen::FLG),
            method: CompressionMethod::from_u16(sh(cen, pos + cen::HOW)),
            mtime: dos_to_millis(lg(cen, pos + cen::TIM)),
            atime: None,
            ctime: None,
            crc: lg(cen, pos + cen::CRC),
            csize: lg(cen, pos + cen::SIZ) as u64,
            size: lg(cen, pos + cen::LEN) as u64,
            extra: None,
            comment: None,
            locoff: lg(cen, pos + cen::OFF) as u64,
            content: Default::default(),
            encoded: false,
        };

        let mut off = pos + CDFH_MIN_SIZE + nlen;
        if off + elen + clen > cen.len() {
            return Err(ZipFsError::format("invalid CEN header (bad header size)"));
        }
        if elen > 0 {
            self.read_extra(&mut entry, &cen[off..off + elen], locpos, policy)?;
            off += elen;
        }
        if clen > 0 {
            entry.comment = Some(cen[off..off + clen].to_vec());
        }
        Ok(entry)
    }

    fn read_extra(
        &self,
        entry: &mut Entry,
        extra: &[u8],
        locpos: u64,
        policy: TimePolicy,
    ) -> Result<()> {
        // (tag, start of data, end of data)
        let mut blocks = Vec::new();
        let mut off = 0usize;
        while off + 4 <= extra.len() {
            let tag = sh(extra, off);
            let sz = sh(extra, off + 2) as usize;
            if off + 4 + sz > extra.len() {
                break;
            }
            blocks.push((tag, off + 4, off + 4 + sz));
            off += 4 + sz;
        }

        for &(_, start, end) in blocks.iter().filter(|b| b.0 == EXTID_ZIP64) {
            let mut pos = start;
            if entry.size == ZIP64_MINVAL && pos + 8 <= end {
                entry.size = ll(extra, pos);
                pos += 8;
            }
            if entry.csize == ZIP64_MINVAL && pos + 8 <= end {
                entry.csize = ll(extra, pos);
                pos += 8;
            }
            if entry.locoff == ZIP64_MINVAL && pos + 8 <= end {
                entry.locoff = ll(extra, pos);
            }
        }

        for &(_, start, end) in blocks.iter().filter(|b| b.0 == EXTID_EXTT) {
            match policy {
                TimePolicy::CentralOnly => {
                    if end - start == 5 {
                        entry.mtime = unix_to_millis(lg(extra, start + 1) as i32);
                    }
                }
                TimePolicy::LocalExtended => self.read_local_timestamps(entry, locpos)?,
            }
        }

        for &(_, start, end) in blocks.iter().filter(|b| b.0 == EXTID_NTFS) {
            if end - start < 32 {
                continue;
            }
            let pos = start + 4; // reserved
            if sh(extra, pos) != 0x0001 || sh(extra, pos + 2) != 24 {
                continue;
            }
            entry.mtime = win_to_millis(ll(extra, pos + 4));
            entry.atime = Some(win_to_millis(ll(extra, pos + 12)));
            entry.ctime = Some(win_to_millis(ll(extra, pos + 20)));
        }

        let mut kept = Vec::new();
        for &(tag, start, end) in &blocks {
            if tag != EXTID_ZIP64 && tag != EXTID_NTFS && tag != EXTID_EXTT {
                kept.extend_from_slice(&extra[start - 4..end]);
            }
        }
        entry.extra = (!kept.is_empty()).then_some(kept);
        Ok(())
    }

    /// The central extended timestamp block only carries the modification
    /// time; access and creation times live in the local header's copy.
    fn read_local_timestamps(&self, entry: &mut Entry, locpos: u64) -> Result<()> {
        let loc_at = locpos + entry.locoff;
        let header = self.read_local_header(loc_at)?;
        if header.extra_len < 9 {
            return Ok(());
        }
        let mut buf = vec![0u8; header.extra_len as usize];
        let at = loc_at + LFH_SIZE as u64 + header.name_len as u64;
        if self.reader.read_fully_at(at, &mut buf)? != buf.len() {
            return Err(ZipFsError::format("loc extra: reading failed"));
        }

        let mut pos = 0usize;
        while pos + 4 <= buf.len() {
            let tag = sh(&buf, pos);
            let sz = sh(&buf, pos + 2) as usize;
            pos += 4;
            if tag != EXTID_EXTT {
                pos += sz;
                continue;
            }
            let end = (pos + sz).min(buf.len());
            if pos >= end {
                break;
            }
            let flag = buf[pos];
            pos += 1;
            if flag & 0x1 != 0 && pos + 4 <= end {
                entry.mtime = unix_to_millis(lg(&buf, pos) as i32);
                pos += 4;
            }
            if flag & 0x2 != 0 && pos + 4 <= end {
                entry.atime = Some(unix_to_millis(lg(&buf, pos) as i32));
                pos += 4;
            }
            if flag & 0x4 != 0 && pos + 4 <= end {
                entry.ctime = Some(unix_to_millis(lg(&buf, pos) as i32));
            }
            break;
        }
        Ok(())
    }

    /// Read and validate the fixed part of a Local File Header.
    pub fn read_local_header(&self, pos: u64) -> Result<LocalFileHeader> {
        let mut buf = [0u8; LFH_SIZE];
        if self.reader.read_fully_at(pos, &mut buf)? != LFH_SIZE {
            return Err(ZipFsError::Format(format!("invalid loc {pos} for entry reading")));
        }
        LocalFileHeader::from_bytes(&buf)
    }

    /// Get the actual data offset for an entry whose local header starts
    /// at absolute position `loc_at`.
    ///
    /// The Local File Header has variable-length fields (filename,
    /// extra field) that may differ from the Central Directory entry.
    pub fn data_offset(&self, loc_at: u64) -> Result<u64> {
        let header = self.read_local_header(loc_at)?;
        Ok(loc_at + header.header_len())
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if self.reader.read_fully_at(offset, buf)? != buf.len() {
            return Err(ZipFsError::format("zip END header not found"));
        }
        Ok(())
    }

    /// Get a reference to the underlying reader.
    pub fn reader(&self) -> &Arc<dyn ReadAt> {
        &self.reader
    }
}
