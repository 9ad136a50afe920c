//! Encoding of local headers, central headers and data descriptors.
//!
//! Each function returns the number of bytes written so the caller can
//! track offsets without querying the sink.

use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;

use crate::config::ExtraTimeFormat;
use crate::error::{Result, ZipFsError};

use super::entry::Entry;
use super::structures::*;
use super::time::{millis_to_dos, millis_to_unix, millis_to_win};

/// Size of an NTFS timestamp block including its 4-byte header
const NTFS_BLOCK_LEN: usize = 36;

/// Size of a central extended timestamp block (mtime only)
const EXTT_CEN_BLOCK_LEN: usize = 9;

/// Name as stored on disk: no leading slash, trailing slash for directories
fn stored_name(e: &Entry) -> Result<Vec<u8>> {
    let name = e.name.strip_prefix(b"/").unwrap_or(&e.name);
    let mut zname = Vec::with_capacity(name.len() + 1);
    zname.extend_from_slice(name);
    if e.is_dir {
        zname.push(b'/');
    }
    if zname.len() > 0xFFFF {
        return Err(ZipFsError::InvalidPath(format!(
            "{}: name too long",
            String::from_utf8_lossy(&e.name)
        )));
    }
    Ok(zname)
}

/// True if the retained extra field already has a timestamp block
fn has_time_block(extra: &[u8]) -> bool {
    let mut off = 0;
    while off + 4 <= extra.len() {
        let tag = u16::from_le_bytes([extra[off], extra[off + 1]]);
        let sz = u16::from_le_bytes([extra[off + 2], extra[off + 3]]) as usize;
        if tag == EXTID_NTFS || tag == EXTID_EXTT {
            return true;
        }
        off += 4 + sz;
    }
    false
}

fn extra_len(total: usize) -> Result<u16> {
    u16::try_from(total).map_err(|_| ZipFsError::format("extra field too long"))
}

fn write_ntfs<W: Write>(w: &mut W, e: &Entry) -> Result<()> {
    w.write_u16::<LittleEndian>(EXTID_NTFS)?;
    w.write_u16::<LittleEndian>(32)?;
    w.write_u32::<LittleEndian>(0)?; // reserved
    w.write_u16::<LittleEndian>(0x0001)?; // attribute tag
    w.write_u16::<LittleEndian>(24)?;
    w.write_u64::<LittleEndian>(millis_to_win(e.mtime))?;
    w.write_u64::<LittleEndian>(millis_to_win(e.atime.unwrap_or(e.mtime)))?;
    w.write_u64::<LittleEndian>(millis_to_win(e.ctime.unwrap_or(e.mtime)))?;
    Ok(())
}

/// Flags and seconds of the extended timestamp block.
///
/// `None` when the modification time is outside the block's signed 32-bit
/// range; the entry then relies on its DOS time. Access and creation times
/// out of range are left out of the block.
fn extt_times(e: &Entry) -> Option<(u8, Vec<i32>)> {
    let mut flags = 0x1;
    let mut times = vec![millis_to_unix(e.mtime)?];
    if let Some(t) = e.atime.and_then(millis_to_unix) {
        flags |= 0x2;
        times.push(t);
    }
    if let Some(t) = e.ctime.and_then(millis_to_unix) {
        flags |= 0x4;
        times.push(t);
    }
    Some((flags, times))
}

/// Write a Central Directory File Header for `e`.
///
/// # Arguments
///
/// * `e` - The entry; `locoff` must already hold its final local offset
/// * `w` - Output sink
/// * `fmt` - Timestamp block to add when the entry's extra has none
///
/// # Returns
///
/// The number of bytes written.
pub fn write_cen<W: Write>(e: &Entry, w: &mut W, fmt: ExtraTimeFormat) -> Result<u64> {
    let version0 = e.method.version()?;
    let zname = stored_name(e)?;
    let extra = e.extra.as_deref().unwrap_or(&[]);
    let comment = e.comment.as_deref().unwrap_or(&[]);
    let comment = &comment[..comment.len().min(0xFFFF)];

    let mut csize0 = e.csize;
    let mut size0 = e.size;
    let mut locoff0 = e.locoff;
    let mut elen64 = 0usize;
    if e.size >= ZIP64_MINVAL {
        size0 = ZIP64_MINVAL;
        elen64 += 8;
    }
    if e.csize >= ZIP64_MINVAL {
        csize0 = ZIP64_MINVAL;
        elen64 += 8;
    }
    if e.locoff >= ZIP64_MINVAL {
        locoff0 = ZIP64_MINVAL;
        elen64 += 8;
    }
    if elen64 != 0 {
        elen64 += 4;
    }

    let extt = match fmt {
        ExtraTimeFormat::Unix if !has_time_block(extra) => extt_times(e),
        _ => None,
    };
    let elen_ntfs = match fmt {
        ExtraTimeFormat::Ntfs if !has_time_block(extra) => NTFS_BLOCK_LEN,
        _ => 0,
    };
    let elen_extt = if extt.is_some() { EXTT_CEN_BLOCK_LEN } else { 0 };
    let elen = extra_len(extra.len() + elen64 + elen_ntfs + elen_extt)?;
    let version = if elen64 != 0 { 45 } else { version0 };

    w.write_all(CDFH_SIGNATURE)?;
    w.write_u16::<LittleEndian>(version)?; // version made by
    w.write_u16::<LittleEndian>(version)?; // version needed to extract
    w.write_u16::<LittleEndian>(e.flag)?;
    w.write_u16::<LittleEndian>(e.method.as_u16())?;
    w.write_u32::<LittleEndian>(millis_to_dos(e.mtime))?;
    w.write_u32::<LittleEndian>(e.crc)?;
    w.write_u32::<LittleEndian>(csize0 as u32)?;
    w.write_u32::<LittleEndian>(size0 as u32)?;
    w.write_u16::<LittleEndian>(zname.len() as u16)?;
    w.write_u16::<LittleEndian>(elen)?;
    w.write_u16::<LittleEndian>(comment.len() as u16)?;
    w.write_u16::<LittleEndian>(0)?; // starting disk number
    w.write_u16::<LittleEndian>(0)?; // internal file attributes
    w.write_u32::<LittleEndian>(0)?; // external file attributes
    w.write_u32::<LittleEndian>(locoff0 as u32)?;
    w.write_all(&zname)?;

    if elen64 != 0 {
        w.write_u16::<LittleEndian>(EXTID_ZIP64)?;
        w.write_u16::<LittleEndian>((elen64 - 4) as u16)?;
        if size0 == ZIP64_MINVAL {
            w.write_u64::<LittleEndian>(e.size)?;
        }
        if csize0 == ZIP64_MINVAL {
            w.write_u64::<LittleEndian>(e.csize)?;
        }
        if locoff0 == ZIP64_MINVAL {
            w.write_u64::<LittleEndian>(e.locoff)?;
        }
    }
    if elen_ntfs != 0 {
        write_ntfs(w, e)?;
    }
    if let Some((flags, times)) = &extt {
        // the local header says which times are present; only mtime follows
        w.write_u16::<LittleEndian>(EXTID_EXTT)?;
        w.write_u16::<LittleEndian>(5)?;
        w.write_u8(*flags)?;
        w.write_i32::<LittleEndian>(times[0])?;
    }
    w.write_all(extra)?;
    w.write_all(comment)?;

    Ok((CDFH_MIN_SIZE + zname.len() + elen as usize + comment.len()) as u64)
}

/// Write a Local File Header for `e`.
///
/// Entries flagged with a data descriptor carry zero CRC and sizes here;
/// the real values follow the data (see [`write_ext`]).
pub fn write_loc<W: Write>(e: &Entry, w: &mut W, fmt: ExtraTimeFormat) -> Result<u64> {
    let mut version = e.method.version()?;
    let zname = stored_name(e)?;
    let extra = e.extra.as_deref().unwrap_or(&[]);

    let mut elen64 = 0usize;
    if !e.has_data_descriptor() && (e.csize >= ZIP64_MINVAL || e.size >= ZIP64_MINVAL) {
        elen64 = 20;
        version = 45;
    }

    let extt = match fmt {
        ExtraTimeFormat::Unix if !has_time_block(extra) => extt_times(e),
        _ => None,
    };
    let elen_ntfs = match fmt {
        ExtraTimeFormat::Ntfs if !has_time_block(extra) => NTFS_BLOCK_LEN,
        _ => 0,
    };
    let elen_extt = extt.as_ref().map_or(0, |(_, times)| 5 + 4 * times.len());
    let elen = extra_len(extra.len() + elen64 + elen_ntfs + elen_extt)?;

    w.write_all(LFH_SIGNATURE)?;
    w.write_u16::<LittleEndian>(version)?;
    w.write_u16::<LittleEndian>(e.flag)?;
    w.write_u16::<LittleEndian>(e.method.as_u16())?;
    w.write_u32::<LittleEndian>(millis_to_dos(e.mtime))?;
    if e.has_data_descriptor() {
        w.write_u32::<LittleEndian>(0)?;
        w.write_u32::<LittleEndian>(0)?;
        w.write_u32::<LittleEndian>(0)?;
    } else {
        w.write_u32::<LittleEndian>(e.crc)?;
        if elen64 != 0 {
            w.write_u32::<LittleEndian>(ZIP64_MINVAL as u32)?;
            w.write_u32::<LittleEndian>(ZIP64_MINVAL as u32)?;
        } else {
            w.write_u32::<LittleEndian>(e.csize as u32)?;
            w.write_u32::<LittleEndian>(e.size as u32)?;
        }
    }
    w.write_u16::<LittleEndian>(zname.len() as u16)?;
    w.write_u16::<LittleEndian>(elen)?;
    w.write_all(&zname)?;

    if elen64 != 0 {
        w.write_u16::<LittleEndian>(EXTID_ZIP64)?;
        w.write_u16::<LittleEndian>(16)?;
        w.write_u64::<LittleEndian>(e.size)?;
        w.write_u64::<LittleEndian>(e.csize)?;
    }
    if elen_ntfs != 0 {
        write_ntfs(w, e)?;
    }
    if let Some((flags, times)) = &extt {
        w.write_u16::<LittleEndian>(EXTID_EXTT)?;
        w.write_u16::<LittleEndian>((elen_extt - 4) as u16)?;
        w.write_u8(*flags)?;
        for &t in times {
            w.write_i32::<LittleEndian>(t)?;
        }
    }
    w.write_all(extra)?;

    Ok((LFH_SIZE + zname.len() + elen as usize) as u64)
}

/// Write the data descriptor that follows an entry's data.
pub fn write_ext<W: Write>(e: &Entry, w: &mut W) -> Result<u64> {
    w.write_all(DD_SIGNATURE)?;
    w.write_u32::<LittleEndian>(e.crc)?;
    if e.csize >= ZIP64_MINVAL || e.size >= ZIP64_MINVAL {
        w.write_u64::<LittleEndian>(e.csize)?;
        w.write_u64::<LittleEndian>(e.size)?;
        Ok(DD_SIZE64 as u64)
    } else {
        w.write_u32::<LittleEndian>(e.csize as u32)?;
        w.write_u32::<LittleEndian>(e.size as u32)?;
        Ok(DD_SIZE as u64)
    }
}
