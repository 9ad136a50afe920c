//! Writing the updated archive back to disk.
//!
//! The new archive is assembled in a temporary file beside the original,
//! walking the index in insertion order:
//!
//! - staged entries are written from their content, encoding it if needed
//! - copied and unmodified entries are copied verbatim from the original
//!   archive, with a new local header where the name or times changed
//!
//! A fault while copying from the original drops that entry and the
//! commit continues; any other fault aborts it and leaves the original
//! archive as it was.

use std::fs::File;
use std::io::{self, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::config::ExtraTimeFormat;
use crate::error::{Result, ZipFsError};
use crate::io::ReadAt;
use crate::zip::entry::Content;
use crate::zip::structures::*;
use crate::zip::writer::{write_cen, write_ext, write_loc};
use crate::zip::{CompressionMethod, Entry, EntryKind};

use super::flate::{CodecPool, CrcWriter, DeflateWriter};
use super::index::ROOT;
use super::{Inner, State};

const COPY_BUF_SIZE: usize = 8192;

/// Rewrite the archive from `state` and replace the original.
pub(crate) fn sync(inner: &Inner, state: &State) -> Result<()> {
    let fmt = inner.config.extra_time_format;
    let mut tmp = tempfile::Builder::new()
        .prefix(".zipfs-")
        .suffix(".zip")
        .tempfile_in(inner.temp_dir())?;

    let mut listed: Vec<Entry> = Vec::new();
    let mut dropped = 0usize;
    let mut written = 0u64;
    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        let mut buf = vec![0u8; COPY_BUF_SIZE];

        for (id, node) in state.index.iter() {
            // the root is implied by the names below it
            if id == ROOT {
                continue;
            }
            let copied = match &node.entry {
                Some(e) if matches!(e.kind, EntryKind::New | EntryKind::FileChannel) => {
                    let mut e = e.clone();
                    e.locoff = written;
                    written += write_entry(&inner.pool, &mut out, &mut e, fmt)?;
                    listed.push(e);
                    continue;
                }
                Some(e) => {
                    let mut e = e.clone();
                    let old = e.locoff;
                    e.locoff = written;
                    copy_entry(state, &mut out, &e, old, true, fmt, &mut buf).map(|n| (e, n))
                }
                None => {
                    let Some(pos) = node.pos else {
                        continue;
                    };
                    state
                        .channel
                        .parser
                        .read_entry(
                            &state.cen,
                            pos,
                            &node.name,
                            node.is_dir,
                            state.locpos,
                            inner.config.time_policy,
                        )
                        .and_then(|mut e| {
                            let old = e.locoff;
                            e.locoff = written;
                            copy_entry(state, &mut out, &e, old, false, fmt, &mut buf).map(|n| (e, n))
                        })
                }
            };
            match copied {
                Ok((e, n)) => {
                    written += n;
                    listed.push(e);
                }
                Err(err) => {
                    warn!(
                        entry = %inner.display(&node.name),
                        error = %err,
                        "dropping entry that could not be copied"
                    );
                    rollback(&mut out, written)?;
                    dropped += 1;
                }
            }
        }

        let cenoff = written;
        for e in &listed {
            written += write_cen(e, &mut out, fmt)?;
        }
        let end = End {
            centot: listed.len() as u64,
            cenlen: written - cenoff,
            cenoff,
            endpos: 0,
            comment: state.end.comment.clone(),
        };
        written += end.write(&mut out, written, inner.config.force_zip64_end)?;
        out.flush()?;
    }
    tmp.as_file().sync_all()?;

    replace(inner, state, tmp)?;
    info!(
        path = %inner.path.display(),
        entries = listed.len(),
        dropped,
        bytes = written,
        "committed archive"
    );
    Ok(())
}

/// Discard everything written after `start`.
fn rollback(out: &mut BufWriter<&mut File>, start: u64) -> io::Result<()> {
    out.flush()?;
    out.get_ref().set_len(start)?;
    out.seek(SeekFrom::Start(start))?;
    Ok(())
}

/// Write a staged entry: local header, content, and data descriptor.
///
/// Content that is not yet encoded goes through the CRC pass-through or a
/// pooled deflater, which fixes the entry's sizes and CRC.
fn write_entry<W: Write>(
    pool: &Arc<CodecPool>,
    out: &mut W,
    e: &mut Entry,
    fmt: ExtraTimeFormat,
) -> Result<u64> {
    let mut src: Box<dyn Read> = match &e.content {
        Content::None => return write_loc(e, out, fmt),
        Content::Bytes(bytes) => Box::new(Cursor::new(bytes.clone())),
        Content::File(path) => Box::new(File::open(path)?),
    };
    if !e.encoded {
        // sizes are only known once the content went through the encoder
        e.flag |= FLAG_DATADESCR;
    }

    let mut written = write_loc(e, out, fmt)?;
    if e.encoded {
        written += io::copy(&mut src, out)?;
    } else {
        let (_, sums) = match e.method {
            CompressionMethod::Deflate => {
                let mut w = DeflateWriter::new(&mut *out, pool.clone());
                io::copy(&mut src, &mut w)?;
                w.finish()?
            }
            _ => {
                let mut w = CrcWriter::new(&mut *out);
                io::copy(&mut src, &mut w)?;
                w.finish()?
            }
        };
        e.size = sums.size;
        e.csize = sums.csize;
        e.crc = sums.crc;
        e.encoded = true;
        written += sums.csize;
    }
    if e.has_data_descriptor() {
        written += write_ext(e, out)?;
    }
    Ok(written)
}

/// Copy an entry's local header, data and data descriptor from the original
/// archive.
///
/// # Arguments
///
/// * `e` - The entry as it will be listed; `locoff` is its new offset
/// * `old_locoff` - Offset of the entry in the original archive
/// * `rewrite_header` - Emit a fresh local header instead of the stored one
///
/// # Returns
///
/// The number of bytes written.
fn copy_entry<W: Write>(
    state: &State,
    out: &mut W,
    e: &Entry,
    old_locoff: u64,
    rewrite_header: bool,
    fmt: ExtraTimeFormat,
    buf: &mut [u8],
) -> Result<u64> {
    let parser = &state.channel.parser;
    let reader = parser.reader();
    let loc_at = state.locpos + old_locoff;
    let header = parser.read_local_header(loc_at)?;
    let data_at = loc_at + header.header_len();

    let mut size = e.csize;
    if e.has_data_descriptor() {
        size += descriptor_len(&**reader, data_at + e.csize, e)?;
    }

    // a stored name with a leading slash is never copied as is
    let mut first = [0u8; 1];
    let leading_slash = header.name_len > 0
        && reader.read_fully_at(loc_at + LFH_SIZE as u64, &mut first)? == 1
        && first[0] == b'/';

    let (from, written) = if rewrite_header || leading_slash {
        (data_at, write_loc(e, out, fmt)? + size)
    } else {
        size += header.header_len();
        (loc_at, size)
    };
    copy_range(&**reader, from, size, out, buf)?;
    Ok(written)
}

/// Length of the data descriptor at `at`, whose signature is optional
fn descriptor_len(reader: &dyn ReadAt, at: u64, e: &Entry) -> Result<u64> {
    let mut sig = [0u8; 4];
    let signed = reader.read_fully_at(at, &mut sig)? == 4 && &sig[..] == DD_SIGNATURE;
    let wide = e.size >= ZIP64_MINVAL || e.csize >= ZIP64_MINVAL;
    let mut len = if wide { DD_SIZE64 as u64 } else { DD_SIZE as u64 };
    if !signed {
        len -= 4;
    }
    Ok(len)
}

fn copy_range<W: Write>(
    reader: &dyn ReadAt,
    mut at: u64,
    mut len: u64,
    out: &mut W,
    buf: &mut [u8],
) -> Result<()> {
    while len > 0 {
        let want = len.min(buf.len() as u64) as usize;
        let n = reader.read_at(at, &mut buf[..want])?;
        if n == 0 {
            return Err(ZipFsError::format("entry data extends past end of archive"));
        }
        out.write_all(&buf[..n])?;
        at += n as u64;
        len -= n as u64;
    }
    Ok(())
}

/// Move the new archive into place.
///
/// If streams still read the original, it is first moved aside and handed
/// to the channel's registry, which deletes it once they are done.
fn replace(inner: &Inner, state: &State, tmp: NamedTempFile) -> Result<()> {
    if !state.channel.has_live_streams() {
        tmp.persist(&inner.path).map_err(|e| e.error)?;
        return Ok(());
    }

    let aside = tempfile::Builder::new()
        .prefix(".zipfs-")
        .suffix(".old")
        .tempfile_in(inner.temp_dir())?
        .into_temp_path();
    std::fs::rename(&inner.path, &aside)?;
    match tmp.persist(&inner.path) {
        Ok(_) => {
            state.channel.retire(aside);
            Ok(())
        }
        Err(e) => {
            if let Err(restore) = std::fs::rename(&aside, &inner.path) {
                warn!(
                    path = %inner.path.display(),
                    aside = %aside.display(),
                    error = %restore,
                    "failed to restore original archive"
                );
                // leave the only remaining copy where it is
                aside.keep().map_err(|e| e.error)?;
            }
            Err(e.error.into())
        }
    }
}
