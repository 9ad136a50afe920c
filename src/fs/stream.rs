//! Entry streams and the live-reader registry of an archive channel.
//!
//! Readers over unmodified members read straight from the archive through
//! positioned reads, so any number of them can share one [`ArchiveChannel`].
//! Each registers itself while alive; once the archive has been replaced
//! on disk, the moved-aside original is deleted when the last of them goes.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempPath;
use tracing::{debug, warn};

use crate::error::{Result, ZipFsError};
use crate::zip::entry::Content;
use crate::zip::structures::FLAG_DATADESCR;
use crate::zip::time::now_millis;
use crate::zip::{CompressionMethod, Entry, EntryKind, ZipParser};

use super::Inner;
use super::flate::{CodecPool, CrcWriter, DeflateWriter, InflateReader, Sums, inflate_buffer_size};

#[derive(Default)]
struct Registry {
    next: u64,
    live: HashSet<u64>,
    /// The replaced archive, kept on disk while streams still read it
    retired: Option<TempPath>,
}

/// The open archive file together with the streams reading from it
pub(crate) struct ArchiveChannel {
    pub parser: ZipParser,
    registry: Mutex<Registry>,
}

impl ArchiveChannel {
    pub fn new(parser: ZipParser) -> Arc<Self> {
        Arc::new(Self {
            parser,
            registry: Mutex::new(Registry::default()),
        })
    }

    pub fn register(self: &Arc<Self>) -> StreamGuard {
        let mut reg = self.registry.lock();
        let id = reg.next;
        reg.next += 1;
        reg.live.insert(id);
        StreamGuard {
            channel: self.clone(),
            id,
        }
    }

    pub fn has_live_streams(&self) -> bool {
        !self.registry.lock().live.is_empty()
    }

    /// Hand over the moved-aside original archive.
    ///
    /// It is deleted right away if the last stream closed in the meantime,
    /// otherwise when the last stream closes.
    pub fn retire(&self, aside: TempPath) {
        let mut reg = self.registry.lock();
        if reg.live.is_empty() {
            drop(reg);
            delete_retired(aside);
        } else {
            debug!(path = %aside.display(), streams = reg.live.len(), "deferring deletion of replaced archive");
            reg.retired = Some(aside);
        }
    }

    #[cfg(test)]
    pub fn live_streams(&self) -> usize {
        self.registry.lock().live.len()
    }
}

fn delete_retired(aside: TempPath) {
    let shown = aside.to_path_buf();
    match aside.close() {
        Ok(()) => debug!(path = %shown.display(), "deleted replaced archive"),
        Err(e) => warn!(path = %shown.display(), error = %e, "failed to delete replaced archive"),
    }
}

/// Membership of one stream in its channel's registry
pub(crate) struct StreamGuard {
    channel: Arc<ArchiveChannel>,
    id: u64,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        let retired = {
            let mut reg = self.channel.registry.lock();
            reg.live.remove(&self.id);
            if reg.live.is_empty() {
                reg.retired.take()
            } else {
                None
            }
        };
        if let Some(aside) = retired {
            delete_retired(aside);
        }
    }
}

/// The stored bytes of one member inside the archive.
///
/// The data offset is only known after reading the local header, which
/// happens on the first read.
pub(crate) struct ArchiveSlice {
    channel: Arc<ArchiveChannel>,
    loc_at: u64,
    pos: Option<u64>,
    remaining: u64,
    _guard: StreamGuard,
}

impl ArchiveSlice {
    pub fn new(channel: &Arc<ArchiveChannel>, loc_at: u64, len: u64) -> Self {
        Self {
            _guard: channel.register(),
            channel: channel.clone(),
            loc_at,
            pos: None,
            remaining: len,
        }
    }
}

impl Read for ArchiveSlice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let pos = match self.pos {
            Some(pos) => pos,
            None => {
                let pos = self.channel.parser.data_offset(self.loc_at)?;
                self.pos = Some(pos);
                pos
            }
        };
        let max = self.remaining.min(buf.len() as u64) as usize;
        let n = self.channel.parser.reader().read_at(pos, &mut buf[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "archive ends inside entry data",
            ));
        }
        self.pos = Some(pos + n as u64);
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// Inflater input buffer for `entry`, sized from its decoded length
fn input_buffer_size(entry: &Entry) -> usize {
    inflate_buffer_size(entry.size)
}

/// Decoded content of an entry.
pub struct EntryReader {
    inner: Box<dyn Read + Send>,
}

impl EntryReader {
    /// Open `entry` for reading.
    ///
    /// Unmodified and copied members read from `channel`; staged members
    /// read their bytes or temporary file. Content is inflated when it is
    /// stored deflated.
    pub(crate) fn open(
        pool: &Arc<CodecPool>,
        channel: &Arc<ArchiveChannel>,
        locpos: u64,
        entry: &Entry,
    ) -> Result<Self> {
        let raw: Box<dyn Read + Send> = match (&entry.content, entry.kind) {
            (Content::Bytes(bytes), _) => Box::new(Cursor::new(bytes.clone())),
            (Content::File(path), _) => Box::new(File::open(path)?),
            (Content::None, EntryKind::Cen | EntryKind::Copy) => Box::new(ArchiveSlice::new(
                channel,
                locpos + entry.locoff,
                entry.csize,
            )),
            (Content::None, _) => Box::new(io::empty()),
        };

        let staged = matches!(entry.kind, EntryKind::New | EntryKind::FileChannel);
        let deflated = entry.method == CompressionMethod::Deflate && (entry.encoded || !staged);
        let inner: Box<dyn Read + Send> = if deflated {
            Box::new(InflateReader::new(
                raw,
                pool.clone(),
                input_buffer_size(entry),
            ))
        } else {
            raw
        };
        Ok(Self { inner })
    }
}

impl Read for EntryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

enum Sink {
    Memory(Vec<u8>),
    File(BufWriter<File>),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Memory(v) => v.write(buf),
            Sink::File(f) => f.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Memory(_) => Ok(()),
            Sink::File(f) => f.flush(),
        }
    }
}

enum Encoder {
    Stored(CrcWriter<Sink>),
    Deflated(DeflateWriter<Sink>),
}

/// Output stream for a new or replaced entry.
///
/// Content is encoded while it is written. [`EntryWriter::close`] (or
/// dropping the writer) publishes the entry to the file system.
pub struct EntryWriter {
    fs: Arc<Inner>,
    entry: Option<Entry>,
    encoder: Option<Encoder>,
}

impl EntryWriter {
    pub(crate) fn new(fs: Arc<Inner>, mut entry: Entry) -> Result<Self> {
        let sink = if fs.config.use_temp_file {
            let (file, path) = fs.create_temp_file()?;
            entry.content = Content::File(path);
            Sink::File(BufWriter::new(file))
        } else {
            Sink::Memory(Vec::new())
        };
        let encoder = match entry.method {
            CompressionMethod::Deflate => Encoder::Deflated(DeflateWriter::new(sink, fs.pool.clone())),
            _ => Encoder::Stored(CrcWriter::new(sink)),
        };
        Ok(Self {
            fs,
            entry: Some(entry),
            encoder: Some(encoder),
        })
    }

    /// Finish the content and record the entry. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let (Some(encoder), Some(mut entry)) = (self.encoder.take(), self.entry.take()) else {
            return Ok(());
        };
        let (sink, sums): (Sink, Sums) = match encoder {
            Encoder::Stored(w) => w.finish()?,
            Encoder::Deflated(w) => w.finish()?,
        };
        match sink {
            Sink::Memory(bytes) => entry.content = Content::Bytes(bytes.into()),
            Sink::File(w) => {
                w.into_inner().map_err(|e| e.into_error())?;
            }
        }
        entry.size = sums.size;
        entry.csize = sums.csize;
        entry.crc = sums.crc;
        entry.encoded = true;
        entry.kind = EntryKind::New;
        debug!(entry = %entry.name(), size = entry.size, csize = entry.csize, "entry written");
        self.fs.update(entry)
    }
}

impl Write for EntryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.encoder.as_mut() {
            Some(Encoder::Stored(w)) => w.write(buf),
            Some(Encoder::Deflated(w)) => w.write(buf),
            None => Err(io::Error::other("stream closed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.encoder.as_mut() {
            Some(Encoder::Stored(w)) => w.flush(),
            Some(Encoder::Deflated(w)) => w.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for EntryWriter {
    fn drop(&mut self) {
        if self.encoder.is_some()
            && let Err(e) = self.close()
        {
            warn!(error = %e, "failed to close entry writer");
        }
    }
}

/// Seekable read/write access to an entry's decoded content.
///
/// The content lives in a temporary file for the lifetime of the channel.
/// Closing a writable channel records that file as the entry's new content.
pub struct EntryChannel {
    fs: Arc<Inner>,
    file: Option<File>,
    path: PathBuf,
    /// Target entry; `None` for read-only channels
    entry: Option<Entry>,
}

impl EntryChannel {
    pub(crate) fn new(fs: Arc<Inner>, file: File, path: PathBuf, entry: Option<Entry>) -> Self {
        Self {
            fs,
            file: Some(file),
            path,
            entry,
        }
    }

    pub fn is_writable(&self) -> bool {
        self.entry.is_some()
    }

    /// Current length of the content
    pub fn size(&self) -> Result<u64> {
        match &self.file {
            Some(f) => Ok(f.metadata()?.len()),
            None => Err(ZipFsError::Closed),
        }
    }

    pub fn close(&mut self) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        match self.entry.take() {
            Some(mut entry) => {
                let size = file.metadata()?.len();
                drop(file);
                entry.kind = EntryKind::FileChannel;
                entry.flag |= FLAG_DATADESCR;
                entry.size = size;
                entry.mtime = now_millis();
                entry.content = Content::File(self.path.clone());
                entry.encoded = false;
                debug!(entry = %entry.name(), size, "channel closed for write");
                self.fs.update(entry)
            }
            None => {
                drop(file);
                self.fs.remove_temp_file(&self.path)?;
                Ok(())
            }
        }
    }

    fn file(&mut self) -> io::Result<&mut File> {
        self.file.as_mut().ok_or_else(|| io::Error::other("channel closed"))
    }
}

impl Read for EntryChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file()?.read(buf)
    }
}

impl Write for EntryChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.entry.is_none() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "channel not open for writing",
            ));
        }
        self.file()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file()?.flush()
    }
}

impl Seek for EntryChannel {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file()?.seek(pos)
    }
}

impl Drop for EntryChannel {
    fn drop(&mut self) {
        if self.file.is_some()
            && let Err(e) = self.close()
        {
            warn!(path = %self.path.display(), error = %e, "failed to close entry channel");
        }
    }
}
