//! Raw DEFLATE streams on pooled codecs.
//!
//! `flate2`'s stream wrappers own their codec, so the readers and writers
//! here drive [`Decompress`] and [`Compress`] directly and hand them back to
//! a [`CodecPool`] when finished.

use crc32fast::Hasher;
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use parking_lot::Mutex;
use std::io::{self, Read, Write};
use std::sync::Arc;

/// Idle codecs kept per kind; surplus ones are dropped on release
pub(crate) const MAX_FLATER: usize = 20;

const OUT_BUF_SIZE: usize = 8192;

/// Free lists of raw (headerless) inflaters and deflaters.
#[derive(Default)]
pub(crate) struct CodecPool {
    inflaters: Mutex<Vec<Decompress>>,
    deflaters: Mutex<Vec<Compress>>,
}

impl CodecPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_inflater(&self) -> Decompress {
        self.inflaters
            .lock()
            .pop()
            .unwrap_or_else(|| Decompress::new(false))
    }

    pub fn release_inflater(&self, mut inflater: Decompress) {
        let mut idle = self.inflaters.lock();
        if idle.len() < MAX_FLATER {
            inflater.reset(false);
            idle.push(inflater);
        }
    }

    pub fn get_deflater(&self) -> Compress {
        self.deflaters
            .lock()
            .pop()
            .unwrap_or_else(|| Compress::new(Compression::default(), false))
    }

    pub fn release_deflater(&self, mut deflater: Compress) {
        let mut idle = self.deflaters.lock();
        if idle.len() < MAX_FLATER {
            deflater.reset();
            idle.push(deflater);
        }
    }

    /// Drop every idle codec
    pub fn clear(&self) {
        self.inflaters.lock().clear();
        self.deflaters.lock().clear();
    }

    #[cfg(test)]
    pub fn idle(&self) -> (usize, usize) {
        (self.inflaters.lock().len(), self.deflaters.lock().len())
    }
}

/// Decompressing reader over raw DEFLATE data.
pub struct InflateReader<R: Read> {
    inner: R,
    pool: Arc<CodecPool>,
    inflater: Option<Decompress>,
    buf: Box<[u8]>,
    pos: usize,
    cap: usize,
    input_done: bool,
}

impl<R: Read> InflateReader<R> {
    /// # Arguments
    ///
    /// * `inner` - Source of compressed bytes
    /// * `pool` - Pool to take the inflater from and return it to
    /// * `buf_size` - Size of the compressed input buffer
    pub(crate) fn new(inner: R, pool: Arc<CodecPool>, buf_size: usize) -> Self {
        let inflater = pool.get_inflater();
        Self {
            inner,
            pool,
            inflater: Some(inflater),
            buf: vec![0u8; buf_size.max(1)].into_boxed_slice(),
            pos: 0,
            cap: 0,
            input_done: false,
        }
    }

    fn finish(&mut self) {
        if let Some(inflater) = self.inflater.take() {
            self.pool.release_inflater(inflater);
        }
    }
}

impl<R: Read> Read for InflateReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        loop {
            let Some(inflater) = self.inflater.as_mut() else {
                return Ok(0);
            };
            if self.pos == self.cap && !self.input_done {
                self.cap = self.inner.read(&mut self.buf)?;
                self.pos = 0;
                self.input_done = self.cap == 0;
            }

            let flush = if self.input_done {
                FlushDecompress::Finish
            } else {
                FlushDecompress::None
            };
            let (in_before, out_before) = (inflater.total_in(), inflater.total_out());
            let status = inflater
                .decompress(&self.buf[self.pos..self.cap], out, flush)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            let consumed = (inflater.total_in() - in_before) as usize;
            let produced = (inflater.total_out() - out_before) as usize;
            self.pos += consumed;

            if status == Status::StreamEnd {
                self.finish();
                return Ok(produced);
            }
            if produced > 0 {
                return Ok(produced);
            }
            if self.input_done && consumed == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "unexpected end of deflate stream",
                ));
            }
        }
    }
}

impl<R: Read> Drop for InflateReader<R> {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Final figures of an encoded entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Sums {
    pub size: u64,
    pub csize: u64,
    pub crc: u32,
}

/// Pass-through writer that records size and CRC-32 of what it forwards.
pub struct CrcWriter<W: Write> {
    inner: W,
    hasher: Hasher,
    size: u64,
}

impl<W: Write> CrcWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Hasher::new(),
            size: 0,
        }
    }

    pub(crate) fn finish(mut self) -> io::Result<(W, Sums)> {
        self.inner.flush()?;
        let sums = Sums {
            size: self.size,
            csize: self.size,
            crc: self.hasher.finalize(),
        };
        Ok((self.inner, sums))
    }
}

impl<W: Write> Write for CrcWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.size += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Compressing writer producing raw DEFLATE data.
pub struct DeflateWriter<W: Write> {
    inner: Option<W>,
    pool: Arc<CodecPool>,
    deflater: Option<Compress>,
    out: Vec<u8>,
    hasher: Hasher,
    size: u64,
}

impl<W: Write> DeflateWriter<W> {
    pub(crate) fn new(inner: W, pool: Arc<CodecPool>) -> Self {
        let deflater = pool.get_deflater();
        Self {
            inner: Some(inner),
            pool,
            deflater: Some(deflater),
            out: vec![0u8; OUT_BUF_SIZE],
            hasher: Hasher::new(),
            size: 0,
        }
    }

    fn broken() -> io::Error {
        io::Error::other("deflate stream already finished")
    }

    /// Run the deflater over `input`, forwarding whatever it produces.
    /// Returns the number of input bytes consumed.
    fn pump(&mut self, input: &[u8], flush: FlushCompress) -> io::Result<(usize, Status)> {
        let (Some(deflater), Some(inner)) = (self.deflater.as_mut(), self.inner.as_mut()) else {
            return Err(Self::broken());
        };
        let (in_before, out_before) = (deflater.total_in(), deflater.total_out());
        let status = deflater
            .compress(input, &mut self.out, flush)
            .map_err(io::Error::other)?;
        let consumed = (deflater.total_in() - in_before) as usize;
        let produced = (deflater.total_out() - out_before) as usize;
        inner.write_all(&self.out[..produced])?;
        Ok((consumed, status))
    }

    /// Flush the compressed stream and give back the sink.
    pub(crate) fn finish(mut self) -> io::Result<(W, Sums)> {
        loop {
            let (_, status) = self.pump(&[], FlushCompress::Finish)?;
            if status == Status::StreamEnd {
                break;
            }
        }
        let (Some(deflater), Some(mut inner)) = (self.deflater.take(), self.inner.take()) else {
            return Err(Self::broken());
        };
        inner.flush()?;
        let sums = Sums {
            size: self.size,
            csize: deflater.total_out(),
            crc: self.hasher.clone().finalize(),
        };
        self.pool.release_deflater(deflater);
        Ok((inner, sums))
    }
}

impl<W: Write> Write for DeflateWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let (consumed, _) = self.pump(buf, FlushCompress::None)?;
            if consumed > 0 {
                self.hasher.update(&buf[..consumed]);
                self.size += consumed as u64;
                return Ok(consumed);
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.as_mut().map_or(Ok(()), |w| w.flush())
    }
}

impl<W: Write> Drop for DeflateWriter<W> {
    fn drop(&mut self) {
        if let Some(deflater) = self.deflater.take() {
            self.pool.release_deflater(deflater);
        }
    }
}

/// Compressed input buffer size for an entry of `size` bytes.
///
/// Small entries get a buffer that holds the whole stream plus slack;
/// large ones stream through a fixed 8 KiB.
pub(crate) fn inflate_buffer_size(size: u64) -> usize {
    match size.checked_add(2) {
        Some(n) if n <= 65536 => n as usize,
        _ => 8192,
    }
}
