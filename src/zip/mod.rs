//! ZIP archive format codec.
//!
//! This module reads and writes the on-disk records of a ZIP archive,
//! supporting both the standard format and the ZIP64 extensions for
//! large archives.
//!
//! ## Architecture
//!
//! - [`structures`]: Fixed-layout records (EOCD, ZIP64 EOCD, local header) and constants
//! - [`parser`]: Locating the trailer and decoding the central directory
//! - [`writer`]: Encoding local headers, central headers and data descriptors
//! - [`entry`]: The in-memory model of one archive member
//! - [`time`]: DOS, NTFS and Unix timestamp conversions
//! - [`coder`]: Entry name encodings
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! The EOCD is read first (from the end of the file), then the Central
//! Directory, which allows building the whole index without touching the
//! entry data.
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 extensions for entries and archives > 4GB
//! - STORED and DEFLATE compression methods
//! - NTFS and extended timestamp extra fields
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods

pub mod coder;
pub mod entry;
pub mod parser;
pub mod structures;
pub mod time;
pub mod writer;

pub use coder::NameCoder;
pub use entry::{Entry, EntryKind};
pub use parser::ZipParser;
pub use structures::CompressionMethod;
