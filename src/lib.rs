//! # zipfs
//!
//! A read/write file system view over ZIP archives.
//!
//! An archive is opened as a tree of directories and files addressed by
//! `/`-separated paths. Members are read in place from the archive; all
//! changes are staged in memory or in temporary files and written out as a
//! new archive, atomically replacing the old one, when the file system is
//! closed.
//!
//! ## Features
//!
//! - Directory tree with synthesized parents for archives that omit them
//! - Support for ZIP64 format (archives and members larger than 4GB)
//! - Support for STORED (uncompressed) and DEFLATE compression methods
//! - NTFS and extended Unix timestamps alongside DOS times
//! - Multi-release archives with versioned lookups
//! - Readers keep working while a commit replaces the archive under them
//!
//! ## Example
//!
//! ```no_run
//! use zipfs::{Config, CopyOptions, ZipFileSystem};
//!
//! let fs = ZipFileSystem::open("bundle.zip", Config::new().create(true))?;
//! fs.create_directory("/conf")?;
//! fs.write("/conf/app.toml", b"debug = false\n")?;
//! fs.copy("/conf/app.toml", "/conf/app.toml.bak", CopyOptions::default())?;
//!
//! for path in fs.read_dir("/conf")? {
//!     println!("{path}");
//! }
//! fs.close()?;
//! # Ok::<(), zipfs::ZipFsError>(())
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod fs;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use config::{Config, ExtraTimeFormat, ReleaseVersion, TimePolicy};
pub use error::{Result, ZipFsError};
pub use fs::{
    ChannelOptions, CopyOptions, EntryChannel, EntryReader, EntryWriter, WriteOptions,
    ZipFileSystem,
};
pub use io::{LocalFile, ReadAt};
pub use zip::{CompressionMethod, Entry, EntryKind, NameCoder};
