//! Open-time configuration for a [`ZipFileSystem`](crate::ZipFileSystem).
//!
//! A [`Config`] can be built directly or parsed from a string map using the
//! conventional option names (`create`, `encoding`, `useTempFile`, ...).

use std::collections::HashMap;

use crate::error::{Result, ZipFsError};
use crate::zip::NameCoder;

/// Where entry timestamps are read from at open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePolicy {
    /// Only the central directory; the local header is never read
    CentralOnly,
    /// Extended timestamps are taken from the local header, which carries
    /// access and creation times as well
    LocalExtended,
}

/// Which timestamp extra block is written for entries that have none
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraTimeFormat {
    /// NTFS block (0x000a) with 100ns FILETIME values
    Ntfs,
    /// Extended timestamp block (0x5455) with Unix seconds
    Unix,
}

impl Default for ExtraTimeFormat {
    fn default() -> Self {
        if cfg!(windows) {
            ExtraTimeFormat::Ntfs
        } else {
            ExtraTimeFormat::Unix
        }
    }
}

/// Target version for multi-release lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseVersion {
    /// Every versioned directory applies
    Runtime,
    /// Versioned directories up to and including this one apply
    Version(u32),
}

/// Options for opening an archive
#[derive(Debug, Clone)]
pub struct Config {
    pub encoding: NameCoder,
    pub create: bool,
    pub use_temp_file: bool,
    pub force_zip64_end: bool,
    pub no_compression: bool,
    pub time_policy: TimePolicy,
    pub release_version: Option<ReleaseVersion>,
    pub read_only: bool,
    pub extra_time_format: ExtraTimeFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            encoding: NameCoder::Utf8,
            create: false,
            use_temp_file: false,
            force_zip64_end: false,
            no_compression: false,
            time_policy: TimePolicy::LocalExtended,
            release_version: None,
            read_only: false,
            extra_time_format: ExtraTimeFormat::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the archive if it does not exist
    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    pub fn encoding(mut self, encoding: NameCoder) -> Self {
        self.encoding = encoding;
        self
    }

    /// Stage new content in temporary files instead of memory
    pub fn use_temp_file(mut self, on: bool) -> Self {
        self.use_temp_file = on;
        self
    }

    /// Always write the ZIP64 END record and locator
    pub fn force_zip64_end(mut self, on: bool) -> Self {
        self.force_zip64_end = on;
        self
    }

    /// Store new entries instead of deflating them
    pub fn no_compression(mut self, on: bool) -> Self {
        self.no_compression = on;
        self
    }

    pub fn time_policy(mut self, policy: TimePolicy) -> Self {
        self.time_policy = policy;
        self
    }

    pub fn release_version(mut self, version: ReleaseVersion) -> Self {
        self.release_version = Some(version);
        self
    }

    pub fn read_only(mut self, on: bool) -> Self {
        self.read_only = on;
        self
    }

    pub fn extra_time_format(mut self, format: ExtraTimeFormat) -> Self {
        self.extra_time_format = format;
        self
    }

    /// Build a configuration from string options.
    ///
    /// # Arguments
    ///
    /// * `options` - Key/value pairs; unknown keys are ignored
    ///
    /// # Errors
    ///
    /// Returns [`ZipFsError::InvalidOption`] for a malformed value and
    /// [`ZipFsError::UnsupportedEncoding`] for an unknown encoding name.
    pub fn from_options(options: &HashMap<String, String>) -> Result<Self> {
        let mut config = Config::default();
        for (key, value) in options {
            match key.as_str() {
                "encoding" => config.encoding = NameCoder::for_name(value)?,
                "create" => config.create = parse_bool(key, value)?,
                "useTempFile" => config.use_temp_file = parse_bool(key, value)?,
                "forceZIP64End" | "forceEnd64" => {
                    config.force_zip64_end = parse_bool(key, value)?
                }
                "noCompression" => config.no_compression = parse_bool(key, value)?,
                "readOnly" => config.read_only = parse_bool(key, value)?,
                "zipinfo-time" => {
                    config.time_policy = if parse_bool(key, value)? {
                        TimePolicy::LocalExtended
                    } else {
                        TimePolicy::CentralOnly
                    }
                }
                "releaseVersion" | "multi-release" => {
                    config.release_version = Some(parse_release(key, value)?)
                }
                "timestampFormat" => {
                    config.extra_time_format = match value.to_ascii_lowercase().as_str() {
                        "ntfs" => ExtraTimeFormat::Ntfs,
                        "unix" => ExtraTimeFormat::Unix,
                        _ => return Err(invalid(key, value)),
                    }
                }
                _ => {}
            }
        }
        Ok(config)
    }
}

fn invalid(key: &str, value: &str) -> ZipFsError {
    ZipFsError::InvalidOption {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

/// Parse a release version: `runtime` or a positive integer
pub fn parse_release(key: &str, value: &str) -> Result<ReleaseVersion> {
    if value.eq_ignore_ascii_case("runtime") {
        return Ok(ReleaseVersion::Runtime);
    }
    match value.parse::<u32>() {
        Ok(v) if v > 0 => Ok(ReleaseVersion::Version(v)),
        _ => Err(invalid(key, value)),
    }
}
