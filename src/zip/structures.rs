use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Write};

use crate::error::{Result, ZipFsError};

/// Value stored in a 32-bit field when the real value lives in a ZIP64 record
pub const ZIP64_MINVAL: u64 = 0xFFFF_FFFF;

/// Value stored in a 16-bit count field when the real count lives in a ZIP64 record
pub const ZIP64_MINVAL32: u64 = 0xFFFF;

/// General purpose flag: sizes and CRC follow the data in a descriptor
pub const FLAG_DATADESCR: u16 = 0x0008;

/// General purpose flag: name and comment are UTF-8
pub const FLAG_USE_UTF8: u16 = 0x0800;

/// General purpose flag: entry is encrypted
pub const FLAG_ENCRYPTED: u16 = 0x0001;

/// Extra field header IDs
pub const EXTID_ZIP64: u16 = 0x0001;
pub const EXTID_NTFS: u16 = 0x000a;
pub const EXTID_EXTT: u16 = 0x5455;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }

    /// Version needed to extract an entry using this method
    pub fn version(&self) -> Result<u16> {
        match self {
            CompressionMethod::Stored => Ok(10),
            CompressionMethod::Deflate => Ok(20),
            CompressionMethod::Unknown(v) => Err(ZipFsError::Format(format!(
                "unsupported compression method: {v}"
            ))),
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(ZipFsError::format("invalid END header (bad signature)"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64EOCDLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(ZipFsError::format("invalid ZIP64 END locator"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_with_eocd64: cursor.read_u32::<LittleEndian>()?,
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
            total_disks: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
pub struct Zip64EOCD {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(ZipFsError::format("invalid ZIP64 END header"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            eocd64_size: cursor.read_u64::<LittleEndian>()?,
            version_made_by: cursor.read_u16::<LittleEndian>()?,
            version_needed: cursor.read_u16::<LittleEndian>()?,
            disk_number: cursor.read_u32::<LittleEndian>()?,
            disk_with_cd: cursor.read_u32::<LittleEndian>()?,
            disk_entries: cursor.read_u64::<LittleEndian>()?,
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Data Descriptor - 16 bytes, 24 with ZIP64 sizes
pub const DD_SIGNATURE: &[u8] = b"PK\x07\x08";
pub const DD_SIZE: usize = 16;
pub const DD_SIZE64: usize = 24;

/// The fixed part of a Local File Header.
///
/// Only the fields the engine needs when copying or skipping an existing
/// header are kept.
pub struct LocalFileHeader {
    pub name_len: u16,
    pub extra_len: u16,
}

impl LocalFileHeader {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < LFH_SIZE || &data[0..4] != LFH_SIGNATURE {
            return Err(ZipFsError::format("invalid LOC header (bad signature)"));
        }

        let mut cursor = Cursor::new(&data[26..]);
        let name_len = cursor.read_u16::<LittleEndian>()?;
        let extra_len = cursor.read_u16::<LittleEndian>()?;

        Ok(Self {
            name_len,
            extra_len,
        })
    }

    /// Bytes from the start of the header to the first data byte
    pub fn header_len(&self) -> u64 {
        LFH_SIZE as u64 + self.name_len as u64 + self.extra_len as u64
    }
}

/// Summary of the archive trailer, merged from the legacy and ZIP64 records.
#[derive(Debug, Clone, Default)]
pub struct End {
    /// Total number of central directory entries
    pub centot: u64,
    /// Length of the central directory in bytes
    pub cenlen: u64,
    /// Offset of the central directory relative to the first local header
    pub cenoff: u64,
    /// Position of the END record (or the ZIP64 END record) in the file
    pub endpos: u64,
    pub comment: Option<Vec<u8>>,
}

impl End {
    /// Write the trailer, preceded by the ZIP64 record and locator when any
    /// field overflows its legacy width or `force_end64` is set.
    ///
    /// `offset` is the position the trailer starts at. Returns bytes written.
    pub fn write<W: Write>(&self, w: &mut W, offset: u64, force_end64: bool) -> io::Result<u64> {
        let mut has_zip64 = force_end64;
        let mut xlen = self.cenlen;
        let mut xoff = self.cenoff;
        let mut count = self.centot;
        if xlen >= ZIP64_MINVAL {
            xlen = ZIP64_MINVAL;
            has_zip64 = true;
        }
        if xoff >= ZIP64_MINVAL {
            xoff = ZIP64_MINVAL;
            has_zip64 = true;
        }
        if count >= ZIP64_MINVAL32 {
            count = ZIP64_MINVAL32;
            has_zip64 = true;
        }

        let mut written = 0u64;
        if has_zip64 {
            w.write_all(Zip64EOCD::SIGNATURE)?;
            w.write_u64::<LittleEndian>(Zip64EOCD::MIN_SIZE as u64 - 12)?;
            w.write_u16::<LittleEndian>(45)?; // version made by
            w.write_u16::<LittleEndian>(45)?; // version needed to extract
            w.write_u32::<LittleEndian>(0)?; // number of this disk
            w.write_u32::<LittleEndian>(0)?; // central directory start disk
            w.write_u64::<LittleEndian>(self.centot)?;
            w.write_u64::<LittleEndian>(self.centot)?;
            w.write_u64::<LittleEndian>(self.cenlen)?;
            w.write_u64::<LittleEndian>(self.cenoff)?;

            w.write_all(Zip64EOCDLocator::SIGNATURE)?;
            w.write_u32::<LittleEndian>(0)?;
            w.write_u64::<LittleEndian>(offset)?;
            w.write_u32::<LittleEndian>(1)?; // total number of disks
            written += (Zip64EOCD::MIN_SIZE + Zip64EOCDLocator::SIZE) as u64;
        }

        let comment = self.comment.as_deref().unwrap_or(&[]);
        let comment = &comment[..comment.len().min(0xFFFF)];
        w.write_all(EndOfCentralDirectory::SIGNATURE)?;
        w.write_u16::<LittleEndian>(0)?;
        w.write_u16::<LittleEndian>(0)?;
        w.write_u16::<LittleEndian>(count as u16)?;
        w.write_u16::<LittleEndian>(count as u16)?;
        w.write_u32::<LittleEndian>(xlen as u32)?;
        w.write_u32::<LittleEndian>(xoff as u32)?;
        w.write_u16::<LittleEndian>(comment.len() as u16)?;
        w.write_all(comment)?;
        written += (EndOfCentralDirectory::SIZE + comment.len()) as u64;

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_write_legacy() {
        let end = End {
            centot: 3,
            cenlen: 150,
            cenoff: 1000,
            ..Default::default()
        };
        let mut buf = Vec::new();
        let n = end.write(&mut buf, 1000, false).unwrap();
        assert_eq!(n, 22);
        assert_eq!(buf.len(), 22);

        let eocd = EndOfCentralDirectory::from_bytes(&buf).unwrap();
        assert_eq!(eocd.total_entries, 3);
        assert_eq!(eocd.cd_size, 150);
        assert_eq!(eocd.cd_offset, 1000);
        assert_eq!(eocd.comment_len, 0);
    }

    #[test]
    fn test_end_write_forced_zip64() {
        let end = End {
            centot: 1,
            cenlen: 60,
            cenoff: 40,
            comment: Some(b"hi".to_vec()),
            ..Default::default()
        };
        let mut buf = Vec::new();
        let n = end.write(&mut buf, 100, true).unwrap();
        assert_eq!(n as usize, 56 + 20 + 22 + 2);

        let eocd64 = Zip64EOCD::from_bytes(&buf).unwrap();
        assert_eq!(eocd64.total_entries, 1);
        assert_eq!(eocd64.cd_size, 60);
        assert_eq!(eocd64.cd_offset, 40);

        let locator = Zip64EOCDLocator::from_bytes(&buf[56..]).unwrap();
        assert_eq!(locator.eocd64_offset, 100);

        let eocd = EndOfCentralDirectory::from_bytes(&buf[76..]).unwrap();
        assert_eq!(eocd.comment_len, 2);
        assert_eq!(eocd.cd_offset, 40);
    }

    #[test]
    fn test_end_write_overflowing_count() {
        let end = End {
            centot: 70_000,
            cenlen: 10,
            cenoff: 10,
            ..Default::default()
        };
        let mut buf = Vec::new();
        end.write(&mut buf, 20, false).unwrap();
        let eocd = EndOfCentralDirectory::from_bytes(&buf[76..]).unwrap();
        assert_eq!(eocd.total_entries, 0xFFFF);
        assert_eq!(Zip64EOCD::from_bytes(&buf).unwrap().total_entries, 70_000);
    }

    #[test]
    fn test_bad_signature_is_format_error() {
        let err = EndOfCentralDirectory::from_bytes(&[0u8; 22]).unwrap_err();
        assert!(matches!(err, ZipFsError::Format(_)));
        assert!(LocalFileHeader::from_bytes(&[0u8; 30]).is_err());
    }

    #[test]
    fn test_local_header_length() {
        let mut buf = LFH_SIGNATURE.to_vec();
        buf.extend_from_slice(&[0u8; 22]);
        buf.extend_from_slice(&5u16.to_le_bytes());
        buf.extend_from_slice(&9u16.to_le_bytes());
        let header = LocalFileHeader::from_bytes(&buf).unwrap();
        assert_eq!(header.name_len, 5);
        assert_eq!(header.header_len(), 30 + 5 + 9);
    }

    #[test]
    fn test_method_versions() {
        assert_eq!(CompressionMethod::Stored.version().unwrap(), 10);
        assert_eq!(CompressionMethod::Deflate.version().unwrap(), 20);
        assert!(CompressionMethod::Unknown(12).version().is_err());
        assert_eq!(CompressionMethod::from_u16(8), CompressionMethod::Deflate);
    }
}
