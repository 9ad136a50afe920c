use crate::error::{Result, ZipFsError};

/// Text encoding used for entry names and comments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameCoder {
    #[default]
    Utf8,
    Latin1,
}

impl NameCoder {
    /// Look up a coder by its conventional name, ignoring case and dashes.
    pub fn for_name(name: &str) -> Result<Self> {
        let key: String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "utf8" => Ok(NameCoder::Utf8),
            "iso88591" | "latin1" => Ok(NameCoder::Latin1),
            _ => Err(ZipFsError::UnsupportedEncoding(name.to_string())),
        }
    }

    pub fn is_utf8(&self) -> bool {
        matches!(self, NameCoder::Utf8)
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            NameCoder::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            NameCoder::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }

    pub fn encode(&self, s: &str) -> Result<Vec<u8>> {
        match self {
            NameCoder::Utf8 => Ok(s.as_bytes().to_vec()),
            NameCoder::Latin1 => s
                .chars()
                .map(|c| {
                    u8::try_from(c as u32).map_err(|_| {
                        ZipFsError::InvalidPath(format!("{s}: not representable in ISO-8859-1"))
                    })
                })
                .collect(),
        }
    }
}
