use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Fatal conditions. Any of these aborts decoding; no partial document is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("unexpected end of data at offset {offset}, {needed} more byte(s) required")]
    UnexpectedEndOfData { offset: usize, needed: usize },

    #[error("signature is invalid")]
    InvalidSignature,

    #[error("version {0} in the header is unsupported")]
    UnsupportedVersion(String),

    #[error("encountered {block} with block size {actual}, expected {expected}")]
    UnexpectedBlockSize {
        block: &'static str,
        expected: u8,
        actual: u8,
    },

    #[error("encountered unexpected label, this label is not supported: 0x{0:02x}")]
    UnexpectedLabel(u8),

    #[error("minimum code size {0} is outside of the supported range 2..=8")]
    InvalidCodeSize(u8),

    #[error("frame {frame} has no local color table and there is no global color table")]
    MissingColorTable { frame: usize },

    #[error("background decode did not complete: {0}")]
    DecodeTask(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Structural,
    MissingColorTable,
    Task,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingColorTable { .. } => ErrorKind::MissingColorTable,
            Error::DecodeTask(_) => ErrorKind::Task,
            _ => ErrorKind::Structural,
        }
    }
}

/// Recoverable oddities found while decoding. They are collected on the
/// document and decoding carries on best-effort.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    #[error("frame {frame}: image data decoded to {actual} pixel(s), expected {expected}")]
    LzwLengthMismatch {
        frame: usize,
        expected: usize,
        actual: usize,
    },

    #[error("frame {frame}: code {code} cannot be resolved, image data truncated")]
    InvalidLzwCode { frame: usize, code: u16 },

    #[error("application extension {identifier} carried an unexpected sub-block of {length} byte(s)")]
    UnexpectedApplicationSubBlock { identifier: String, length: usize },

    #[error("XMP payload of {length} byte(s) does not end with the magic trailer")]
    MalformedXmpTrailer { length: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(Error::InvalidSignature.kind(), ErrorKind::Structural);
        assert_eq!(Error::UnexpectedLabel(0x00).kind(), ErrorKind::Structural);
        assert_eq!(
            Error::UnexpectedEndOfData { offset: 3, needed: 1 }.kind(),
            ErrorKind::Structural
        );
        assert_eq!(
            Error::MissingColorTable { frame: 0 }.kind(),
            ErrorKind::MissingColorTable
        );
        assert_eq!(Error::DecodeTask("aborted".into()).kind(), ErrorKind::Task);
    }

    #[test]
    fn label_is_printed_as_hex() {
        assert_eq!(
            Error::UnexpectedLabel(0x0a).to_string(),
            "encountered unexpected label, this label is not supported: 0x0a"
        );
    }
}
