use std::fmt;

/// Result alias for every parsing operation in the crate.
pub type FormatResult<T> = Result<T, FormatError>;

/// Fatal structural problems found while decoding AXML or ARSC data.
///
/// Anything recoverable is not an error: it is recorded as a
/// [`Warning`](crate::diagnostics::Warning) instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormatError {
    /// A read of `needed` bytes at `offset` would run past the end of the buffer.
    Truncated { offset: usize, needed: usize },
    /// A seek target lies outside the buffer.
    InvalidOffset { offset: usize, len: usize },
    /// A chunk declares a header smaller than the 8-byte prologue.
    HeaderTooSmall { offset: usize, header_size: u16 },
    /// A chunk declares a total size smaller than its own header.
    SizeTooSmall {
        offset: usize,
        header_size: u16,
        size: u32,
    },
    /// A chunk declares a size reaching past the end of the buffer.
    ChunkOverrunsBuffer {
        offset: usize,
        size: u32,
        buffer_len: usize,
    },
    /// A load-bearing chunk has the wrong type.
    UnexpectedChunkType {
        offset: usize,
        expected: u16,
        found: u16,
    },
    /// A pool string is not followed by the null terminator of its encoding.
    UnterminatedString { index: usize, offset: usize },
    /// Counts, offsets or field values that cannot describe a valid document.
    Malformed { offset: usize, reason: String },
    /// A textual resource reference such as `@android:01010000` could not be parsed.
    InvalidReference(String),
    /// Rendering the decoded tree as text XML failed.
    Xml(String),
}

impl FormatError {
    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        FormatError::Malformed {
            offset,
            reason: reason.into(),
        }
    }

    /// Byte offset the error refers to, when it has one.
    pub fn offset(&self) -> Option<usize> {
        match self {
            FormatError::Truncated { offset, .. }
            | FormatError::InvalidOffset { offset, .. }
            | FormatError::HeaderTooSmall { offset, .. }
            | FormatError::SizeTooSmall { offset, .. }
            | FormatError::ChunkOverrunsBuffer { offset, .. }
            | FormatError::UnexpectedChunkType { offset, .. }
            | FormatError::UnterminatedString { offset, .. }
            | FormatError::Malformed { offset, .. } => Some(*offset),
            FormatError::InvalidReference(_) | FormatError::Xml(_) => None,
        }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::Truncated { offset, needed } => {
                write!(f, "unexpected end of data reading {needed} bytes at offset 0x{offset:x}")
            }
            FormatError::InvalidOffset { offset, len } => {
                write!(f, "offset 0x{offset:x} is outside the buffer (length 0x{len:x})")
            }
            FormatError::HeaderTooSmall {
                offset,
                header_size,
            } => write!(
                f,
                "chunk at offset 0x{offset:x} declares header size {header_size}, smaller than 8"
            ),
            FormatError::SizeTooSmall {
                offset,
                header_size,
                size,
            } => write!(
                f,
                "chunk at offset 0x{offset:x} declares size {size}, smaller than its header size {header_size}"
            ),
            FormatError::ChunkOverrunsBuffer {
                offset,
                size,
                buffer_len,
            } => write!(
                f,
                "chunk at offset 0x{offset:x} with size {size} overruns the buffer (length {buffer_len})"
            ),
            FormatError::UnexpectedChunkType {
                offset,
                expected,
                found,
            } => write!(
                f,
                "expected chunk type 0x{expected:04x} at offset 0x{offset:x}, found 0x{found:04x}"
            ),
            FormatError::UnterminatedString { index, offset } => {
                write!(f, "string {index} at offset 0x{offset:x} is not null terminated")
            }
            FormatError::Malformed { offset, reason } => {
                write!(f, "malformed data at offset 0x{offset:x}: {reason}")
            }
            FormatError::InvalidReference(reason) => {
                write!(f, "invalid resource reference: {reason}")
            }
            FormatError::Xml(msg) => write!(f, "XML error: {msg}"),
        }
    }
}

impl std::error::Error for FormatError {}

pub(crate) fn xml_error(err: impl fmt::Display) -> FormatError {
    FormatError::Xml(err.to_string())
}
