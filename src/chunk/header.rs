use super::*;
use crate::error::{FormatError, FormatResult};
use serde::Serialize;

/// Chunk type decoded once from the prologue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ChunkKind {
    Null,
    StringPool,
    Table,
    Xml,
    XmlStartNamespace,
    XmlEndNamespace,
    XmlStartElement,
    XmlEndElement,
    XmlCdata,
    /// Inside the XML node range but not one of the known node types.
    XmlOther(u16),
    XmlResourceMap,
    TablePackage,
    TableType,
    TableTypeSpec,
    TableLibrary,
    TableOverlayable,
    TableOverlayablePolicy,
    TableStagedAlias,
    Unknown(u16),
}

impl From<u16> for ChunkKind {
    fn from(value: u16) -> Self {
        match value {
            RES_NULL_TYPE => ChunkKind::Null,
            RES_STRING_POOL_TYPE => ChunkKind::StringPool,
            RES_TABLE_TYPE => ChunkKind::Table,
            RES_XML_TYPE => ChunkKind::Xml,
            RES_XML_START_NAMESPACE_TYPE => ChunkKind::XmlStartNamespace,
            RES_XML_END_NAMESPACE_TYPE => ChunkKind::XmlEndNamespace,
            RES_XML_START_ELEMENT_TYPE => ChunkKind::XmlStartElement,
            RES_XML_END_ELEMENT_TYPE => ChunkKind::XmlEndElement,
            RES_XML_CDATA_TYPE => ChunkKind::XmlCdata,
            RES_XML_FIRST_CHUNK_TYPE..=RES_XML_LAST_CHUNK_TYPE => ChunkKind::XmlOther(value),
            RES_XML_RESOURCE_MAP_TYPE => ChunkKind::XmlResourceMap,
            RES_TABLE_PACKAGE_TYPE => ChunkKind::TablePackage,
            RES_TABLE_TYPE_TYPE => ChunkKind::TableType,
            RES_TABLE_TYPE_SPEC_TYPE => ChunkKind::TableTypeSpec,
            RES_TABLE_LIBRARY_TYPE => ChunkKind::TableLibrary,
            RES_TABLE_OVERLAYABLE_TYPE => ChunkKind::TableOverlayable,
            RES_TABLE_OVERLAYABLE_POLICY_TYPE => ChunkKind::TableOverlayablePolicy,
            RES_TABLE_STAGED_ALIAS_TYPE => ChunkKind::TableStagedAlias,
            other => ChunkKind::Unknown(other),
        }
    }
}

/// The 8-byte `type | header_size | size` prologue of a chunk.
///
/// Once parsed, `header_size >= 8`, `size >= header_size` and the chunk lies
/// entirely inside the buffer it was read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ChunkHeader {
    pub chunk_type: u16,
    pub header_size: u16,
    pub size: u32,
    pub start: usize,
}

impl ChunkHeader {
    /// Read and validate a prologue at the cursor.
    ///
    /// On success the cursor sits just after the 8 prologue bytes; on failure
    /// it is left where it was.
    pub fn parse(cursor: &mut ByteCursor<'_>, expected: Option<u16>) -> FormatResult<ChunkHeader> {
        let start = cursor.position();
        let mut probe = cursor.clone();
        let chunk_type = probe.read_u16()?;
        let header_size = probe.read_u16()?;
        let size = probe.read_u32()?;

        if (header_size as usize) < CHUNK_PROLOGUE_SIZE {
            return Err(FormatError::HeaderTooSmall {
                offset: start,
                header_size,
            });
        }
        if size < header_size as u32 {
            return Err(FormatError::SizeTooSmall {
                offset: start,
                header_size,
                size,
            });
        }
        let fits = start
            .checked_add(size as usize)
            .is_some_and(|end| end <= cursor.len());
        if !fits {
            return Err(FormatError::ChunkOverrunsBuffer {
                offset: start,
                size,
                buffer_len: cursor.len(),
            });
        }
        if let Some(expected) = expected {
            if chunk_type != expected {
                return Err(FormatError::UnexpectedChunkType {
                    offset: start,
                    expected,
                    found: chunk_type,
                });
            }
        }

        *cursor = probe;
        Ok(ChunkHeader {
            chunk_type,
            header_size,
            size,
            start,
        })
    }

    pub fn kind(&self) -> ChunkKind {
        ChunkKind::from(self.chunk_type)
    }

    /// Absolute offset just past this chunk.
    pub fn end(&self) -> usize {
        self.start + self.size as usize
    }

    /// Absolute offset of the first byte after the declared header.
    pub fn body_start(&self) -> usize {
        self.start + self.header_size as usize
    }

    /// Absolute offset of the first byte after the 8-byte prologue.
    pub fn fields_start(&self) -> usize {
        self.start + CHUNK_PROLOGUE_SIZE
    }
}
