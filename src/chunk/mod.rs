//! Byte-level access and the chunk prologue shared by AXML and ARSC documents.

mod header;
mod reader;

pub use header::{ChunkHeader, ChunkKind};
pub use reader::ByteCursor;

pub const RES_NULL_TYPE: u16 = 0x0000;
pub const RES_STRING_POOL_TYPE: u16 = 0x0001;
pub const RES_TABLE_TYPE: u16 = 0x0002;
pub const RES_XML_TYPE: u16 = 0x0003;

pub const RES_XML_FIRST_CHUNK_TYPE: u16 = 0x0100;
pub const RES_XML_START_NAMESPACE_TYPE: u16 = 0x0100;
pub const RES_XML_END_NAMESPACE_TYPE: u16 = 0x0101;
pub const RES_XML_START_ELEMENT_TYPE: u16 = 0x0102;
pub const RES_XML_END_ELEMENT_TYPE: u16 = 0x0103;
pub const RES_XML_CDATA_TYPE: u16 = 0x0104;
pub const RES_XML_LAST_CHUNK_TYPE: u16 = 0x017f;
pub const RES_XML_RESOURCE_MAP_TYPE: u16 = 0x0180;

pub const RES_TABLE_PACKAGE_TYPE: u16 = 0x0200;
pub const RES_TABLE_TYPE_TYPE: u16 = 0x0201;
pub const RES_TABLE_TYPE_SPEC_TYPE: u16 = 0x0202;
pub const RES_TABLE_LIBRARY_TYPE: u16 = 0x0203;
pub const RES_TABLE_OVERLAYABLE_TYPE: u16 = 0x0204;
pub const RES_TABLE_OVERLAYABLE_POLICY_TYPE: u16 = 0x0205;
pub const RES_TABLE_STAGED_ALIAS_TYPE: u16 = 0x0206;

/// Size of the common `type | header_size | size` prologue.
pub const CHUNK_PROLOGUE_SIZE: usize = 8;

/// Sentinel used for "no string" / "no entry" indices.
pub const NO_ENTRY: u32 = 0xFFFF_FFFF;
