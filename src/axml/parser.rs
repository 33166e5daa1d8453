use super::public_attrs;
use crate::chunk::*;
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::error::{FormatError, FormatResult};
use crate::string_pool::{StringPool, STRING_POOL_HEADER_SIZE};
use crate::value::ResValue;
use log::{debug, info};
use std::fmt;

/// Header size every XML node chunk must declare: prologue, line number and comment.
const XML_NODE_HEADER_SIZE: u16 = 0x10;
/// One attribute record is five u32 fields.
const ATTRIBUTE_RECORD_SIZE: usize = 20;
/// Header size a plain-text file starting with `<?xm` would appear to declare.
const PLAIN_XML_HEADER_SIZE: u16 = 0x6d78;

/// One attribute of a start-element chunk, as raw pool indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub namespace_idx: u32,
    pub name_idx: u32,
    pub raw_value_idx: u32,
    pub value_type: u8,
    pub value_data: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AxmlEvent {
    StartDocument,
    /// Only produced when namespace events are enabled.
    StartNamespace { prefix_idx: u32, uri_idx: u32 },
    /// Only produced when namespace events are enabled.
    EndNamespace { prefix_idx: u32, uri_idx: u32 },
    StartElement {
        namespace_idx: u32,
        name_idx: u32,
        attributes: Vec<Attribute>,
        line: u32,
        comment_idx: u32,
        /// Index of the `id` attribute, if the compiler marked one.
        id_attribute: Option<u16>,
        class_attribute: Option<u16>,
        style_attribute: Option<u16>,
    },
    EndElement { namespace_idx: u32, name_idx: u32 },
    Text { value_idx: u32 },
    EndDocument,
}

/// Where an attribute's name came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeName<'a> {
    Pooled(&'a str),
    /// Blank pool entry, named through the resource map and the framework table.
    Framework { id: u32, name: &'static str },
    /// Blank pool entry whose resource id is not a known framework attribute.
    UnknownSystem(u32),
    /// Blank pool entry with no resource id at all; carries the name index.
    Unmapped(u32),
}

impl AttributeName<'_> {
    pub fn is_fallback(&self) -> bool {
        !matches!(self, AttributeName::Pooled(_))
    }

    pub fn resource_id(&self) -> Option<u32> {
        match self {
            AttributeName::Framework { id, .. } | AttributeName::UnknownSystem(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeName::Pooled(name) => f.write_str(name),
            AttributeName::Framework { name, .. } => f.write_str(name),
            AttributeName::UnknownSystem(id) => write!(f, "UNKNOWN_SYSTEM_ATTRIBUTE_{id:08x}"),
            AttributeName::Unmapped(idx) => write!(f, "UNKNOWN_ATTRIBUTE_{idx:08x}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    NotStarted,
    Running,
    Finished,
}

/// Pull parser over a compiled binary XML document.
///
/// `new` validates the document header and decodes the string pool; every
/// call to [`AxmlParser::next`] then walks chunks until it has an event to
/// report. Resource maps and (by default) namespace chunks are consumed
/// internally.
pub struct AxmlParser<'a> {
    cursor: ByteCursor<'a>,
    strings: StringPool,
    resource_ids: Vec<u32>,
    namespaces: Vec<(u32, u32)>,
    namespace_events: bool,
    state: State,
    file_size: usize,
    diagnostics: Diagnostics,
}

impl<'a> AxmlParser<'a> {
    pub fn new(bytes: &'a [u8]) -> FormatResult<AxmlParser<'a>> {
        let mut diagnostics = Diagnostics::scoped("axml");
        let mut cursor = ByteCursor::new(bytes);

        let header_size = cursor.peek_u16_at(2)?;
        if header_size != CHUNK_PROLOGUE_SIZE as u16 {
            let hint = if header_size == PLAIN_XML_HEADER_SIZE {
                " (this looks like a plain text XML file)"
            } else {
                ""
            };
            return Err(FormatError::malformed(
                2,
                format!("document header size is {header_size}, expected 8{hint}"),
            ));
        }

        let header = ChunkHeader::parse(&mut cursor, None)?;
        let file_size = header.size as usize;
        if file_size < bytes.len() {
            diagnostics.warn(
                WarningKind::TrailingData,
                Some(file_size),
                format!(
                    "declared size {file_size} is smaller than the {} byte buffer; was data appended?",
                    bytes.len()
                ),
            );
        }
        if header.chunk_type != RES_XML_TYPE {
            diagnostics.warn(
                WarningKind::HeaderTypeMismatch,
                Some(0),
                format!("unusual document type 0x{:04x}, parsing anyway", header.chunk_type),
            );
        }

        let mut cursor = ByteCursor::new(&bytes[..file_size]);
        cursor.seek(header.body_start())?;
        let pool_header = ChunkHeader::parse(&mut cursor, Some(RES_STRING_POOL_TYPE))?;
        if pool_header.header_size != STRING_POOL_HEADER_SIZE {
            return Err(FormatError::malformed(
                pool_header.start,
                format!(
                    "string pool header size is {}, expected {}",
                    pool_header.header_size, STRING_POOL_HEADER_SIZE
                ),
            ));
        }
        let strings = StringPool::parse(&mut cursor, &pool_header)?;
        diagnostics.extend(strings.diagnostics().clone());

        Ok(AxmlParser {
            cursor,
            strings,
            resource_ids: Vec::new(),
            namespaces: Vec::new(),
            namespace_events: false,
            state: State::NotStarted,
            file_size,
            diagnostics,
        })
    }

    /// Also report namespace start/end chunks as events.
    pub fn with_namespace_events(mut self, enabled: bool) -> Self {
        self.namespace_events = enabled;
        self
    }

    /// Advance to the next event.
    ///
    /// After `EndDocument`, or after an error, every call returns `EndDocument`.
    pub fn next(&mut self) -> FormatResult<AxmlEvent> {
        match self.state {
            State::NotStarted => {
                self.state = State::Running;
                return Ok(AxmlEvent::StartDocument);
            }
            State::Finished => return Ok(AxmlEvent::EndDocument),
            State::Running => {}
        }
        let result = self.advance();
        if !matches!(result, Ok(ref event) if *event != AxmlEvent::EndDocument) {
            self.state = State::Finished;
        }
        result
    }

    fn advance(&mut self) -> FormatResult<AxmlEvent> {
        loop {
            if self.cursor.is_at_end() {
                return Ok(AxmlEvent::EndDocument);
            }
            let header = ChunkHeader::parse(&mut self.cursor, None)?;

            if header.kind() == ChunkKind::XmlResourceMap {
                self.read_resource_map(&header)?;
                continue;
            }
            if !(RES_XML_FIRST_CHUNK_TYPE..=RES_XML_LAST_CHUNK_TYPE).contains(&header.chunk_type) {
                self.diagnostics.warn(
                    WarningKind::UnknownChunk,
                    Some(header.start),
                    format!(
                        "not an XML chunk type: 0x{:04x}, skipping {} bytes",
                        header.chunk_type, header.size
                    ),
                );
                self.cursor.seek(header.end())?;
                continue;
            }
            if header.header_size != XML_NODE_HEADER_SIZE {
                return Err(FormatError::malformed(
                    header.start,
                    format!(
                        "XML node chunk 0x{:04x} declares header size {}, expected 16",
                        header.chunk_type, header.header_size
                    ),
                ));
            }

            let mut body = self.cursor.bounded(header.end())?;
            let line = body.read_u32()?;
            let comment_idx = body.read_u32()?;
            let event = match header.kind() {
                ChunkKind::XmlStartNamespace | ChunkKind::XmlEndNamespace => {
                    if comment_idx != NO_ENTRY {
                        self.diagnostics.warn(
                            WarningKind::UnknownChunk,
                            Some(header.start),
                            format!(
                                "comment on namespace chunk dropped: '{}'",
                                self.strings.get(comment_idx as usize)
                            ),
                        );
                    }
                    let prefix_idx = body.read_u32()?;
                    let uri_idx = body.read_u32()?;
                    if header.kind() == ChunkKind::XmlStartNamespace {
                        self.start_namespace(header.start, prefix_idx, uri_idx);
                        self.namespace_events
                            .then_some(AxmlEvent::StartNamespace { prefix_idx, uri_idx })
                    } else {
                        self.end_namespace(header.start, prefix_idx, uri_idx);
                        self.namespace_events
                            .then_some(AxmlEvent::EndNamespace { prefix_idx, uri_idx })
                    }
                }
                ChunkKind::XmlStartElement => {
                    Some(self.read_start_element(&mut body, &header, line, comment_idx)?)
                }
                ChunkKind::XmlEndElement => {
                    let namespace_idx = body.read_u32()?;
                    let name_idx = body.read_u32()?;
                    Some(AxmlEvent::EndElement {
                        namespace_idx,
                        name_idx,
                    })
                }
                ChunkKind::XmlCdata => {
                    let value_idx = body.read_u32()?;
                    let typed = ResValue::read(&mut body)?;
                    if typed.res0 != 0 {
                        self.diagnostics.warn(
                            WarningKind::ReservedFieldSet,
                            Some(header.start),
                            format!("text chunk value has res0 = {}", typed.res0),
                        );
                    }
                    debug!(
                        "[axml] text chunk: index={value_idx} type=0x{:02x} data=0x{:x}",
                        typed.data_type, typed.data
                    );
                    Some(AxmlEvent::Text { value_idx })
                }
                _ => {
                    self.diagnostics.warn(
                        WarningKind::UnknownChunk,
                        Some(header.start),
                        format!(
                            "unknown XML chunk 0x{:04x}, skipping {} bytes",
                            header.chunk_type, header.size
                        ),
                    );
                    None
                }
            };
            self.cursor.seek(header.end())?;
            if let Some(event) = event {
                return Ok(event);
            }
        }
    }

    fn read_resource_map(&mut self, header: &ChunkHeader) -> FormatResult<()> {
        if header.size < 8 || header.size % 4 != 0 {
            return Err(FormatError::malformed(
                header.start,
                format!("invalid resource map size {}", header.size),
            ));
        }
        if !self.resource_ids.is_empty() {
            self.diagnostics.warn(
                WarningKind::DuplicateChunk,
                Some(header.start),
                "second resource map, appending its ids",
            );
        }
        let mut body = self.cursor.bounded(header.end())?;
        body.seek(header.body_start())?;
        let count = (header.end() - header.body_start()) / 4;
        debug!("[axml] resource map with {count} ids");
        self.resource_ids.reserve(count);
        for _ in 0..count {
            self.resource_ids.push(body.read_u32()?);
        }
        self.cursor.seek(header.end())
    }

    fn start_namespace(&mut self, offset: usize, prefix_idx: u32, uri_idx: u32) {
        let prefix = self.strings.get(prefix_idx as usize);
        let uri = self.strings.get(uri_idx as usize);
        debug!("[axml] start namespace {prefix} -> {uri}");
        if uri.is_empty() {
            self.diagnostics.warn(
                WarningKind::EmptyNamespaceUri,
                Some(offset),
                format!("namespace prefix '{prefix}' resolves to an empty URI"),
            );
        }
        if self.namespaces.contains(&(prefix_idx, uri_idx)) {
            info!("[axml] namespace mapping ({prefix}, {uri}) already seen");
            self.diagnostics.warn(
                WarningKind::DuplicateNamespace,
                Some(offset),
                format!("namespace mapping ({prefix}, {uri}) declared twice"),
            );
        }
        self.namespaces.push((prefix_idx, uri_idx));
    }

    fn end_namespace(&mut self, offset: usize, prefix_idx: u32, uri_idx: u32) {
        match self
            .namespaces
            .iter()
            .rposition(|binding| *binding == (prefix_idx, uri_idx))
        {
            Some(pos) => {
                self.namespaces.remove(pos);
            }
            None => self.diagnostics.warn(
                WarningKind::UnmatchedNamespace,
                Some(offset),
                format!("end of namespace without a start (prefix {prefix_idx}, uri {uri_idx})"),
            ),
        }
    }

    fn read_start_element(
        &mut self,
        body: &mut ByteCursor<'_>,
        header: &ChunkHeader,
        line: u32,
        comment_idx: u32,
    ) -> FormatResult<AxmlEvent> {
        let namespace_idx = body.read_u32()?;
        let name_idx = body.read_u32()?;
        let _flags = body.read_u32()?;
        let attribute_word = body.read_u32()?;
        let class_word = body.read_u32()?;

        let attribute_count = (attribute_word & 0xFFFF) as usize;
        let needed = attribute_count * ATTRIBUTE_RECORD_SIZE;
        if needed > body.remaining() {
            return Err(FormatError::malformed(
                header.start,
                format!(
                    "element declares {attribute_count} attributes but only {} bytes remain",
                    body.remaining()
                ),
            ));
        }

        let mut attributes = Vec::with_capacity(attribute_count);
        for _ in 0..attribute_count {
            attributes.push(Attribute {
                namespace_idx: body.read_u32()?,
                name_idx: body.read_u32()?,
                raw_value_idx: body.read_u32()?,
                value_type: (body.read_u32()? >> 24) as u8,
                value_data: body.read_u32()?,
            });
        }

        Ok(AxmlEvent::StartElement {
            namespace_idx,
            name_idx,
            attributes,
            line,
            comment_idx,
            id_attribute: one_based((attribute_word >> 16) as u16),
            class_attribute: one_based((class_word & 0xFFFF) as u16),
            style_attribute: one_based((class_word >> 16) as u16),
        })
    }

    pub fn strings(&self) -> &StringPool {
        &self.strings
    }

    /// Pool string for a raw index; `""` for `0xFFFFFFFF` or out of range.
    pub fn string(&self, idx: u32) -> &str {
        self.strings.lookup(idx).unwrap_or("")
    }

    pub fn resource_ids(&self) -> &[u32] {
        &self.resource_ids
    }

    /// Resource id recorded for a name index in the resource map.
    pub fn resource_id(&self, name_idx: u32) -> Option<u32> {
        self.resource_ids.get(name_idx as usize).copied()
    }

    /// Live prefix to URI bindings. Empty prefixes and URIs are left out; when a
    /// prefix is bound twice the later binding wins.
    pub fn nsmap(&self) -> Vec<(String, String)> {
        let mut map: Vec<(String, String)> = Vec::new();
        for (prefix_idx, uri_idx) in &self.namespaces {
            let prefix = self.strings.get(*prefix_idx as usize);
            let uri = self.strings.get(*uri_idx as usize);
            if prefix.is_empty() || uri.is_empty() {
                continue;
            }
            match map.iter_mut().find(|(p, _)| p == prefix) {
                Some(entry) => entry.1 = uri.to_string(),
                None => map.push((prefix.to_string(), uri.to_string())),
            }
        }
        map
    }

    /// Number of namespace bindings still open.
    pub fn open_namespaces(&self) -> usize {
        self.namespaces.len()
    }

    /// Name of an attribute, falling back to the resource map when the pool
    /// entry is blank.
    pub fn attribute_name(&self, attr: &Attribute) -> AttributeName<'_> {
        let pooled = self.string(attr.name_idx);
        if !pooled.is_empty() {
            return AttributeName::Pooled(pooled);
        }
        match self.resource_id(attr.name_idx) {
            Some(id) => match public_attrs::attribute_name(id) {
                Some(name) => AttributeName::Framework { id, name },
                None => AttributeName::UnknownSystem(id),
            },
            None => AttributeName::Unmapped(attr.name_idx),
        }
    }

    /// Raw string value of an attribute, only meaningful for string-typed values.
    pub fn attribute_raw_value(&self, attr: &Attribute) -> &str {
        self.string(attr.raw_value_idx)
    }

    /// Declared document size; parsing stops there even if the buffer is longer.
    pub fn file_size(&self) -> usize {
        self.file_size
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub(crate) fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }
}

fn one_based(raw: u16) -> Option<u16> {
    raw.checked_sub(1)
}
