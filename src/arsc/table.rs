use super::config::ResTableConfig;
use crate::chunk::*;
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::error::{xml_error, FormatError, FormatResult};
use crate::string_pool::StringPool;
use crate::value::{ResValue, RES_VALUE_SIZE};
use bitflags::bitflags;
use log::{debug, info};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Header size of `ResTable_header`: prologue plus the package count.
pub const RES_TABLE_HEADER_SIZE: u16 = 12;
/// Package names are a fixed array of 128 UTF-16 units.
const PACKAGE_NAME_BYTES: usize = 256;
/// Package headers from this size on carry `type_id_offset`.
const PACKAGE_HEADER_WITH_TYPE_ID_OFFSET: u16 = 288;
/// `id | flags | reserved | entry_count | entries_start`, before the config.
const TYPE_FIELDS_SIZE: usize = 12;
/// Size of one `ResTable_map`: name plus a `Res_value`.
const MAP_ITEM_SIZE: usize = 12;

/// The locale string of the default configuration.
pub const DEFAULT_LOCALE: &str = "";

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntryFlags: u16 {
        const COMPLEX = 0x0001;
        const PUBLIC = 0x0002;
        const WEAK = 0x0004;
        /// Key in the size field, value type in the high byte of the flags.
        const COMPACT = 0x0008;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct TypeFlags: u8 {
        const SPARSE = 0x01;
        const OFFSET16 = 0x02;
    }
}

bitflags! {
    /// Per-entry flags of a type spec: which config axes the entry varies over.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct TypeSpecFlags: u32 {
        const MCC = 0x0001;
        const MNC = 0x0002;
        const LOCALE = 0x0004;
        const TOUCHSCREEN = 0x0008;
        const KEYBOARD = 0x0010;
        const KEYBOARD_HIDDEN = 0x0020;
        const NAVIGATION = 0x0040;
        const ORIENTATION = 0x0080;
        const DENSITY = 0x0100;
        const SCREEN_SIZE = 0x0200;
        const VERSION = 0x0400;
        const SCREEN_LAYOUT = 0x0800;
        const UI_MODE = 0x1000;
        const SMALLEST_SCREEN_SIZE = 0x2000;
        const LAYOUTDIR = 0x4000;
        const SCREEN_ROUND = 0x8000;
        const COLOR_MODE = 0x0001_0000;
        const STAGED_PUBLIC = 0x2000_0000;
        const PUBLIC = 0x4000_0000;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EntryBody {
    Simple(ResValue),
    /// A bag: styles, arrays, plurals. Items are `(name resource id, value)`,
    /// shared between entries whose offsets alias the same bag.
    Complex {
        parent: u32,
        items: Arc<[(u32, ResValue)]>,
    },
}

/// One `ResTable_entry` together with the resource id it was found under.
#[derive(Clone, Debug, PartialEq)]
pub struct ResTableEntry {
    pub id: u32,
    /// Index into the package's key pool.
    pub key: u32,
    pub flags: EntryFlags,
    pub body: EntryBody,
}

impl ResTableEntry {
    pub fn is_complex(&self) -> bool {
        matches!(self.body, EntryBody::Complex { .. })
    }

    pub fn is_public(&self) -> bool {
        self.flags.contains(EntryFlags::PUBLIC)
    }

    pub fn value(&self) -> Option<&ResValue> {
        match &self.body {
            EntryBody::Simple(value) => Some(value),
            EntryBody::Complex { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResTypeSpec {
    pub id: u8,
    pub types_count: u16,
    pub flags: Vec<TypeSpecFlags>,
}

/// One `ResTable_type` chunk: the entries of a type under a single config.
#[derive(Clone, Debug, PartialEq)]
pub struct ResType {
    pub id: u8,
    pub flags: TypeFlags,
    pub config: ResTableConfig,
    /// Only the entries present, in offset-table order. Each carries its id;
    /// use [`ResType::entry`] to look one up by local index. A sparse table
    /// can name index 0xffff from a few bytes, so absent slots are not stored.
    pub entries: Vec<ResTableEntry>,
}

impl ResType {
    /// The entry at local index `index`, if this config defines one.
    pub fn entry(&self, index: u16) -> Option<&ResTableEntry> {
        self.entries.iter().find(|entry| entry.id & 0xffff == index as u32)
    }
}

#[derive(Clone, Debug)]
pub struct ArscPackage {
    pub id: u32,
    pub name: String,
    pub last_public_type: u32,
    pub last_public_key: u32,
    pub type_id_offset: u32,
    pub type_strings: StringPool,
    pub key_strings: StringPool,
    pub type_specs: Vec<ResTypeSpec>,
    pub types: Vec<ResType>,
}

impl ArscPackage {
    /// Name of a type id (`string`, `drawable`, ...); type ids are one-based.
    pub fn type_name(&self, type_id: u8) -> &str {
        match (type_id as usize).checked_sub(1) {
            Some(idx) => self.type_strings.get(idx),
            None => "",
        }
    }

    pub fn key_name(&self, entry: &ResTableEntry) -> &str {
        self.key_strings.get(entry.key as usize)
    }
}

/// An entry of the public resource listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicResource {
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    pub id: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct EntryRef {
    package: usize,
    ty: usize,
    entry: usize,
}

/// Candidates for a resource id under a wanted configuration.
pub(crate) enum ConfigSelection<'t> {
    Missing,
    Found(Vec<(ResTableConfig, &'t ResTableEntry)>),
    /// No default entry existed; the first configuration was used instead.
    Fallback(ResTableConfig, &'t ResTableEntry),
}

/// A decoded `resources.arsc`.
#[derive(Clone, Debug)]
pub struct ResourceTable {
    strings: StringPool,
    packages: Vec<ArscPackage>,
    resource_values: HashMap<u32, Vec<(ResTableConfig, EntryRef)>>,
    resource_keys: HashMap<String, HashMap<String, HashMap<String, u32>>>,
    diagnostics: Diagnostics,
}

impl ResourceTable {
    pub fn parse(bytes: &[u8]) -> FormatResult<ResourceTable> {
        let mut diagnostics = Diagnostics::scoped("arsc");
        let mut cursor = ByteCursor::new(bytes);
        let header = ChunkHeader::parse(&mut cursor, Some(RES_TABLE_TYPE))?;

        if header.header_size != RES_TABLE_HEADER_SIZE {
            diagnostics.warn(
                WarningKind::UnusualHeaderSize,
                Some(0),
                format!(
                    "table header size is {}, expected {RES_TABLE_HEADER_SIZE}",
                    header.header_size
                ),
            );
        }
        if header.end() < bytes.len() {
            diagnostics.warn(
                WarningKind::TrailingData,
                Some(header.end()),
                format!(
                    "declared size {} is smaller than the {} byte buffer; was data appended?",
                    header.size,
                    bytes.len()
                ),
            );
        }

        let package_count = cursor.read_u32()? as usize;
        if package_count < 1 {
            diagnostics.warn(
                WarningKind::CountMismatch,
                Some(header.fields_start()),
                "table declares no packages",
            );
        }

        let mut strings: Option<StringPool> = None;
        let mut packages = Vec::new();
        cursor.seek(header.body_start())?;
        while let Some(child) = next_child(&mut cursor, header.end(), &mut diagnostics)? {
            match child.kind() {
                ChunkKind::StringPool if strings.is_none() => {
                    let pool = StringPool::parse(&mut cursor, &child)?;
                    diagnostics.extend(pool.diagnostics().clone());
                    strings = Some(pool);
                }
                ChunkKind::StringPool => diagnostics.warn(
                    WarningKind::DuplicateChunk,
                    Some(child.start),
                    "more than one main string pool, keeping the first",
                ),
                ChunkKind::TablePackage => {
                    if packages.len() == package_count {
                        diagnostics.warn(
                            WarningKind::CountMismatch,
                            Some(child.start),
                            format!("more packages than the {package_count} declared"),
                        );
                    }
                    let package = parse_package(&mut cursor, &child, &mut diagnostics)?;
                    debug!(
                        "[arsc] package 0x{:02x} '{}': {} type specs, {} types",
                        package.id,
                        package.name,
                        package.type_specs.len(),
                        package.types.len()
                    );
                    packages.push(package);
                }
                other => diagnostics.warn(
                    WarningKind::UnknownChunk,
                    Some(child.start),
                    format!("skipping unexpected {other:?} chunk in table"),
                ),
            }
            cursor.seek(child.end())?;
        }
        if packages.len() < package_count {
            diagnostics.warn(
                WarningKind::CountMismatch,
                None,
                format!(
                    "table declares {package_count} packages but contains {}",
                    packages.len()
                ),
            );
        }

        let strings = strings.unwrap_or_else(|| {
            diagnostics.warn(WarningKind::CountMismatch, None, "table has no main string pool");
            StringPool::empty()
        });
        let mut table = ResourceTable {
            strings,
            packages,
            resource_values: HashMap::new(),
            resource_keys: HashMap::new(),
            diagnostics,
        };
        table.index();
        Ok(table)
    }

    fn index(&mut self) {
        for (p, package) in self.packages.iter().enumerate() {
            let keys = self.resource_keys.entry(package.name.clone()).or_default();
            for (t, ty) in package.types.iter().enumerate() {
                let type_name = package.type_name(ty.id);
                for (e, entry) in ty.entries.iter().enumerate() {
                    let slot = EntryRef {
                        package: p,
                        ty: t,
                        entry: e,
                    };
                    let configs = self.resource_values.entry(entry.id).or_default();
                    match configs.iter_mut().find(|(config, _)| *config == ty.config) {
                        Some(existing) => existing.1 = slot,
                        None => configs.push((ty.config, slot)),
                    }
                    keys.entry(type_name.to_string())
                        .or_default()
                        .insert(package.key_name(entry).to_string(), entry.id);
                }
            }
        }
    }

    fn entry(&self, slot: EntryRef) -> &ResTableEntry {
        &self.packages[slot.package].types[slot.ty].entries[slot.entry]
    }

    /// The main string pool holding all string values.
    pub fn strings(&self) -> &StringPool {
        &self.strings
    }

    pub fn packages(&self) -> &[ArscPackage] {
        &self.packages
    }

    pub fn package_names(&self) -> Vec<&str> {
        self.packages.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn package(&self, name: &str) -> Option<&ArscPackage> {
        self.packages.iter().find(|p| p.name == name)
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn is_tampered(&self) -> bool {
        self.diagnostics.is_tampered()
    }

    /// Locales that have at least one type chunk, in order of appearance.
    /// The default locale is [`DEFAULT_LOCALE`].
    pub fn locales(&self, package: &str) -> Vec<String> {
        let mut locales: Vec<String> = Vec::new();
        for ty in self.package(package).into_iter().flat_map(|p| &p.types) {
            let locale = ty.config.language_and_region();
            if !locales.contains(&locale) {
                locales.push(locale);
            }
        }
        locales
    }

    /// Type names with entries in `locale`.
    pub fn types(&self, package: &str, locale: &str) -> Vec<&str> {
        let Some(package) = self.package(package) else {
            return Vec::new();
        };
        let mut names: Vec<&str> = Vec::new();
        for ty in &package.types {
            let name = package.type_name(ty.id);
            if ty.config.language_and_region() == locale && !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Type, name and id of `rid`, if `package` defines it.
    pub fn get_id(&self, package: &str, rid: u32) -> Option<PublicResource> {
        let (_, slot) = self.resource_values.get(&rid)?.first()?;
        let owner = &self.packages[slot.package];
        if owner.name != package {
            return None;
        }
        let entry = self.entry(*slot);
        let ty = &owner.types[slot.ty];
        Some(PublicResource {
            type_name: owner.type_name(ty.id).to_string(),
            name: owner.key_name(entry).to_string(),
            id: rid,
        })
    }

    pub fn res_id_by_key(&self, package: &str, type_name: &str, key: &str) -> Option<u32> {
        self.resource_keys.get(package)?.get(type_name)?.get(key).copied()
    }

    /// The XML reference name of a resource id.
    ///
    /// With a package the name is looked up there only and rendered without
    /// it (`@string/app_name`); otherwise every package is searched and the
    /// owner is included (`@com.example:string/app_name`).
    pub fn resource_xml_name(&self, rid: u32, package: Option<&str>) -> Option<String> {
        match package {
            Some(package) => {
                let found = self.get_id(package, rid)?;
                Some(format!("@{}/{}", found.type_name, found.name))
            }
            None => self.packages.iter().find_map(|p| {
                self.get_id(&p.name, rid)
                    .map(|found| format!("@{}:{}/{}", p.name, found.type_name, found.name))
            }),
        }
    }

    /// `(name, value)` of every simple `string` entry whose config has `locale`.
    pub fn string_resources(&self, package: &str, locale: &str) -> Vec<(String, String)> {
        let Some(package) = self.package(package) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for ty in &package.types {
            if package.type_name(ty.id) != "string" || ty.config.language_and_region() != locale {
                continue;
            }
            for entry in &ty.entries {
                if let Some(value) = entry.value() {
                    out.push((package.key_name(entry).to_string(), value.format(&self.strings)));
                }
            }
        }
        out
    }

    /// The string `key` of `package` in `locale`, as `(key, value)`.
    pub fn get_string(&self, package: &str, key: &str, locale: &str) -> Option<(String, String)> {
        self.string_resources(package, locale)
            .into_iter()
            .find(|(name, _)| name == key)
    }

    /// `strings.xml` for `package` and `locale`.
    pub fn strings_xml(&self, package: &str, locale: &str) -> FormatResult<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(xml_error)?;
        writer
            .write_event(Event::Start(BytesStart::new("resources")))
            .map_err(xml_error)?;
        for (name, value) in self.string_resources(package, locale) {
            let mut start = BytesStart::new("string");
            start.push_attribute(("name", name.as_str()));
            writer.write_event(Event::Start(start)).map_err(xml_error)?;
            writer
                .write_event(Event::Text(BytesText::new(&value)))
                .map_err(xml_error)?;
            writer
                .write_event(Event::End(BytesEnd::new("string")))
                .map_err(xml_error)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("resources")))
            .map_err(xml_error)?;
        String::from_utf8(writer.into_inner()).map_err(xml_error)
    }

    /// Every resource id of `package` with its type and name, sorted by id.
    pub fn public_resources(&self, package: &str) -> Vec<PublicResource> {
        let Some(owner) = self.package(package) else {
            return Vec::new();
        };
        let mut seen = BTreeMap::new();
        for ty in &owner.types {
            for entry in &ty.entries {
                seen.entry(entry.id).or_insert_with(|| PublicResource {
                    type_name: owner.type_name(ty.id).to_string(),
                    name: owner.key_name(entry).to_string(),
                    id: entry.id,
                });
            }
        }
        seen.into_values().collect()
    }

    /// Configurations present for each type of `package`, optionally only `type_name`.
    pub fn type_configs(
        &self,
        package: &str,
        type_name: Option<&str>,
    ) -> BTreeMap<String, Vec<ResTableConfig>> {
        let mut result: BTreeMap<String, Vec<ResTableConfig>> = BTreeMap::new();
        for owner in self.packages.iter().filter(|p| p.name == package) {
            for ty in &owner.types {
                let name = owner.type_name(ty.id);
                if type_name.is_some_and(|wanted| wanted != name) {
                    continue;
                }
                result.entry(name.to_string()).or_default().push(ty.config);
            }
        }
        result
    }

    pub(crate) fn select_configs(
        &self,
        rid: u32,
        config: Option<&ResTableConfig>,
    ) -> ConfigSelection<'_> {
        let Some(options) = self.resource_values.get(&rid) else {
            return ConfigSelection::Missing;
        };
        let all = || {
            options
                .iter()
                .map(|(config, slot)| (*config, self.entry(*slot)))
                .collect()
        };
        match config {
            Some(wanted) if options.len() > 1 => {
                if let Some((config, slot)) = options.iter().find(|(config, _)| config == wanted) {
                    ConfigSelection::Found(vec![(*config, self.entry(*slot))])
                } else if wanted.is_default() {
                    let (config, slot) = &options[0];
                    ConfigSelection::Fallback(*config, self.entry(*slot))
                } else {
                    ConfigSelection::Found(Vec::new())
                }
            }
            _ => ConfigSelection::Found(all()),
        }
    }

    /// Unresolved entries of `rid`: the one for `config`, or all of them.
    ///
    /// A default-config request for a resource without a default entry falls
    /// back to its first configuration.
    pub fn res_configs(
        &self,
        rid: u32,
        config: Option<&ResTableConfig>,
    ) -> Vec<(ResTableConfig, &ResTableEntry)> {
        match self.select_configs(rid, config) {
            ConfigSelection::Missing => {
                info!("[arsc] resource 0x{rid:08x} not found");
                Vec::new()
            }
            ConfigSelection::Found(found) => found,
            ConfigSelection::Fallback(config, entry) => vec![(config, entry)],
        }
    }
}

/// Read the next child chunk header before `parent_end`.
///
/// Returns `None` when no further prologue fits, or with a warning when the
/// child would cross the end of its parent.
fn next_child(
    cursor: &mut ByteCursor<'_>,
    parent_end: usize,
    diagnostics: &mut Diagnostics,
) -> FormatResult<Option<ChunkHeader>> {
    if cursor.position() + CHUNK_PROLOGUE_SIZE > parent_end {
        return Ok(None);
    }
    let child = ChunkHeader::parse(cursor, None)?;
    if child.end() > parent_end {
        diagnostics.warn(
            WarningKind::ChunkOutOfBounds,
            Some(child.start),
            format!(
                "chunk 0x{:04x} ends at 0x{:x}, past its parent's end 0x{parent_end:x}",
                child.chunk_type,
                child.end()
            ),
        );
        return Ok(None);
    }
    Ok(Some(child))
}

fn read_package_name(raw: &[u8]) -> String {
    let units = raw
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|unit| *unit != 0);
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Parse a key or type pool located `offset` bytes into the package.
fn parse_package_pool(
    cursor: &mut ByteCursor<'_>,
    package: &ChunkHeader,
    offset: u32,
    what: &str,
    diagnostics: &mut Diagnostics,
) -> FormatResult<(StringPool, usize)> {
    if offset == 0 {
        diagnostics.warn(
            WarningKind::CountMismatch,
            Some(package.start),
            format!("package has no {what} string pool"),
        );
        return Ok((StringPool::empty(), package.body_start()));
    }
    let at = package.start.saturating_add(offset as usize);
    if at >= package.end() {
        return Err(FormatError::malformed(
            package.start,
            format!("{what} string pool offset 0x{offset:x} lies outside the package"),
        ));
    }
    cursor.seek(at)?;
    let mut scoped = cursor.bounded(package.end())?;
    let header = ChunkHeader::parse(&mut scoped, Some(RES_STRING_POOL_TYPE))?;
    let pool = StringPool::parse(&mut scoped, &header)?;
    diagnostics.extend(pool.diagnostics().clone());
    Ok((pool, header.end()))
}

fn parse_package(
    cursor: &mut ByteCursor<'_>,
    header: &ChunkHeader,
    diagnostics: &mut Diagnostics,
) -> FormatResult<ArscPackage> {
    let mut fields = cursor.bounded(header.body_start())?;
    let id = fields.read_u32()?;
    let name = read_package_name(fields.read_bytes(PACKAGE_NAME_BYTES)?);
    let type_strings_offset = fields.read_u32()?;
    let last_public_type = fields.read_u32()?;
    let key_strings_offset = fields.read_u32()?;
    let last_public_key = fields.read_u32()?;
    let type_id_offset = if header.header_size >= PACKAGE_HEADER_WITH_TYPE_ID_OFFSET {
        fields.read_u32()?
    } else {
        0
    };
    if id == 0 || id > 0xff {
        diagnostics.warn(
            WarningKind::InvalidId,
            Some(header.start),
            format!("package '{name}' has id 0x{id:x}"),
        );
    }

    let (type_strings, type_end) =
        parse_package_pool(cursor, header, type_strings_offset, "type", diagnostics)?;
    let (key_strings, key_end) =
        parse_package_pool(cursor, header, key_strings_offset, "key", diagnostics)?;

    let mut package = ArscPackage {
        id,
        name,
        last_public_type,
        last_public_key,
        type_id_offset,
        type_strings,
        key_strings,
        type_specs: Vec::new(),
        types: Vec::new(),
    };

    cursor.seek(type_end.max(key_end).max(header.body_start()))?;
    while let Some(child) = next_child(cursor, header.end(), diagnostics)? {
        match child.kind() {
            ChunkKind::TableTypeSpec => {
                if let Some(spec) = parse_type_spec(cursor, &child, diagnostics)? {
                    package.type_specs.push(spec);
                }
            }
            ChunkKind::TableType => {
                if let Some(ty) = parse_type(cursor, &child, package.id, diagnostics)? {
                    package.types.push(ty);
                }
            }
            ChunkKind::TableLibrary
            | ChunkKind::TableOverlayable
            | ChunkKind::TableOverlayablePolicy
            | ChunkKind::TableStagedAlias => diagnostics.warn(
                WarningKind::UnknownChunk,
                Some(child.start),
                format!("{:?} chunks are not supported, skipped", child.kind()),
            ),
            other => diagnostics.warn(
                WarningKind::UnknownChunk,
                Some(child.start),
                format!("skipping unexpected {other:?} chunk in package"),
            ),
        }
        cursor.seek(child.end())?;
    }
    Ok(package)
}

fn parse_type_spec(
    cursor: &mut ByteCursor<'_>,
    header: &ChunkHeader,
    diagnostics: &mut Diagnostics,
) -> FormatResult<Option<ResTypeSpec>> {
    let mut body = cursor.bounded(header.end())?;
    body.seek(header.fields_start())?;
    let id = body.read_u8()?;
    let res0 = body.read_u8()?;
    let types_count = body.read_u16()?;
    let entry_count = body.read_u32()? as usize;

    if id == 0 {
        diagnostics.warn(WarningKind::InvalidId, Some(header.start), "type spec with id 0 skipped");
        return Ok(None);
    }
    if res0 != 0 {
        diagnostics.warn(
            WarningKind::ReservedFieldSet,
            Some(header.start + 9),
            format!("type spec res0 is 0x{res0:02x}"),
        );
    }

    body.seek(header.body_start())?;
    let available = body.remaining() / 4;
    if entry_count > available {
        diagnostics.warn(
            WarningKind::CountMismatch,
            Some(header.start),
            format!("type spec declares {entry_count} entries but has room for {available}"),
        );
    }
    let count = entry_count.min(available);
    let mut flags = Vec::with_capacity(count);
    for _ in 0..count {
        flags.push(TypeSpecFlags::from_bits_retain(body.read_u32()?));
    }
    Ok(Some(ResTypeSpec {
        id,
        types_count,
        flags,
    }))
}

fn parse_type(
    cursor: &mut ByteCursor<'_>,
    header: &ChunkHeader,
    package_id: u32,
    diagnostics: &mut Diagnostics,
) -> FormatResult<Option<ResType>> {
    let mut body = cursor.bounded(header.end())?;
    body.seek(header.fields_start())?;
    let id = body.read_u8()?;
    let flags = TypeFlags::from_bits_retain(body.read_u8()?);
    let reserved = body.read_u16()?;
    let entry_count = body.read_u32()? as usize;
    let entries_start = body.read_u32()? as usize;
    let config = ResTableConfig::read(&mut body)?;

    if id == 0 {
        diagnostics.warn(
            WarningKind::InvalidId,
            Some(header.start),
            "type chunk with id 0 skipped",
        );
        return Ok(None);
    }
    if reserved != 0 {
        diagnostics.warn(
            WarningKind::ReservedFieldSet,
            Some(header.start + 10),
            format!("type chunk reserved field is 0x{reserved:04x}"),
        );
    }

    let table_start = header.body_start().max(header.fields_start() + TYPE_FIELDS_SIZE);
    let entries_at = header.start.saturating_add(entries_start);
    if entries_at < table_start || entries_at > header.end() {
        return Err(FormatError::malformed(
            header.start,
            format!("entries start 0x{entries_start:x} lies outside the type chunk"),
        ));
    }

    let width = if flags.contains(TypeFlags::OFFSET16) && !flags.contains(TypeFlags::SPARSE) {
        2
    } else {
        4
    };
    let available = (entries_at - table_start) / width;
    if entry_count > available {
        diagnostics.warn(
            WarningKind::CountMismatch,
            Some(header.start),
            format!(
                "type chunk declares {entry_count} entries but its offset table holds {available}"
            ),
        );
    }
    let count = entry_count.min(available);

    body.seek(table_start)?;
    let mut offsets = Vec::with_capacity(count);
    for index in 0..count {
        let slot = if flags.contains(TypeFlags::SPARSE) {
            let index = body.read_u16()? as u32;
            Some((index, body.read_u16()? as usize * 4))
        } else if flags.contains(TypeFlags::OFFSET16) {
            match body.read_u16()? {
                0xffff => None,
                offset => Some((index as u32, offset as usize * 4)),
            }
        } else {
            match body.read_u32()? {
                NO_ENTRY => None,
                offset => Some((index as u32, offset as usize)),
            }
        };
        offsets.extend(slot);
    }

    let base_id = (package_id & 0xff) << 24 | (id as u32) << 16;
    let mut entries: Vec<ResTableEntry> = Vec::with_capacity(offsets.len());
    let mut parsed: HashMap<usize, usize> = HashMap::new();
    for (index, offset) in offsets {
        let rid = base_id | (index & 0xffff);
        if let Some(&first) = parsed.get(&offset) {
            let alias = ResTableEntry {
                id: rid,
                ..entries[first].clone()
            };
            entries.push(alias);
            continue;
        }
        let at = entries_at.saturating_add(offset);
        if at >= header.end() {
            diagnostics.warn(
                WarningKind::ChunkOutOfBounds,
                Some(header.start),
                format!("entry {index} at 0x{at:x} lies past the end of its type chunk"),
            );
            continue;
        }
        body.seek(at)?;
        parsed.insert(offset, entries.len());
        entries.push(read_entry(&mut body, rid, diagnostics)?);
    }

    Ok(Some(ResType {
        id,
        flags,
        config,
        entries,
    }))
}

fn read_value(
    cursor: &mut ByteCursor<'_>,
    diagnostics: &mut Diagnostics,
) -> FormatResult<ResValue> {
    let at = cursor.position();
    let value = ResValue::read(cursor)?;
    if value.res0 != 0 {
        diagnostics.warn(
            WarningKind::ReservedFieldSet,
            Some(at + 2),
            format!("value res0 is 0x{:02x}", value.res0),
        );
    }
    Ok(value)
}

fn read_entry(
    cursor: &mut ByteCursor<'_>,
    id: u32,
    diagnostics: &mut Diagnostics,
) -> FormatResult<ResTableEntry> {
    let at = cursor.position();
    let size = cursor.read_u16()?;
    let raw_flags = cursor.read_u16()?;
    let flags = EntryFlags::from_bits_retain(raw_flags & 0x00ff);

    if flags.contains(EntryFlags::COMPACT) {
        let value = ResValue {
            size: RES_VALUE_SIZE,
            res0: 0,
            data_type: (raw_flags >> 8) as u8,
            data: cursor.read_u32()?,
        };
        return Ok(ResTableEntry {
            id,
            key: size as u32,
            flags,
            body: EntryBody::Simple(value),
        });
    }

    let key = cursor.read_u32()?;
    let body = if flags.contains(EntryFlags::COMPLEX) {
        let parent = cursor.read_u32()?;
        let count = cursor.read_u32()? as usize;
        if count > cursor.remaining() / MAP_ITEM_SIZE {
            return Err(FormatError::malformed(
                at,
                format!("complex entry declares {count} items, more than its chunk can hold"),
            ));
        }
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            let name = cursor.read_u32()?;
            items.push((name, read_value(cursor, diagnostics)?));
        }
        EntryBody::Complex {
            parent,
            items: items.into(),
        }
    } else {
        EntryBody::Simple(read_value(cursor, diagnostics)?)
    };
    Ok(ResTableEntry {
        id,
        key,
        flags,
        body,
    })
}
