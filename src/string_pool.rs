//! `ResStringPool` decoding.
//!
//! Strings are decoded once, when the pool is parsed, and never change
//! afterwards. Style spans are decoded alongside them. Indices that share an
//! offset share one decoded value.

use crate::chunk::{ByteCursor, ChunkHeader, NO_ENTRY};
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::error::{FormatError, FormatResult};
use bitflags::bitflags;
use log::debug;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct StringPoolFlags: u32 {
        const SORTED = 0x0000_0001;
        const UTF8 = 0x0000_0100;
    }
}

/// Fixed part of the pool header, prologue included.
pub const STRING_POOL_HEADER_SIZE: u16 = 0x1c;

/// Decoded text may not exceed this multiple of the pool's declared size.
const MAX_DECODED_RATIO: usize = 4;

/// Styling applied to characters `first_char..=last_char` of a string; `name`
/// is the pool index of the tag name (`b`, `i`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleSpan {
    pub name: u32,
    pub first_char: u32,
    pub last_char: u32,
}

#[derive(Clone, Debug, Default)]
pub struct StringPool {
    /// Distinct decoded strings, one per distinct offset.
    values: Vec<String>,
    /// Pool index to slot in `values`.
    strings: Vec<usize>,
    span_lists: Vec<Vec<StyleSpan>>,
    styles: Vec<usize>,
    flags: StringPoolFlags,
    diagnostics: Diagnostics,
}

impl StringPool {
    /// A pool with no strings, used where a document omits one.
    pub fn empty() -> Self {
        StringPool::default()
    }

    /// Decode the pool whose prologue has just been read into `header`.
    ///
    /// The cursor is left at the end of the chunk.
    pub fn parse(cursor: &mut ByteCursor<'_>, header: &ChunkHeader) -> FormatResult<StringPool> {
        let mut diagnostics = Diagnostics::scoped("strings");
        let mut fields = cursor.bounded(header.end())?;
        fields.seek(header.fields_start())?;

        let string_count = fields.read_u32()? as usize;
        let style_count = fields.read_u32()? as usize;
        let flags = StringPoolFlags::from_bits_retain(fields.read_u32()?);
        let strings_offset = fields.read_u32()? as usize;
        let styles_offset = fields.read_u32()? as usize;

        fields.seek(header.body_start().min(header.end()))?;
        let table_bytes = string_count
            .checked_add(style_count)
            .and_then(|n| n.checked_mul(4))
            .filter(|n| *n <= fields.remaining())
            .ok_or_else(|| {
                FormatError::malformed(
                    header.start,
                    format!(
                        "string pool declares {string_count} strings and {style_count} styles, \
                         more than its {} bytes can hold",
                        header.size
                    ),
                )
            })?;
        debug!(
            "[strings] pool at 0x{:x}: {string_count} strings, {style_count} styles, {table_bytes} offset bytes",
            header.start
        );

        let mut string_offsets = Vec::with_capacity(string_count);
        for _ in 0..string_count {
            string_offsets.push(fields.read_u32()? as usize);
        }
        let mut style_offsets = Vec::with_capacity(style_count);
        for _ in 0..style_count {
            style_offsets.push(fields.read_u32()? as usize);
        }

        if style_count == 0 && styles_offset != 0 {
            diagnostics.warn(
                WarningKind::StringPoolAnomaly,
                Some(header.start),
                "styles offset given but style count is zero",
            );
        }

        let has_styles = style_count != 0 && styles_offset != 0;
        let strings_end = if has_styles {
            header.start.saturating_add(styles_offset)
        } else {
            header.end()
        };
        let strings_start = header.start.saturating_add(strings_offset);

        let mut values: Vec<String> = Vec::new();
        let mut strings = Vec::with_capacity(string_count);
        if string_count > 0 {
            if strings_start > strings_end || strings_end > header.end() {
                return Err(FormatError::malformed(
                    header.start,
                    format!(
                        "string data 0x{strings_start:x}..0x{strings_end:x} is outside the pool"
                    ),
                ));
            }
            if (strings_end - strings_start) % 4 != 0 {
                diagnostics.warn(
                    WarningKind::StringPoolAnomaly,
                    Some(strings_start),
                    "size of string data is not aligned to four bytes",
                );
            }

            let mut chars = cursor.bounded(strings_end)?;
            let is_utf8 = flags.contains(StringPoolFlags::UTF8);
            let budget = (header.size as usize).saturating_mul(MAX_DECODED_RATIO);
            let mut decoded = 0usize;
            let mut slots: HashMap<usize, usize> = HashMap::new();
            let mut bad_lengths = 0usize;
            for (index, offset) in string_offsets.into_iter().enumerate() {
                if let Some(slot) = slots.get(&offset) {
                    strings.push(*slot);
                    continue;
                }
                let at = strings_start.checked_add(offset).ok_or_else(|| {
                    FormatError::malformed(header.start, format!("string {index} offset overflows"))
                })?;
                chars.seek(at)?;
                let (text, length_ok) = if is_utf8 {
                    decode_utf8(&mut chars, index)?
                } else {
                    decode_utf16(&mut chars, index)?
                };
                if !length_ok {
                    bad_lengths += 1;
                }
                decoded = decoded.saturating_add(text.len());
                if decoded > budget {
                    return Err(FormatError::malformed(
                        header.start,
                        format!(
                            "strings decode to more than {budget} bytes from a {} byte pool",
                            header.size
                        ),
                    ));
                }
                slots.insert(offset, values.len());
                strings.push(values.len());
                values.push(text);
            }
            if bad_lengths > 0 {
                diagnostics.warn(
                    WarningKind::StringPoolAnomaly,
                    Some(header.start),
                    format!("{bad_lengths} strings decode to a length other than declared"),
                );
            }
        }

        let (span_lists, styles) = if has_styles {
            let styles_start = header.start.saturating_add(styles_offset);
            if styles_start > header.end() {
                diagnostics.warn(
                    WarningKind::StringPoolAnomaly,
                    Some(header.start),
                    "styles offset lies outside the pool; styles ignored",
                );
                (Vec::new(), Vec::new())
            } else {
                if (header.end() - styles_start) % 4 != 0 {
                    diagnostics.warn(
                        WarningKind::StringPoolAnomaly,
                        Some(styles_start),
                        "size of style data is not aligned to four bytes",
                    );
                }
                match decode_styles(cursor, header, styles_start, &style_offsets) {
                    Ok(styles) => styles,
                    Err(err) => {
                        diagnostics.warn(
                            WarningKind::StringPoolAnomaly,
                            err.offset(),
                            format!("style data unreadable, styles ignored: {err}"),
                        );
                        (Vec::new(), Vec::new())
                    }
                }
            }
        } else {
            (Vec::new(), Vec::new())
        };

        cursor.seek(header.end())?;
        Ok(StringPool {
            values,
            strings,
            span_lists,
            styles,
            flags,
            diagnostics,
        })
    }

    /// The string at `idx`, or `""` when the index is out of range.
    pub fn get(&self, idx: usize) -> &str {
        self.try_get(idx).unwrap_or("")
    }

    pub fn try_get(&self, idx: usize) -> Option<&str> {
        self.strings.get(idx).map(|slot| self.values[*slot].as_str())
    }

    /// Like [`StringPool::try_get`] for raw u32 indices, treating `0xFFFFFFFF` as absent.
    pub fn lookup(&self, idx: u32) -> Option<&str> {
        if idx == NO_ENTRY {
            return None;
        }
        self.try_get(idx as usize)
    }

    /// Style spans applied to string `idx`, if any were declared.
    pub fn style(&self, idx: usize) -> Option<&[StyleSpan]> {
        self.styles.get(idx).map(|slot| self.span_lists[*slot].as_slice())
    }

    pub fn style_count(&self) -> usize {
        self.styles.len()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn is_utf8(&self) -> bool {
        self.flags.contains(StringPoolFlags::UTF8)
    }

    pub fn flags(&self) -> StringPoolFlags {
        self.flags
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(|slot| self.values[*slot].as_str())
    }

    /// Index of the first string equal to `value`.
    pub fn position(&self, value: &str) -> Option<usize> {
        self.iter().position(|s| s == value)
    }

    /// Number of distinct decoded strings backing the pool.
    pub fn distinct_len(&self) -> usize {
        self.values.len()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
}

fn read_utf8_length(cursor: &mut ByteCursor<'_>) -> FormatResult<usize> {
    let first = cursor.read_u8()?;
    if first & 0x80 == 0 {
        Ok(first as usize)
    } else {
        let second = cursor.read_u8()?;
        Ok((((first & 0x7F) as usize) << 8) | second as usize)
    }
}

fn read_utf16_length(cursor: &mut ByteCursor<'_>) -> FormatResult<usize> {
    let first = cursor.read_u16()?;
    if first & 0x8000 == 0 {
        Ok(first as usize)
    } else {
        let second = cursor.read_u16()?;
        Ok((((first & 0x7FFF) as usize) << 16) | second as usize)
    }
}

/// Returns the decoded string and whether its UTF-16 length matched the declared one.
fn decode_utf8(cursor: &mut ByteCursor<'_>, index: usize) -> FormatResult<(String, bool)> {
    let start = cursor.position();
    let char_len = read_utf8_length(cursor)?;
    let byte_len = read_utf8_length(cursor)?;
    let bytes = cursor.read_bytes(byte_len)?;
    match cursor.read_u8() {
        Ok(0) => {}
        _ => return Err(FormatError::UnterminatedString { index, offset: start }),
    }

    let text: Cow<'_, str> = match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => match cesu8::from_java_cesu8(bytes) {
            Ok(text) => text,
            Err(_) => String::from_utf8_lossy(bytes),
        },
    };
    let length_ok = text.encode_utf16().count() == char_len;
    Ok((text.into_owned(), length_ok))
}

fn decode_utf16(cursor: &mut ByteCursor<'_>, index: usize) -> FormatResult<(String, bool)> {
    let start = cursor.position();
    let char_len = read_utf16_length(cursor)?;
    let byte_len = char_len.checked_mul(2).ok_or(FormatError::Truncated {
        offset: cursor.position(),
        needed: usize::MAX,
    })?;
    let bytes = cursor.read_bytes(byte_len)?;
    match cursor.read_u16() {
        Ok(0) => {}
        _ => return Err(FormatError::UnterminatedString { index, offset: start }),
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Ok((String::from_utf16_lossy(&units), true))
}

const STYLE_SPAN_END: u32 = 0xFFFF_FFFF;

fn decode_styles(
    cursor: &ByteCursor<'_>,
    header: &ChunkHeader,
    styles_start: usize,
    style_offsets: &[usize],
) -> FormatResult<(Vec<Vec<StyleSpan>>, Vec<usize>)> {
    let mut reader = cursor.bounded(header.end())?;
    let mut span_lists = Vec::new();
    let mut styles = Vec::with_capacity(style_offsets.len());
    let mut slots: HashMap<usize, usize> = HashMap::new();
    for offset in style_offsets {
        if let Some(slot) = slots.get(offset) {
            styles.push(*slot);
            continue;
        }
        let at = styles_start
            .checked_add(*offset)
            .ok_or_else(|| FormatError::malformed(styles_start, "style offset overflows"))?;
        reader.seek(at)?;
        let mut spans = Vec::new();
        loop {
            let name = reader.read_u32()?;
            if name == STYLE_SPAN_END {
                break;
            }
            let first_char = reader.read_u32()?;
            let last_char = reader.read_u32()?;
            spans.push(StyleSpan {
                name,
                first_char,
                last_char,
            });
        }
        slots.insert(*offset, span_lists.len());
        styles.push(span_lists.len());
        span_lists.push(spans);
    }
    Ok((span_lists, styles))
}
