//! Typed values (`Res_value`) and their textual rendering.

use crate::chunk::ByteCursor;
use crate::error::FormatResult;
use crate::string_pool::StringPool;
use serde::{Deserialize, Serialize};

pub const TYPE_NULL: u8 = 0x00;
pub const TYPE_REFERENCE: u8 = 0x01;
pub const TYPE_ATTRIBUTE: u8 = 0x02;
pub const TYPE_STRING: u8 = 0x03;
pub const TYPE_FLOAT: u8 = 0x04;
pub const TYPE_DIMENSION: u8 = 0x05;
pub const TYPE_FRACTION: u8 = 0x06;
pub const TYPE_DYNAMIC_REFERENCE: u8 = 0x07;
pub const TYPE_DYNAMIC_ATTRIBUTE: u8 = 0x08;
pub const TYPE_FIRST_INT: u8 = 0x10;
pub const TYPE_INT_DEC: u8 = 0x10;
pub const TYPE_INT_HEX: u8 = 0x11;
pub const TYPE_INT_BOOLEAN: u8 = 0x12;
pub const TYPE_FIRST_COLOR_INT: u8 = 0x1c;
pub const TYPE_INT_COLOR_ARGB8: u8 = 0x1c;
pub const TYPE_INT_COLOR_RGB8: u8 = 0x1d;
pub const TYPE_INT_COLOR_ARGB4: u8 = 0x1e;
pub const TYPE_INT_COLOR_RGB4: u8 = 0x1f;
pub const TYPE_LAST_COLOR_INT: u8 = 0x1f;
pub const TYPE_LAST_INT: u8 = 0x1f;

pub const RADIX_MULTS: [f64; 4] = [0.00390625, 3.051758E-005, 1.192093E-007, 4.656613E-010];
pub const DIMENSION_UNITS: [&str; 6] = ["px", "dip", "sp", "pt", "in", "mm"];
pub const FRACTION_UNITS: [&str; 2] = ["%", "%p"];
const COMPLEX_UNIT_MASK: u32 = 0x0F;

/// Size in bytes of a serialized `Res_value`.
pub const RES_VALUE_SIZE: u16 = 8;

/// A `Res_value` record: `u16 size | u8 res0 | u8 data_type | u32 data`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResValue {
    pub size: u16,
    pub res0: u8,
    pub data_type: u8,
    pub data: u32,
}

impl ResValue {
    pub fn read(cursor: &mut ByteCursor<'_>) -> FormatResult<ResValue> {
        Ok(ResValue {
            size: cursor.read_u16()?,
            res0: cursor.read_u8()?,
            data_type: cursor.read_u8()?,
            data: cursor.read_u32()?,
        })
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.data_type, TYPE_REFERENCE | TYPE_DYNAMIC_REFERENCE)
    }

    /// Render with strings looked up in `pool`.
    pub fn format(&self, pool: &StringPool) -> String {
        format_value(self.data_type, self.data, |idx| pool.get(idx as usize).to_string())
    }
}

/// Decode the mantissa of a complex (dimension or fraction) value.
pub fn complex_to_float(complex: u32) -> f64 {
    (complex & 0xFFFF_FF00) as f64 * RADIX_MULTS[((complex >> 4) & 3) as usize]
}

/// False when a dimension or fraction names a unit outside its unit table.
pub fn has_valid_unit(data_type: u8, data: u32) -> bool {
    let unit = (data & COMPLEX_UNIT_MASK) as usize;
    match data_type {
        TYPE_DIMENSION => unit < DIMENSION_UNITS.len(),
        TYPE_FRACTION => unit < FRACTION_UNITS.len(),
        _ => true,
    }
}

fn fmt_package(data: u32) -> &'static str {
    if data >> 24 == 1 {
        "android:"
    } else {
        ""
    }
}

fn fmt_float(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        format!("{value:.6}")
    }
}

/// Render a typed value as text.
///
/// Never fails: unknown types yield a placeholder carrying the raw type and
/// data, and a unit index outside the unit table keeps the raw data.
pub fn format_value<F>(data_type: u8, data: u32, lookup_string: F) -> String
where
    F: FnOnce(u32) -> String,
{
    match data_type {
        TYPE_STRING => lookup_string(data),
        TYPE_ATTRIBUTE => format!("?{}{:08X}", fmt_package(data), data),
        TYPE_REFERENCE => format!("@{}{:08X}", fmt_package(data), data),
        TYPE_FLOAT => fmt_float(f32::from_bits(data) as f64),
        TYPE_INT_HEX => format!("0x{data:08X}"),
        TYPE_INT_BOOLEAN => {
            if data == 0 {
                "false".to_string()
            } else {
                "true".to_string()
            }
        }
        TYPE_DIMENSION => match DIMENSION_UNITS.get((data & COMPLEX_UNIT_MASK) as usize) {
            Some(unit) => format!("{}{}", fmt_float(complex_to_float(data)), unit),
            None => data.to_string(),
        },
        TYPE_FRACTION => match FRACTION_UNITS.get((data & COMPLEX_UNIT_MASK) as usize) {
            Some(unit) => format!("{}{}", fmt_float(complex_to_float(data) * 100.0), unit),
            None => data.to_string(),
        },
        TYPE_FIRST_COLOR_INT..=TYPE_LAST_COLOR_INT => format!("#{data:08X}"),
        TYPE_FIRST_INT..=TYPE_LAST_INT => (data as i32).to_string(),
        _ => format!("<0x{data:X}, type 0x{data_type:02X}>"),
    }
}
