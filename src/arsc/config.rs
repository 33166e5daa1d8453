//! `ResTable_config`: the device characteristics a resource variant targets.

use crate::chunk::ByteCursor;
use crate::error::{FormatError, FormatResult};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

const MASK_LAYOUTDIR: u8 = 0xC0;
const LAYOUTDIR_LTR: u8 = 0x40;
const LAYOUTDIR_RTL: u8 = 0x80;

const MASK_SCREENSIZE: u8 = 0x0F;
const SCREENSIZE_SMALL: u8 = 0x01;
const SCREENSIZE_NORMAL: u8 = 0x02;
const SCREENSIZE_LARGE: u8 = 0x03;
const SCREENSIZE_XLARGE: u8 = 0x04;

const MASK_SCREENLONG: u8 = 0x30;
const SCREENLONG_NO: u8 = 0x10;
const SCREENLONG_YES: u8 = 0x20;

const TOUCHSCREEN_NOTOUCH: u8 = 1;
const TOUCHSCREEN_STYLUS: u8 = 2;
const TOUCHSCREEN_FINGER: u8 = 3;

pub const DENSITY_DEFAULT: u16 = 0;
pub const DENSITY_LOW: u16 = 120;
pub const DENSITY_MEDIUM: u16 = 160;
pub const DENSITY_TV: u16 = 213;
pub const DENSITY_HIGH: u16 = 240;
pub const DENSITY_XHIGH: u16 = 320;
pub const DENSITY_XXHIGH: u16 = 480;
pub const DENSITY_XXXHIGH: u16 = 640;
pub const DENSITY_ANY: u16 = 0xFFFE;
pub const DENSITY_NONE: u16 = 0xFFFF;

/// Smallest config that still carries the fixed fields up to `version`.
const CONFIG_MIN_SIZE: u32 = 28;

/// A decoded `ResTable_config`.
///
/// The struct grew across platform versions, so `screen_layout` and later
/// fields are only read when the declared `size` covers them. Equality and
/// hashing ignore `size`.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ResTableConfig {
    pub size: u32,
    pub mcc: u16,
    pub mnc: u16,
    /// Two ASCII letters, or a packed three-letter code when the high bit is set.
    pub language: [u8; 2],
    pub country: [u8; 2],
    pub orientation: u8,
    pub touchscreen: u8,
    pub density: u16,
    pub keyboard: u8,
    pub navigation: u8,
    pub input_flags: u8,
    pub input_pad0: u8,
    pub screen_width: u16,
    pub screen_height: u16,
    pub sdk_version: u16,
    pub minor_version: u16,
    pub screen_layout: u8,
    pub ui_mode: u8,
    pub smallest_screen_width_dp: u16,
    pub screen_width_dp: u16,
    pub screen_height_dp: u16,
    pub screen_layout2: u8,
    pub color_mode: u8,
    pub screen_config_pad2: u16,
}

impl ResTableConfig {
    /// The configuration that matches every device.
    pub fn default_config() -> Self {
        ResTableConfig::default()
    }

    /// Read a config at the cursor, consuming exactly its declared size.
    pub fn read(cursor: &mut ByteCursor<'_>) -> FormatResult<ResTableConfig> {
        let start = cursor.position();
        let size = cursor.read_u32()?;
        if size < CONFIG_MIN_SIZE {
            return Err(FormatError::malformed(
                start,
                format!("config declares size {size}, smaller than {CONFIG_MIN_SIZE}"),
            ));
        }
        let end = start
            .checked_add(size as usize)
            .filter(|end| *end <= cursor.len())
            .ok_or(FormatError::Truncated {
                offset: start,
                needed: size as usize,
            })?;
        let mut fields = cursor.bounded(end)?;

        let mut config = ResTableConfig {
            size,
            mcc: fields.read_u16()?,
            mnc: fields.read_u16()?,
            language: [fields.read_u8()?, fields.read_u8()?],
            country: [fields.read_u8()?, fields.read_u8()?],
            orientation: fields.read_u8()?,
            touchscreen: fields.read_u8()?,
            density: fields.read_u16()?,
            keyboard: fields.read_u8()?,
            navigation: fields.read_u8()?,
            input_flags: fields.read_u8()?,
            input_pad0: fields.read_u8()?,
            screen_width: fields.read_u16()?,
            screen_height: fields.read_u16()?,
            sdk_version: fields.read_u16()?,
            minor_version: fields.read_u16()?,
            ..ResTableConfig::default()
        };
        if size >= 32 {
            config.screen_layout = fields.read_u8()?;
            config.ui_mode = fields.read_u8()?;
            config.smallest_screen_width_dp = fields.read_u16()?;
        }
        if size >= 36 {
            config.screen_width_dp = fields.read_u16()?;
            config.screen_height_dp = fields.read_u16()?;
        }
        if size >= 40 {
            config.screen_layout2 = fields.read_u8()?;
            config.color_mode = fields.read_u8()?;
            config.screen_config_pad2 = fields.read_u16()?;
        }
        if !fields.is_at_end() {
            debug!(
                "[arsc] skipping {} padding bytes of config at 0x{start:x}",
                fields.remaining()
            );
        }
        cursor.seek(end)?;
        Ok(config)
    }

    fn words(&self) -> [u32; 9] {
        [
            self.mcc as u32 | (self.mnc as u32) << 16,
            u32::from_le_bytes([
                self.language[0],
                self.language[1],
                self.country[0],
                self.country[1],
            ]),
            self.orientation as u32 | (self.touchscreen as u32) << 8 | (self.density as u32) << 16,
            u32::from_le_bytes([self.keyboard, self.navigation, self.input_flags, self.input_pad0]),
            self.screen_width as u32 | (self.screen_height as u32) << 16,
            self.sdk_version as u32 | (self.minor_version as u32) << 16,
            self.screen_layout as u32
                | (self.ui_mode as u32) << 8
                | (self.smallest_screen_width_dp as u32) << 16,
            self.screen_width_dp as u32 | (self.screen_height_dp as u32) << 16,
            self.screen_layout2 as u32
                | (self.color_mode as u32) << 8
                | (self.screen_config_pad2 as u32) << 16,
        ]
    }

    /// True when every field is "any".
    pub fn is_default(&self) -> bool {
        self.words().iter().all(|w| *w == 0)
    }

    /// `en`, `en-rUS`, `fil-rPH`, or `""` for the default locale.
    pub fn language_and_region(&self) -> String {
        let language = unpack_code(self.language, b'a');
        let region = unpack_code(self.country, b'0');
        if region.is_empty() {
            language
        } else {
            format!("{language}-r{region}")
        }
    }

    /// The two raw language bytes as text, without unpacking three-letter codes.
    pub fn language(&self) -> String {
        raw_code(self.language)
    }

    pub fn country(&self) -> String {
        raw_code(self.country)
    }

    pub fn density(&self) -> u16 {
        self.density
    }

    pub fn sdk_version(&self) -> u16 {
        self.sdk_version
    }

    /// Set the locale from `ll`, `lll`, `ll-rRR` or `ll-RR`.
    ///
    /// Codes that are neither two nor three letters leave the field unset.
    pub fn with_locale(mut self, locale: &str) -> Self {
        let (language, region) = match locale.split_once('-') {
            Some((language, region)) => (language, region.strip_prefix('r').unwrap_or(region)),
            None => (locale, ""),
        };
        self.language = pack_code(language, b'a');
        self.country = pack_code(region, b'0');
        self
    }

    pub fn with_density(mut self, density: u16) -> Self {
        self.density = density;
        self
    }

    pub fn with_sdk_version(mut self, sdk_version: u16) -> Self {
        self.sdk_version = sdk_version;
        self
    }

    /// The resource directory qualifier, e.g. `de-rAT-xhdpi-v21`.
    ///
    /// Empty for the default configuration.
    pub fn qualifier(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if self.mcc != 0 {
            parts.push(format!("mcc{}", self.mcc));
        }
        if self.mnc != 0 {
            parts.push(format!("mnc{}", self.mnc));
        }
        if self.language != [0, 0] || self.country != [0, 0] {
            parts.push(self.language_and_region());
        }

        match self.screen_layout & MASK_LAYOUTDIR {
            0 => {}
            LAYOUTDIR_LTR => parts.push("ldltr".into()),
            LAYOUTDIR_RTL => parts.push("ldrtl".into()),
            other => parts.push(format!("layoutDir_{other}")),
        }
        if self.smallest_screen_width_dp != 0 {
            parts.push(format!("sw{}dp", self.smallest_screen_width_dp));
        }
        if self.screen_width_dp != 0 {
            parts.push(format!("w{}dp", self.screen_width_dp));
        }
        if self.screen_height_dp != 0 {
            parts.push(format!("h{}dp", self.screen_height_dp));
        }
        match self.screen_layout & MASK_SCREENSIZE {
            0 => {}
            SCREENSIZE_SMALL => parts.push("small".into()),
            SCREENSIZE_NORMAL => parts.push("normal".into()),
            SCREENSIZE_LARGE => parts.push("large".into()),
            SCREENSIZE_XLARGE => parts.push("xlarge".into()),
            other => parts.push(format!("screenLayoutSize_{other}")),
        }
        match self.screen_layout & MASK_SCREENLONG {
            0 => {}
            SCREENLONG_NO => parts.push("notlong".into()),
            SCREENLONG_YES => parts.push("long".into()),
            other => parts.push(format!("screenLayoutLong_{other}")),
        }

        if self.density != DENSITY_DEFAULT {
            parts.push(density_name(self.density));
        }
        match self.touchscreen {
            0 => {}
            TOUCHSCREEN_NOTOUCH => parts.push("notouch".into()),
            TOUCHSCREEN_STYLUS => parts.push("stylus".into()),
            TOUCHSCREEN_FINGER => parts.push("finger".into()),
            other => parts.push(format!("touchscreen_{other}")),
        }
        if self.screen_width != 0 || self.screen_height != 0 {
            parts.push(format!("{}x{}", self.screen_width, self.screen_height));
        }
        if self.sdk_version != 0 || self.minor_version != 0 {
            if self.minor_version != 0 {
                parts.push(format!("v{}.{}", self.sdk_version, self.minor_version));
            } else {
                parts.push(format!("v{}", self.sdk_version));
            }
        }

        parts.join("-")
    }
}

fn density_name(density: u16) -> String {
    match density {
        DENSITY_LOW => "ldpi".into(),
        DENSITY_MEDIUM => "mdpi".into(),
        DENSITY_TV => "tvdpi".into(),
        DENSITY_HIGH => "hdpi".into(),
        DENSITY_XHIGH => "xhdpi".into(),
        DENSITY_XXHIGH => "xxhdpi".into(),
        DENSITY_XXXHIGH => "xxxhdpi".into(),
        DENSITY_ANY => "anydpi".into(),
        DENSITY_NONE => "nodpi".into(),
        other => format!("{other}dpi"),
    }
}

fn raw_code(code: [u8; 2]) -> String {
    code.iter()
        .take_while(|b| **b != 0)
        .map(|b| *b as char)
        .collect()
}

/// Decode a two-byte locale field. When the high bit of the first byte is
/// set the field packs three 5-bit letters relative to `base`.
fn unpack_code(code: [u8; 2], base: u8) -> String {
    if code[0] & 0x80 != 0 {
        let first = code[1] & 0x1f;
        let second = ((code[1] & 0xe0) >> 5) | ((code[0] & 0x03) << 3);
        let third = (code[0] & 0x7c) >> 2;
        [first, second, third]
            .iter()
            .map(|c| (c + base) as char)
            .collect()
    } else {
        code.iter()
            .filter(|b| **b != 0)
            .map(|b| *b as char)
            .collect()
    }
}

fn pack_code(code: &str, base: u8) -> [u8; 2] {
    let bytes = code.as_bytes();
    match bytes.len() {
        2 => [bytes[0], bytes[1]],
        3 => {
            let letter = |b: u8| b.wrapping_sub(base) & 0x1f;
            let (a, b, c) = (letter(bytes[0]), letter(bytes[1]), letter(bytes[2]));
            [0x80 | (c << 2) | (b >> 3), a | ((b & 0x07) << 5)]
        }
        _ => [0, 0],
    }
}

impl PartialEq for ResTableConfig {
    fn eq(&self, other: &Self) -> bool {
        self.words() == other.words()
    }
}

impl Eq for ResTableConfig {}

impl Hash for ResTableConfig {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.words().hash(state);
    }
}

impl fmt::Display for ResTableConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let qualifier = self.qualifier();
        if qualifier.is_empty() {
            f.write_str("default")
        } else {
            f.write_str(&qualifier)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_bytes(size: u32, words: &[u32]) -> Vec<u8> {
        let mut bytes = size.to_le_bytes().to_vec();
        for word in words {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes.resize(size as usize, 0);
        bytes
    }

    #[test]
    fn reads_only_declared_fields() {
        // A 28-byte config followed by bytes that must not be consumed.
        let mut bytes = config_bytes(28, &[0, u32::from_le_bytes(*b"deAT"), 240 << 16, 0, 0, 21]);
        bytes.extend_from_slice(&[0xAA; 8]);
        let mut cursor = ByteCursor::new(&bytes);
        let config = ResTableConfig::read(&mut cursor).unwrap();
        assert_eq!(cursor.position(), 28);
        assert_eq!(config.screen_layout, 0);
        assert_eq!(config.language_and_region(), "de-rAT");
        assert_eq!(config.qualifier(), "de-rAT-hdpi-v21");
    }

    #[test]
    fn skips_padding_of_larger_configs() {
        let bytes = config_bytes(64, &[0, 0, 0, 0, 0, 0, 0x0258_0000]);
        let mut cursor = ByteCursor::new(&bytes);
        let config = ResTableConfig::read(&mut cursor).unwrap();
        assert_eq!(cursor.position(), 64);
        assert_eq!(config.smallest_screen_width_dp, 600);
        assert_eq!(config.qualifier(), "sw600dp");
    }

    #[test]
    fn rejects_truncated_config() {
        let bytes = config_bytes(28, &[]);
        let mut cursor = ByteCursor::new(&bytes[..20]);
        assert!(ResTableConfig::read(&mut cursor).is_err());
        let small = config_bytes(16, &[]);
        assert!(ResTableConfig::read(&mut ByteCursor::new(&small)).is_err());
    }

    #[test]
    fn equality_ignores_size() {
        let small = ResTableConfig {
            size: 28,
            ..ResTableConfig::default().with_locale("fr")
        };
        let large = ResTableConfig {
            size: 64,
            ..ResTableConfig::default().with_locale("fr")
        };
        assert_eq!(small, large);
        assert!(ResTableConfig::default_config().is_default());
        assert!(!small.is_default());
    }

    #[test]
    fn three_letter_codes_round_trip() {
        let config = ResTableConfig::default_config().with_locale("fil-rPH");
        assert_ne!(config.language[0] & 0x80, 0);
        assert_eq!(config.language_and_region(), "fil-rPH");
        assert_eq!(ResTableConfig::default().with_locale("en-US").language_and_region(), "en-rUS");
        assert_eq!(ResTableConfig::default().language_and_region(), "");
    }

    #[test]
    fn renders_qualifiers() {
        let config = ResTableConfig {
            mcc: 310,
            screen_layout: LAYOUTDIR_RTL | SCREENSIZE_LARGE | SCREENLONG_YES,
            touchscreen: TOUCHSCREEN_FINGER,
            ..ResTableConfig::default()
                .with_density(DENSITY_NONE)
                .with_sdk_version(26)
        };
        assert_eq!(config.qualifier(), "mcc310-ldrtl-large-long-nodpi-finger-v26");
        assert_eq!(config.to_string(), config.qualifier());
        assert_eq!(ResTableConfig::default().to_string(), "default");
        assert_eq!(ResTableConfig::default().with_density(300).qualifier(), "300dpi");
    }
}
