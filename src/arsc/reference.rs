//! Textual resource references as they appear in decoded attribute values.

use crate::error::{FormatError, FormatResult};
use nom::bytes::complete::{tag, take_till1, take_while_m_n};
use nom::character::complete::char;
use nom::combinator::{eof, map_res, opt};
use nom::sequence::{terminated, tuple};
use nom::{IResult, Parser};

fn parse_package(input: &str) -> IResult<&str, &str> {
    terminated(take_till1(|c: char| c == ':'), char(':')).parse(input)
}

fn parse_hex_id(input: &str) -> IResult<&str, u32> {
    map_res(
        take_while_m_n(8, 8, |c: char| c.is_ascii_hexdigit()),
        |digits: &str| u32::from_str_radix(digits, 16),
    )
    .parse(input)
}

fn parse_reference(input: &str) -> IResult<&str, (u32, Option<&str>)> {
    let (input, (_, package, id, _)) =
        tuple((tag("@"), opt(parse_package), parse_hex_id, eof)).parse(input)?;
    Ok((input, (id, package)))
}

/// Parse `@[package:]DEADBEEF` into the id and the optional package name.
pub fn parse_resource_ref(name: &str) -> FormatResult<(u32, Option<String>)> {
    if !name.starts_with('@') {
        return Err(FormatError::InvalidReference(format!(
            "'{name}' does not start with '@'"
        )));
    }
    match parse_reference(name) {
        Ok((_, (id, package))) => Ok((id, package.map(str::to_string))),
        Err(_) => Err(FormatError::InvalidReference(format!(
            "'{name}' is not of the form @[package:]XXXXXXXX"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_qualified_ids() {
        assert_eq!(parse_resource_ref("@7F040001").unwrap(), (0x7f04_0001, None));
        assert_eq!(
            parse_resource_ref("@android:01010000").unwrap(),
            (0x0101_0000, Some("android".to_string()))
        );
        assert_eq!(
            parse_resource_ref("@com.example:7f0a00ff").unwrap(),
            (0x7f0a_00ff, Some("com.example".to_string()))
        );
    }

    #[test]
    fn rejects_malformed_ids() {
        for bad in ["7F040001", "@7F04", "@7F0400011", "@android:XYZ00000", "@:7F040001", "@"] {
            assert!(
                matches!(parse_resource_ref(bad), Err(FormatError::InvalidReference(_))),
                "{bad} should be rejected"
            );
        }
    }
}
