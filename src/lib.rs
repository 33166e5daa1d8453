//! # arscxml
//!
//! A library for reading the compiled resources found inside Android APKs:
//! binary XML documents (`AndroidManifest.xml`, layouts) and the resource
//! table (`resources.arsc`).
//!
//! Parsing works on an in-memory byte slice. Structural corruption is
//! reported as a [`FormatError`]; anomalies a device would tolerate are
//! recorded as [`Warning`]s, and the ones typical of packers and obfuscators
//! raise a "tampered" flag.
//!
//! # Examples
//!
//! ```no_run
//!  use arscxml::parse_axml;
//!
//!  let bytes = std::fs::read("AndroidManifest.xml").unwrap();
//!  let tree = parse_axml(&bytes).unwrap();
//!  println!("package: {:?}", tree.package_name());
//!  println!("{}", tree.to_xml(true).unwrap());
//! ```

pub use crate::arsc::ResourceTable;
pub use crate::axml::XmlTree;
pub use crate::diagnostics::{Diagnostics, Warning, WarningKind};
pub use crate::error::{FormatError, FormatResult};

pub mod arsc;
pub mod axml;
pub mod chunk;
pub mod diagnostics;
pub mod error;
pub mod string_pool;
mod tests;
pub mod value;

/// Parse a compiled binary XML document into an element tree.
pub fn parse_axml(bytes: &[u8]) -> FormatResult<XmlTree> {
    XmlTree::parse(bytes)
}

/// Parse a `resources.arsc` resource table.
pub fn parse_arsc(bytes: &[u8]) -> FormatResult<ResourceTable> {
    ResourceTable::parse(bytes)
}
