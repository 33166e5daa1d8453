//! Compiled binary XML (AndroidManifest.xml, layouts and other res/xml files).

mod parser;
pub mod public_attrs;
mod tree;

pub use parser::{Attribute, AttributeName, AxmlEvent, AxmlParser};
pub use tree::{AxmlTreeBuilder, Element, XmlAttribute, XmlTree, ANDROID_NAMESPACE_URI};
