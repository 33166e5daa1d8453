use super::parser::{Attribute, AxmlEvent, AxmlParser};
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::error::{xml_error, FormatError, FormatResult};
use crate::value::{format_value, has_valid_unit, TYPE_STRING};
use log::debug;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const ANDROID_NAMESPACE_URI: &str = "http://schemas.android.com/apk/res/android";

/// A decoded attribute. `value` is the rendered text; the typed value it came
/// from is kept alongside.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlAttribute {
    pub namespace_uri: String,
    pub prefix: Option<String>,
    pub name: String,
    pub value: String,
    pub resource_id: Option<u32>,
    pub value_type: u8,
    pub data: u32,
}

impl XmlAttribute {
    pub fn qualified_name(&self) -> String {
        qualified_name(self.prefix.as_deref(), &self.name)
    }
}

/// An element of the decoded tree. Children are owned exclusively.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,
    pub namespace_uri: String,
    pub prefix: Option<String>,
    pub attributes: Vec<XmlAttribute>,
    pub children: Vec<Element>,
    pub text: Option<String>,
    /// Comment the compiler kept for this element.
    pub comment: Option<String>,
    /// Prefix to URI bindings in scope at this element.
    pub nsmap: Vec<(String, String)>,
    pub line: u32,
}

impl Element {
    pub fn qualified_name(&self) -> String {
        qualified_name(self.prefix.as_deref(), &self.tag)
    }

    /// Value of the attribute with the given qualified name, e.g. `android:name`.
    pub fn attribute(&self, qualified: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.qualified_name() == qualified)
            .map(|attr| attr.value.as_str())
    }

    pub fn find_child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.tag == tag)
    }

    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.tag == tag)
    }
}

fn qualified_name(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}:{local}"),
        None => local.to_string(),
    }
}

/// Builds an [`Element`] tree from parser events.
#[derive(Debug, Default)]
pub struct AxmlTreeBuilder {
    stack: Vec<Element>,
    root: Option<Element>,
    generated_prefixes: usize,
    /// Unusable document prefixes and the generated ones standing in for them.
    renamed_prefixes: HashMap<String, String>,
    stopped: bool,
}

impl AxmlTreeBuilder {
    pub fn new() -> Self {
        AxmlTreeBuilder::default()
    }

    /// Apply one event. Returns false once the builder will accept no more.
    pub fn handle(&mut self, parser: &mut AxmlParser<'_>, event: AxmlEvent) -> bool {
        if self.stopped {
            return false;
        }
        match event {
            AxmlEvent::StartDocument
            | AxmlEvent::StartNamespace { .. }
            | AxmlEvent::EndNamespace { .. } => {}
            AxmlEvent::StartElement {
                namespace_idx,
                name_idx,
                attributes,
                line,
                comment_idx,
                ..
            } => {
                if self.root.is_some() && self.stack.is_empty() {
                    parser.diagnostics_mut().warn(
                        WarningKind::UnbalancedElements,
                        None,
                        format!("element at line {line} follows the closed root; stopping"),
                    );
                    self.stopped = true;
                    return false;
                }
                let element = self.start_element(
                    parser,
                    namespace_idx,
                    name_idx,
                    &attributes,
                    line,
                    comment_idx,
                );
                self.stack.push(element);
            }
            AxmlEvent::EndElement {
                namespace_idx,
                name_idx,
            } => {
                let Some(element) = self.stack.pop() else {
                    parser.diagnostics_mut().warn(
                        WarningKind::UnbalancedElements,
                        None,
                        "end tag without an open element",
                    );
                    return true;
                };
                let uri = parser.string(namespace_idx).to_string();
                let raw_name = parser_string(parser, name_idx);
                let name = fix_name(parser.diagnostics_mut(), raw_name);
                if element.tag != name || element.namespace_uri != uri {
                    parser.diagnostics_mut().warn(
                        WarningKind::MismatchedEndTag,
                        None,
                        format!(
                            "closing tag '{name}' does not match open element '{}' (line {})",
                            element.tag, element.line
                        ),
                    );
                }
                self.attach(element);
            }
            AxmlEvent::Text { value_idx } => {
                let raw_text = parser_string(parser, value_idx);
                let text = fix_value(parser.diagnostics_mut(), raw_text);
                match self.stack.last_mut() {
                    Some(current) => current.text = Some(text),
                    None => parser.diagnostics_mut().warn(
                        WarningKind::UnbalancedElements,
                        None,
                        "text outside of any element dropped",
                    ),
                }
            }
            AxmlEvent::EndDocument => {
                let open = parser.open_namespaces();
                if open > 0 {
                    parser.diagnostics_mut().warn(
                        WarningKind::UnbalancedNamespaces,
                        None,
                        format!("{open} namespace mappings were never closed"),
                    );
                }
                if !self.stack.is_empty() {
                    parser.diagnostics_mut().warn(
                        WarningKind::UnbalancedElements,
                        None,
                        format!("{} elements were never closed", self.stack.len()),
                    );
                }
                self.stopped = true;
                return false;
            }
        }
        true
    }

    fn start_element(
        &mut self,
        parser: &mut AxmlParser<'_>,
        namespace_idx: u32,
        name_idx: u32,
        attributes: &[Attribute],
        line: u32,
        comment_idx: u32,
    ) -> Element {
        let mut nsmap = parser.nsmap();
        self.fix_prefixes(parser.diagnostics_mut(), &mut nsmap);
        let raw_tag = parser_string(parser, name_idx);
        let tag = fix_name(parser.diagnostics_mut(), raw_tag);
        let namespace_uri = parser.string(namespace_idx).to_string();
        let prefix = self.prefix_for(&mut nsmap, &namespace_uri);
        debug!("[axml] start tag {tag} (line {line})");

        let comment = parser.strings().lookup(comment_idx).map(str::to_string);
        if comment.is_some() && self.root.is_none() && self.stack.is_empty() {
            parser.diagnostics_mut().warn(
                WarningKind::UnbalancedElements,
                None,
                "comment before the root element dropped",
            );
        }

        let comment = match comment {
            Some(comment) if !self.stack.is_empty() => {
                Some(fix_value(parser.diagnostics_mut(), comment))
            }
            _ => None,
        };

        let mut element = Element {
            tag,
            namespace_uri,
            prefix,
            comment,
            line,
            ..Element::default()
        };

        for attr in attributes {
            let xml_attr = self.decode_attribute(parser, &mut nsmap, attr);
            match element.attributes.iter_mut().find(|existing| {
                existing.name == xml_attr.name && existing.namespace_uri == xml_attr.namespace_uri
            }) {
                Some(existing) => {
                    parser.diagnostics_mut().warn(
                        WarningKind::DuplicateAttribute,
                        None,
                        format!("duplicate attribute '{}', overwriting", xml_attr.qualified_name()),
                    );
                    *existing = xml_attr;
                }
                None => element.attributes.push(xml_attr),
            }
        }
        element.nsmap = nsmap;
        element
    }

    fn decode_attribute(
        &mut self,
        parser: &mut AxmlParser<'_>,
        nsmap: &mut Vec<(String, String)>,
        attr: &Attribute,
    ) -> XmlAttribute {
        let resolved = parser.attribute_name(attr);
        let raw_name = resolved.to_string();
        let fallback = resolved.is_fallback();
        let resource_id = parser.resource_id(attr.name_idx).filter(|id| *id != 0);
        if fallback {
            parser.diagnostics_mut().warn(
                WarningKind::AttributeNameFromResourceMap,
                None,
                format!(
                    "attribute name {} is blank in the pool, using '{raw_name}'",
                    attr.name_idx
                ),
            );
        }
        let name = fix_name(parser.diagnostics_mut(), raw_name);

        if !has_valid_unit(attr.value_type, attr.value_data) {
            parser.diagnostics_mut().warn(
                WarningKind::UnitOutOfRange,
                None,
                format!(
                    "attribute '{name}' has unit index {} outside the unit table",
                    attr.value_data & 0x0F
                ),
            );
        }
        let raw_value = if attr.value_type == TYPE_STRING {
            parser.attribute_raw_value(attr).to_string()
        } else {
            String::new()
        };
        let formatted = format_value(attr.value_type, attr.value_data, |_| raw_value);
        let value = fix_value(parser.diagnostics_mut(), formatted);

        let namespace_uri = parser.string(attr.namespace_idx).to_string();
        let prefix = self.prefix_for(nsmap, &namespace_uri);
        XmlAttribute {
            namespace_uri,
            prefix,
            name,
            value,
            resource_id,
            value_type: attr.value_type,
            data: attr.value_data,
        }
    }

    /// Prefix bound to `uri`, inventing and binding `nsN` when none is in scope.
    fn prefix_for(&mut self, nsmap: &mut Vec<(String, String)>, uri: &str) -> Option<String> {
        if uri.is_empty() {
            return None;
        }
        if let Some((prefix, _)) = nsmap.iter().rev().find(|(_, bound)| bound == uri) {
            return Some(prefix.clone());
        }
        let prefix = self.generate_prefix(nsmap);
        nsmap.push((prefix.clone(), uri.to_string()));
        Some(prefix)
    }

    /// Replace bound prefixes that cannot appear in XML with generated ones.
    /// A document prefix is renamed the same way everywhere it is bound.
    fn fix_prefixes(&mut self, diag: &mut Diagnostics, nsmap: &mut [(String, String)]) {
        for i in 0..nsmap.len() {
            if is_valid_prefix(&nsmap[i].0) {
                continue;
            }
            let renamed = match self.renamed_prefixes.get(&nsmap[i].0) {
                Some(renamed) => renamed.clone(),
                None => {
                    let renamed = self.generate_prefix(nsmap);
                    diag.warn(
                        WarningKind::InvalidName,
                        None,
                        format!(
                            "namespace prefix '{}' is not a valid XML name, using '{renamed}'",
                            nsmap[i].0
                        ),
                    );
                    self.renamed_prefixes.insert(nsmap[i].0.clone(), renamed.clone());
                    renamed
                }
            };
            nsmap[i].0 = renamed;
        }
    }

    /// Next `nsN` prefix that is not already bound.
    fn generate_prefix(&mut self, nsmap: &[(String, String)]) -> String {
        loop {
            let prefix = format!("ns{}", self.generated_prefixes);
            self.generated_prefixes += 1;
            if !nsmap.iter().any(|(bound, _)| *bound == prefix) {
                return prefix;
            }
        }
    }

    fn attach(&mut self, element: Element) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None => self.root = Some(element),
        }
    }

    /// Close anything still open and return the root.
    pub fn finish(mut self) -> Option<Element> {
        while let Some(element) = self.stack.pop() {
            self.attach(element);
        }
        self.root
    }
}

fn parser_string(parser: &AxmlParser<'_>, idx: u32) -> String {
    parser.string(idx).to_string()
}

/// Make a name usable as an XML name: `[A-Za-z_][A-Za-z0-9._-]*`.
pub(crate) fn fix_name(diag: &mut Diagnostics, name: String) -> String {
    let mut name = name;
    let starts_ok = name
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_');
    if !starts_ok {
        diag.warn(
            WarningKind::InvalidName,
            None,
            format!("invalid start for name '{name}'"),
        );
        name = format!("_{name}");
    }
    if let Some(stripped) = name.strip_prefix("android:") {
        diag.warn(
            WarningKind::InvalidName,
            None,
            format!("name '{name}' carries an 'android:' prefix, removing it"),
        );
        name = stripped.to_string();
    }
    if name.contains(':') {
        debug!("[axml] name seems to contain a namespace prefix: '{name}'");
    }
    let valid = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-');
    if !name.chars().all(valid) {
        diag.warn(
            WarningKind::InvalidName,
            None,
            format!("name '{name}' contains invalid characters"),
        );
        name = name
            .chars()
            .map(|c| if valid(c) { c } else { '_' })
            .collect();
    }
    name
}

/// An NCName made of ASCII name characters, outside the reserved `xml` space.
fn is_valid_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        && !prefix.to_ascii_lowercase().starts_with("xml")
}

fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\u{9}' | '\u{A}' | '\u{D}'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

/// Cut a value at its first NUL, as aapt does, and replace characters XML cannot carry.
pub(crate) fn fix_value(diag: &mut Diagnostics, value: String) -> String {
    let mut value = value;
    if let Some(pos) = value.find('\0') {
        diag.warn(
            WarningKind::InvalidValue,
            None,
            format!("null byte in value at position {pos}, truncating"),
        );
        value.truncate(pos);
    }
    if !value.chars().all(is_xml_char) {
        diag.warn(
            WarningKind::InvalidValue,
            None,
            "invalid character in value, replacing with '_'",
        );
        value = value
            .chars()
            .map(|c| if is_xml_char(c) { c } else { '_' })
            .collect();
    }
    value
}

/// A decoded binary XML document.
#[derive(Clone, Debug, Serialize)]
pub struct XmlTree {
    root: Option<Element>,
    diagnostics: Diagnostics,
    #[serde(skip)]
    error: Option<FormatError>,
}

impl XmlTree {
    /// Decode `bytes`, failing on the first fatal format error.
    pub fn parse(bytes: &[u8]) -> FormatResult<XmlTree> {
        let tree = XmlTree::parse_best_effort(bytes);
        match tree.error {
            Some(err) => Err(err),
            None => Ok(tree),
        }
    }

    /// Decode `bytes`, keeping whatever tree was built before a fatal error.
    /// The error, if any, is available from [`XmlTree::error`].
    pub fn parse_best_effort(bytes: &[u8]) -> XmlTree {
        let mut parser = match AxmlParser::new(bytes) {
            Ok(parser) => parser,
            Err(err) => {
                return XmlTree {
                    root: None,
                    diagnostics: Diagnostics::scoped("axml"),
                    error: Some(err),
                }
            }
        };
        let mut builder = AxmlTreeBuilder::new();
        let mut error = None;
        loop {
            match parser.next() {
                Ok(event) => {
                    if !builder.handle(&mut parser, event) {
                        break;
                    }
                }
                Err(err) => {
                    debug!("[axml] parse aborted: {err}");
                    error = Some(err);
                    break;
                }
            }
        }
        let root = builder.finish();
        if root.is_none() && error.is_none() {
            error = Some(FormatError::malformed(
                parser.file_size(),
                "document contains no elements",
            ));
        }
        XmlTree {
            root,
            diagnostics: parser.into_diagnostics(),
            error,
        }
    }

    pub fn root(&self) -> Option<&Element> {
        self.root.as_ref()
    }

    pub fn into_root(self) -> Option<Element> {
        self.root
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// The fatal error that cut a best-effort parse short.
    pub fn error(&self) -> Option<&FormatError> {
        self.error.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    /// True if the document looks packed or deliberately damaged.
    pub fn is_packed(&self) -> bool {
        self.diagnostics.is_tampered()
    }

    /// `package` attribute of the root element.
    pub fn package_name(&self) -> Option<&str> {
        self.root.as_ref().and_then(|root| root.attribute("package"))
    }

    /// Render as UTF-8 text XML.
    pub fn to_xml(&self, pretty: bool) -> FormatResult<String> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| FormatError::Xml("document has no root element".to_string()))?;
        let mut writer = if pretty {
            Writer::new_with_indent(Vec::new(), b' ', 2)
        } else {
            Writer::new(Vec::new())
        };
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(xml_error)?;
        write_element(&mut writer, root, &[])?;
        String::from_utf8(writer.into_inner()).map_err(xml_error)
    }
}

/// Comment body with no `--` inside and no `-` at the end.
fn comment_text(comment: &str) -> String {
    let mut text = comment.to_string();
    while text.contains("--") {
        text = text.replace("--", "- -");
    }
    if text.ends_with('-') {
        text.push(' ');
    }
    text
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    element: &Element,
    inherited: &[(String, String)],
) -> FormatResult<()> {
    if let Some(comment) = &element.comment {
        let comment = comment_text(comment);
        writer
            .write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))
            .map_err(xml_error)?;
    }

    let name = element.qualified_name();
    let mut start = BytesStart::new(name.as_str());
    for (prefix, uri) in &element.nsmap {
        let already_bound = inherited
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .is_some_and(|(_, bound)| bound == uri);
        if !already_bound {
            let key = format!("xmlns:{prefix}");
            start.push_attribute((key.as_str(), uri.as_str()));
        }
    }
    for attr in &element.attributes {
        let key = attr.qualified_name();
        start.push_attribute((key.as_str(), attr.value.as_str()));
    }

    if element.children.is_empty() && element.text.is_none() {
        return writer.write_event(Event::Empty(start)).map_err(xml_error);
    }
    writer.write_event(Event::Start(start)).map_err(xml_error)?;
    if let Some(text) = &element.text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_error)?;
    }
    for child in &element.children {
        write_element(writer, child, &element.nsmap)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(name.as_str())))
        .map_err(xml_error)
}
