use log::warn;
use serde::{Deserialize, Serialize};

/// Category of a non-fatal anomaly found while parsing or resolving.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    /// The outer document header has an unusual type.
    HeaderTypeMismatch,
    /// Bytes follow the declared end of the document.
    TrailingData,
    /// A chunk header has a size other than the one its type defines.
    UnusualHeaderSize,
    /// A chunk of an unknown or unsupported type was skipped.
    UnknownChunk,
    /// A chunk that is only allowed once appeared again.
    DuplicateChunk,
    /// A chunk crosses the end of its parent chunk.
    ChunkOutOfBounds,
    /// A namespace prefix is bound to an empty URI.
    EmptyNamespaceUri,
    /// The same prefix/uri pair was declared twice.
    DuplicateNamespace,
    /// An end-namespace chunk had no matching start.
    UnmatchedNamespace,
    /// Namespaces were still open at the end of the document.
    UnbalancedNamespaces,
    /// An end tag did not match the open element.
    MismatchedEndTag,
    /// Elements or end tags did not form a single tree.
    UnbalancedElements,
    /// An element or attribute name had to be rewritten to be valid XML.
    InvalidName,
    /// An attribute value or text had to be rewritten to be valid XML.
    InvalidValue,
    /// An attribute appeared twice on the same element.
    DuplicateAttribute,
    /// An attribute name was recovered from the resource id map.
    AttributeNameFromResourceMap,
    /// A dimension or fraction carried an out-of-range unit.
    UnitOutOfRange,
    /// A reserved field that must be zero was not.
    ReservedFieldSet,
    /// A count disagrees with the space available for it.
    CountMismatch,
    /// A package, type or entry id is zero or otherwise unusable.
    InvalidId,
    /// Pool strings or styles are inconsistent in a non-fatal way.
    StringPoolAnomaly,
    /// A default-config lookup fell back to another configuration.
    DefaultConfigFallback,
    /// A resource chain references itself.
    ReferenceCycle,
    /// A resource id was not present in the table.
    MissingResource,
    /// Resolving stopped after producing the resolver's maximum number of values.
    ResolveLimit,
}

impl WarningKind {
    /// Kinds that indicate a file which was deliberately damaged to confuse parsers.
    pub fn signals_tampering(self) -> bool {
        matches!(
            self,
            WarningKind::HeaderTypeMismatch
                | WarningKind::TrailingData
                | WarningKind::EmptyNamespaceUri
                | WarningKind::InvalidName
                | WarningKind::InvalidValue
                | WarningKind::AttributeNameFromResourceMap
                | WarningKind::UnitOutOfRange
        )
    }
}

/// A single recorded anomaly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub offset: Option<usize>,
    pub message: String,
}

/// Warnings collected alongside a successful parse, plus the packed/tampered flag.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
    tampered: bool,
    #[serde(skip)]
    scope: &'static str,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::scoped("res")
    }

    /// Diagnostics whose log lines are tagged with `[scope]`.
    pub fn scoped(scope: &'static str) -> Self {
        Diagnostics {
            scope,
            ..Diagnostics::default()
        }
    }

    /// Log and record a warning. Tampering kinds also raise the tampered flag.
    pub fn warn(&mut self, kind: WarningKind, offset: Option<usize>, message: impl Into<String>) {
        let message = message.into();
        match offset {
            Some(offset) => warn!("[{}] {message} ({kind:?} at 0x{offset:x})", self.scope),
            None => warn!("[{}] {message} ({kind:?})", self.scope),
        }
        if kind.signals_tampering() {
            self.tampered = true;
        }
        self.warnings.push(Warning {
            kind,
            offset,
            message,
        });
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// True if the file looks packed, obfuscated or otherwise tampered with.
    pub fn is_tampered(&self) -> bool {
        self.tampered
    }

    pub fn has(&self, kind: WarningKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Fold another set of diagnostics into this one.
    pub fn extend(&mut self, other: Diagnostics) {
        self.tampered |= other.tampered;
        self.warnings.extend(other.warnings);
    }
}
