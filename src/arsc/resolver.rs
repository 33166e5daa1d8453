use super::config::ResTableConfig;
use super::table::{ConfigSelection, EntryBody, ResTableEntry, ResourceTable};
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::value::ResValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Longest reference chain followed before giving up.
pub const DEFAULT_MAX_DEPTH: usize = 32;
/// Most values a single `resolve` call produces, bag items included.
pub const DEFAULT_MAX_VALUES: usize = 4096;

type Resolved = Vec<(ResTableConfig, ResolvedValue)>;

/// A resource value with every reference followed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolvedValue {
    Simple(String),
    /// The formatted items of a bag, in table order.
    Complex(Vec<String>),
}

impl fmt::Display for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedValue::Simple(value) => f.write_str(value),
            ResolvedValue::Complex(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

/// Resolves resource ids to their values, following references.
///
/// Warnings found while resolving (fallbacks, cycles, dangling ids) collect
/// in the resolver's own diagnostics.
///
/// Within one `resolve` call every referenced id is resolved once, and a
/// reference contributes each `(config, value)` pair at most once.
pub struct ResourceResolver<'t> {
    table: &'t ResourceTable,
    max_depth: usize,
    max_values: usize,
    diagnostics: Diagnostics,
    resolved: HashMap<u32, Resolved>,
    /// Set when a cycle or depth cut shortened the value being computed.
    cut: bool,
    remaining: usize,
}

impl<'t> ResourceResolver<'t> {
    pub fn new(table: &'t ResourceTable) -> Self {
        ResourceResolver {
            table,
            max_depth: DEFAULT_MAX_DEPTH,
            max_values: DEFAULT_MAX_VALUES,
            diagnostics: Diagnostics::scoped("resolve"),
            resolved: HashMap::new(),
            cut: false,
            remaining: DEFAULT_MAX_VALUES,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_values(mut self, max_values: usize) -> Self {
        self.max_values = max_values;
        self
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    /// Values of `id` for `config`, or for every configuration when `None`.
    ///
    /// A missing id yields an empty list. References are replaced by what
    /// they point to, resolved under the same wanted configuration.
    pub fn resolve(
        &mut self,
        id: u32,
        config: Option<&ResTableConfig>,
    ) -> Vec<(ResTableConfig, ResolvedValue)> {
        self.resolved.clear();
        self.cut = false;
        self.remaining = self.max_values;
        let mut result = Vec::new();
        let mut path = vec![id];
        self.resolve_into(&mut result, id, config, &mut path);
        result
    }

    /// Take one unit of the value budget, warning the first time it runs out.
    fn spend(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        if self.remaining == 0 {
            self.diagnostics.warn(
                WarningKind::ResolveLimit,
                None,
                format!("stopped after {} resolved values", self.max_values),
            );
        }
        true
    }

    fn resolve_into(
        &mut self,
        result: &mut Resolved,
        id: u32,
        wanted: Option<&ResTableConfig>,
        path: &mut Vec<u32>,
    ) {
        let table = self.table;
        let candidates = match table.select_configs(id, wanted) {
            ConfigSelection::Missing => {
                self.diagnostics.warn(
                    WarningKind::MissingResource,
                    None,
                    format!("resource 0x{id:08x} not found"),
                );
                return;
            }
            ConfigSelection::Found(found) => found,
            ConfigSelection::Fallback(config, entry) => {
                self.diagnostics.warn(
                    WarningKind::DefaultConfigFallback,
                    None,
                    format!("no default config for 0x{id:08x}, using '{config}'"),
                );
                vec![(config, entry)]
            }
        };

        for (config, entry) in candidates {
            if self.remaining == 0 {
                return;
            }
            match &entry.body {
                EntryBody::Simple(value) => {
                    self.put_value(result, value, config, wanted, path);
                }
                EntryBody::Complex { parent, items } => {
                    self.check_parent_chain(entry, *parent);
                    let mut formatted = Vec::with_capacity(items.len());
                    for (_, value) in items.iter() {
                        let mut nested = Vec::new();
                        self.put_value(&mut nested, value, config, wanted, path);
                        formatted.extend(nested.into_iter().map(|(_, v)| v.to_string()));
                    }
                    if self.spend() {
                        result.push((config, ResolvedValue::Complex(formatted)));
                    }
                }
            }
        }
    }

    fn put_value(
        &mut self,
        result: &mut Resolved,
        value: &ResValue,
        config: ResTableConfig,
        wanted: Option<&ResTableConfig>,
        path: &mut Vec<u32>,
    ) {
        if !value.is_reference() || value.data == 0 {
            if self.spend() {
                result.push((config, ResolvedValue::Simple(value.format(self.table.strings()))));
            }
            return;
        }
        let target = value.data;
        if let Some(known) = self.resolved.get(&target) {
            let known = known.clone();
            self.merge(result, known);
            return;
        }
        if path.contains(&target) {
            self.cut = true;
            let chain: Vec<String> = path.iter().map(|id| format!("0x{id:08x}")).collect();
            self.diagnostics.warn(
                WarningKind::ReferenceCycle,
                None,
                format!(
                    "cycle detected: 0x{target:08x} is referenced again after {}",
                    chain.join(" -> ")
                ),
            );
            return;
        }
        if path.len() > self.max_depth {
            self.cut = true;
            self.diagnostics.warn(
                WarningKind::ReferenceCycle,
                None,
                format!(
                    "reference chain from 0x{:08x} is deeper than {}",
                    path[0], self.max_depth
                ),
            );
            return;
        }
        let outer_cut = std::mem::replace(&mut self.cut, false);
        let mut resolved = Vec::new();
        path.push(target);
        self.resolve_into(&mut resolved, target, wanted, path);
        path.pop();
        if !self.cut && self.remaining > 0 {
            self.resolved.insert(target, resolved.clone());
        }
        self.cut |= outer_cut;
        self.merge(result, resolved);
    }

    /// Append the values a reference produced, skipping pairs already present.
    fn merge(&mut self, result: &mut Resolved, values: Resolved) {
        for pair in values {
            if !result.contains(&pair) && self.spend() {
                result.push(pair);
            }
        }
    }

    /// Walk the parents of a bag and report a chain that loops back on itself.
    fn check_parent_chain(&mut self, entry: &ResTableEntry, first_parent: u32) {
        let table = self.table;
        let mut seen = vec![entry.id];
        let mut parent = first_parent;
        while parent != 0 {
            if seen.contains(&parent) {
                self.diagnostics.warn(
                    WarningKind::ReferenceCycle,
                    None,
                    format!(
                        "cycle detected: bag 0x{:08x} inherits from itself via 0x{parent:08x}",
                        entry.id
                    ),
                );
                return;
            }
            if seen.len() > self.max_depth {
                return;
            }
            seen.push(parent);
            parent = table
                .res_configs(parent, None)
                .into_iter()
                .find_map(|(_, candidate)| match candidate.body {
                    EntryBody::Complex { parent, .. } => Some(parent),
                    EntryBody::Simple(_) => None,
                })
                .unwrap_or(0);
        }
    }
}

impl ResourceTable {
    pub fn resolver(&self) -> ResourceResolver<'_> {
        ResourceResolver::new(self)
    }

    /// Resolve `id` and render every value as text.
    pub fn resolve(
        &self,
        id: u32,
        config: Option<&ResTableConfig>,
    ) -> Vec<(ResTableConfig, String)> {
        self.resolver()
            .resolve(id, config)
            .into_iter()
            .map(|(config, value)| (config, value.to_string()))
            .collect()
    }
}
