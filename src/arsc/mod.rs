//! Compiled resource tables (`resources.arsc`).

mod config;
mod reference;
mod resolver;
mod table;

pub use config::*;
pub use reference::parse_resource_ref;
pub use resolver::{ResolvedValue, ResourceResolver, DEFAULT_MAX_DEPTH, DEFAULT_MAX_VALUES};
pub use table::{
    ArscPackage, EntryBody, EntryFlags, PublicResource, ResTableEntry, ResType, ResTypeSpec,
    ResourceTable, TypeFlags, TypeSpecFlags, DEFAULT_LOCALE, RES_TABLE_HEADER_SIZE,
};
