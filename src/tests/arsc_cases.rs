use crate::arsc::{
    parse_resource_ref, EntryBody, EntryFlags, PublicResource, ResTableConfig, ResolvedValue,
    ResourceTable, DEFAULT_LOCALE, DEFAULT_MAX_VALUES,
};
use crate::diagnostics::WarningKind;
use crate::error::FormatError;
use crate::tests::fixtures::{ArscBuilder, EntrySpec, PackageBuilder, TableLayout};
use crate::value::{
    TYPE_DYNAMIC_REFERENCE, TYPE_INT_BOOLEAN, TYPE_INT_COLOR_ARGB8, TYPE_INT_DEC, TYPE_REFERENCE,
    TYPE_STRING,
};
use std::sync::Arc;

const PACKAGE: &str = "com.example";

fn default_config() -> ResTableConfig {
    ResTableConfig::default_config()
}

fn locale(locale: &str) -> ResTableConfig {
    ResTableConfig::default_config().with_locale(locale)
}

/// One `string` type with `app_name = "Demo"` in the default config.
fn demo_table() -> Vec<u8> {
    let mut table = ArscBuilder::new();
    let demo = table.string("Demo");
    let mut package = PackageBuilder::new(0x7f, PACKAGE);
    package.type_spec("string", &[0]);
    package.type_chunk(
        "string",
        &default_config(),
        TableLayout::Dense,
        &[(0, EntrySpec::simple("app_name", TYPE_STRING, demo))],
    );
    table.add_package(package);
    table.to_bytes()
}

/// `greeting` translated into English and German, in that order.
fn localized_table() -> (Vec<u8>, u32) {
    let mut table = ArscBuilder::new();
    let foo = table.string("foo");
    let bar = table.string("bar");
    let mut package = PackageBuilder::new(0x7f, PACKAGE);
    let id = package.res_id("string", 0);
    package.type_spec("string", &[0x0004]);
    package.type_chunk(
        "string",
        &locale("en"),
        TableLayout::Dense,
        &[(0, EntrySpec::simple("greeting", TYPE_STRING, foo))],
    );
    package.type_chunk(
        "string",
        &locale("de"),
        TableLayout::Dense,
        &[(0, EntrySpec::simple("greeting", TYPE_STRING, bar))],
    );
    table.add_package(package);
    (table.to_bytes(), id)
}

#[test]
fn looks_up_default_string() {
    let table = ResourceTable::parse(&demo_table()).unwrap();
    assert_eq!(
        table.get_string(PACKAGE, "app_name", DEFAULT_LOCALE),
        Some(("app_name".to_string(), "Demo".to_string()))
    );
    assert_eq!(table.get_string(PACKAGE, "missing", DEFAULT_LOCALE), None);
    assert_eq!(table.get_string("org.other", "app_name", DEFAULT_LOCALE), None);
    assert!(table.diagnostics().is_empty());
    assert!(!table.is_tampered());
}

#[test]
fn exposes_package_structure() {
    let table = ResourceTable::parse(&demo_table()).unwrap();
    assert_eq!(table.package_names(), vec![PACKAGE]);
    let package = table.package(PACKAGE).unwrap();
    assert_eq!(package.id, 0x7f);
    assert_eq!(package.type_specs.len(), 1);
    assert_eq!(package.type_specs[0].id, 1);
    assert_eq!(package.types.len(), 1);
    assert_eq!(package.type_name(1), "string");
    assert_eq!(package.type_name(0), "");

    let entry = &package.types[0].entries[0];
    assert_eq!(entry.id, 0x7f01_0000);
    assert_eq!(package.key_name(entry), "app_name");
    assert!(!entry.is_complex());
    assert_eq!(entry.value().unwrap().format(table.strings()), "Demo");
}

#[test]
fn names_and_ids() {
    let table = ResourceTable::parse(&demo_table()).unwrap();
    let id = 0x7f01_0000;
    assert_eq!(table.res_id_by_key(PACKAGE, "string", "app_name"), Some(id));
    assert_eq!(table.res_id_by_key(PACKAGE, "drawable", "app_name"), None);
    assert_eq!(
        table.get_id(PACKAGE, id),
        Some(PublicResource {
            type_name: "string".to_string(),
            name: "app_name".to_string(),
            id,
        })
    );
    assert_eq!(table.get_id("org.other", id), None);
    assert_eq!(
        table.resource_xml_name(id, Some(PACKAGE)).as_deref(),
        Some("@string/app_name")
    );
    assert_eq!(
        table.resource_xml_name(id, None).as_deref(),
        Some("@com.example:string/app_name")
    );

    let (parsed, package) = parse_resource_ref("@7F010000").unwrap();
    assert_eq!(package, None);
    assert_eq!(table.resource_xml_name(parsed, Some(PACKAGE)).as_deref(), Some("@string/app_name"));
}

#[test]
fn renders_strings_xml() {
    let table = ResourceTable::parse(&demo_table()).unwrap();
    let xml = table.strings_xml(PACKAGE, DEFAULT_LOCALE).unwrap();
    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
    assert!(xml.contains("<resources>"));
    assert!(xml.contains("<string name=\"app_name\">Demo</string>"));
    assert!(xml.trim_end().ends_with("</resources>"));
}

#[test]
fn exact_config_wins_and_none_returns_all() {
    let (bytes, id) = localized_table();
    let table = ResourceTable::parse(&bytes).unwrap();
    let en = locale("en");
    let de = locale("de");

    assert_eq!(table.resolve(id, Some(&en)), vec![(en, "foo".to_string())]);
    assert_eq!(table.resolve(id, Some(&de)), vec![(de, "bar".to_string())]);
    assert_eq!(
        table.resolve(id, None),
        vec![(en, "foo".to_string()), (de, "bar".to_string())]
    );
    assert!(table.resolve(id, Some(&locale("fr"))).is_empty());
}

#[test]
fn default_request_falls_back_to_first_config() {
    let (bytes, id) = localized_table();
    let table = ResourceTable::parse(&bytes).unwrap();
    let mut resolver = table.resolver();
    let values = resolver.resolve(id, Some(&default_config()));
    assert_eq!(
        values,
        vec![(locale("en"), ResolvedValue::Simple("foo".to_string()))]
    );
    assert!(resolver.diagnostics().has(WarningKind::DefaultConfigFallback));
    assert_eq!(table.res_configs(id, Some(&default_config())).len(), 1);
}

#[test]
fn lists_locales_types_and_configs() {
    let (bytes, _) = localized_table();
    let table = ResourceTable::parse(&bytes).unwrap();
    assert_eq!(table.locales(PACKAGE), vec!["en", "de"]);
    assert_eq!(table.types(PACKAGE, "de"), vec!["string"]);
    assert!(table.types(PACKAGE, DEFAULT_LOCALE).is_empty());
    assert_eq!(
        table.string_resources(PACKAGE, "de"),
        vec![("greeting".to_string(), "bar".to_string())]
    );

    let configs = table.type_configs(PACKAGE, Some("string"));
    assert_eq!(configs.len(), 1);
    assert_eq!(configs["string"], vec![locale("en"), locale("de")]);
    assert!(table.type_configs(PACKAGE, Some("drawable")).is_empty());
}

#[test]
fn self_parented_bag_reports_a_cycle() {
    let mut package = PackageBuilder::new(0x7f, PACKAGE);
    let id = package.res_id("style", 0);
    package.type_spec("style", &[0]);
    package.type_chunk(
        "style",
        &default_config(),
        TableLayout::Dense,
        &[(
            0,
            EntrySpec::complex(
                "AppTheme",
                id,
                vec![(0x0101_0098, TYPE_INT_COLOR_ARGB8, 0xFF00_FF00)],
            ),
        )],
    );
    let mut table = ArscBuilder::new();
    table.add_package(package);
    let table = ResourceTable::parse(&table.to_bytes()).unwrap();

    let mut resolver = table.resolver();
    let values = resolver.resolve(id, None);
    assert_eq!(
        values,
        vec![(
            default_config(),
            ResolvedValue::Complex(vec!["#FF00FF00".to_string()])
        )]
    );
    let cycle = resolver
        .diagnostics()
        .warnings()
        .iter()
        .find(|w| w.kind == WarningKind::ReferenceCycle)
        .unwrap();
    assert!(cycle.message.contains("cycle detected"));
    assert_eq!(table.resolve(id, None)[0].1, "[#FF00FF00]");
}

/// `label -> app_name -> "Demo"`, plus `a <-> b` referencing each other.
fn reference_table() -> (Vec<u8>, PackageIds) {
    let mut table = ArscBuilder::new();
    let demo = table.string("Demo");
    let mut package = PackageBuilder::new(0x7f, PACKAGE);
    let ids = PackageIds {
        app_name: package.res_id("string", 0),
        label: package.res_id("string", 1),
        loop_a: package.res_id("string", 2),
        loop_b: package.res_id("string", 3),
        dynamic: package.res_id("string", 4),
    };
    package.type_spec("string", &[0; 5]);
    package.type_chunk(
        "string",
        &default_config(),
        TableLayout::Dense,
        &[
            (0, EntrySpec::simple("app_name", TYPE_STRING, demo)),
            (1, EntrySpec::simple("label", TYPE_REFERENCE, ids.app_name)),
            (2, EntrySpec::simple("loop_a", TYPE_REFERENCE, ids.loop_b)),
            (3, EntrySpec::simple("loop_b", TYPE_REFERENCE, ids.loop_a)),
            (4, EntrySpec::simple("dynamic", TYPE_DYNAMIC_REFERENCE, ids.label)),
        ],
    );
    table.add_package(package);
    (table.to_bytes(), ids)
}

struct PackageIds {
    app_name: u32,
    label: u32,
    loop_a: u32,
    loop_b: u32,
    dynamic: u32,
}

#[test]
fn follows_references() {
    let (bytes, ids) = reference_table();
    let table = ResourceTable::parse(&bytes).unwrap();
    assert_eq!(
        table.resolve(ids.label, None),
        vec![(default_config(), "Demo".to_string())]
    );
    assert_eq!(
        table.resolve(ids.dynamic, None),
        vec![(default_config(), "Demo".to_string())]
    );

    let unresolved = table.res_configs(ids.label, None);
    assert_eq!(unresolved.len(), 1);
    assert_eq!(
        unresolved[0].1.value().unwrap().format(table.strings()),
        "@7F010000"
    );
}

#[test]
fn reference_loops_terminate() {
    let (bytes, ids) = reference_table();
    let table = ResourceTable::parse(&bytes).unwrap();
    let mut resolver = table.resolver();
    assert!(resolver.resolve(ids.loop_a, None).is_empty());
    assert!(resolver.diagnostics().has(WarningKind::ReferenceCycle));
    assert!(table.resolve(ids.loop_b, None).is_empty());
}

#[test]
fn depth_limit_stops_long_chains() {
    let (bytes, ids) = reference_table();
    let table = ResourceTable::parse(&bytes).unwrap();
    let mut resolver = table.resolver().with_max_depth(1);
    assert!(resolver.resolve(ids.dynamic, None).is_empty());
    assert!(resolver.diagnostics().has(WarningKind::ReferenceCycle));
}

#[test]
fn missing_id_resolves_to_nothing() {
    let table = ResourceTable::parse(&demo_table()).unwrap();
    let mut resolver = table.resolver();
    assert!(resolver.resolve(0x7f09_0000, None).is_empty());
    assert!(resolver.diagnostics().has(WarningKind::MissingResource));
    assert!(table.res_configs(0x7f09_0000, None).is_empty());
}

#[test]
fn reads_sparse_offset16_and_compact_entries() {
    let mut package = PackageBuilder::new(0x7f, PACKAGE);
    package.type_spec("integer", &[0; 6]);
    package.type_chunk(
        "integer",
        &default_config(),
        TableLayout::Sparse,
        &[
            (0, EntrySpec::simple("first", TYPE_INT_DEC, 10)),
            (5, EntrySpec::simple("sixth", TYPE_INT_DEC, 60)),
        ],
    );
    package.type_spec("bool", &[0; 3]);
    package.type_chunk(
        "bool",
        &default_config(),
        TableLayout::Offset16,
        &[
            (0, EntrySpec::compact("enabled", TYPE_INT_BOOLEAN, 1)),
            (2, EntrySpec::simple("hidden", TYPE_INT_BOOLEAN, 0)),
        ],
    );
    let mut table = ArscBuilder::new();
    table.add_package(package);
    let table = ResourceTable::parse(&table.to_bytes()).unwrap();
    assert!(table.diagnostics().is_empty());

    assert_eq!(table.resolve(0x7f01_0005, None)[0].1, "60");
    assert_eq!(table.res_id_by_key(PACKAGE, "integer", "sixth"), Some(0x7f01_0005));
    assert!(table.res_configs(0x7f01_0001, None).is_empty());

    assert_eq!(table.resolve(0x7f02_0000, None)[0].1, "true");
    assert_eq!(table.resolve(0x7f02_0002, None)[0].1, "false");
    assert!(table.res_configs(0x7f02_0001, None).is_empty());

    let (_, compact) = table.res_configs(0x7f02_0000, None)[0];
    assert!(compact.flags.contains(EntryFlags::COMPACT));
    let package = table.package(PACKAGE).unwrap();
    assert_eq!(package.key_name(compact), "enabled");

    assert_eq!(
        table.public_resources(PACKAGE),
        vec![
            public("integer", "first", 0x7f01_0000),
            public("integer", "sixth", 0x7f01_0005),
            public("bool", "enabled", 0x7f02_0000),
            public("bool", "hidden", 0x7f02_0002),
        ]
    );
}

fn public(type_name: &str, name: &str, id: u32) -> PublicResource {
    PublicResource {
        type_name: type_name.into(),
        name: name.into(),
        id,
    }
}

#[test]
fn shared_entry_offsets_share_one_bag() {
    let mut package = PackageBuilder::new(0x7f, PACKAGE);
    let items: Vec<(u32, u8, u32)> = (0..200).map(|i| (0x0101_0000 + i, TYPE_INT_DEC, i)).collect();
    package.type_spec("array", &[0; 4000]);
    package.aliased_type_chunk("array", 4000, &EntrySpec::complex("numbers", 0, items));
    let mut table = ArscBuilder::new();
    table.add_package(package);
    let table = ResourceTable::parse(&table.to_bytes()).unwrap();

    let ty = &table.package(PACKAGE).unwrap().types[0];
    assert_eq!(ty.entries.len(), 4000);
    let first = match &ty.entries[0].body {
        EntryBody::Complex { items, .. } => items.clone(),
        EntryBody::Simple(_) => panic!("expected a bag"),
    };
    assert_eq!(first.len(), 200);
    let last = ty.entry(3999).unwrap();
    assert_eq!(last.id, 0x7f01_0f9f);
    match &last.body {
        EntryBody::Complex { items, .. } => assert!(Arc::ptr_eq(items, &first)),
        EntryBody::Simple(_) => panic!("expected a bag"),
    }
    assert!(ty.entry(4000).is_none());
}

/// `level0 -> level1 -> ... -> level18 = "end"`, every level defined for `en` and `de`.
fn fan_out_table() -> (Vec<u8>, u32) {
    const LEVELS: u16 = 19;
    let mut table = ArscBuilder::new();
    let end = table.string("end");
    let mut package = PackageBuilder::new(0x7f, PACKAGE);
    let first = package.res_id("string", 0);
    package.type_spec("string", &[0x0004; LEVELS as usize]);
    for language in ["en", "de"] {
        let entries: Vec<(u16, EntrySpec)> = (0..LEVELS)
            .map(|level| {
                let key = format!("level{level}");
                let entry = if level + 1 == LEVELS {
                    EntrySpec::simple(&key, TYPE_STRING, end)
                } else {
                    EntrySpec::simple(&key, TYPE_REFERENCE, first + level as u32 + 1)
                };
                (level, entry)
            })
            .collect();
        package.type_chunk("string", &locale(language), TableLayout::Dense, &entries);
    }
    table.add_package(package);
    (table.to_bytes(), first)
}

#[test]
fn shared_references_resolve_once() {
    let (bytes, first) = fan_out_table();
    let table = ResourceTable::parse(&bytes).unwrap();
    let mut resolver = table.resolver();
    let values = resolver.resolve(first, None);
    assert_eq!(
        values,
        vec![
            (locale("en"), ResolvedValue::Simple("end".to_string())),
            (locale("de"), ResolvedValue::Simple("end".to_string())),
        ]
    );
    assert!(resolver.diagnostics().is_empty());
}

#[test]
fn value_budget_stops_resolution() {
    let (bytes, first) = fan_out_table();
    let table = ResourceTable::parse(&bytes).unwrap();
    let mut resolver = table.resolver().with_max_values(3);
    let values = resolver.resolve(first, None);
    assert!(values.len() <= 3);
    assert!(resolver.diagnostics().has(WarningKind::ResolveLimit));

    // the budget is per call
    let mut resolver = resolver.with_max_values(DEFAULT_MAX_VALUES);
    assert_eq!(resolver.resolve(first, None).len(), 2);
}

#[test]
fn three_letter_locales() {
    let mut table = ArscBuilder::new();
    let text = table.string("Kumusta");
    let mut package = PackageBuilder::new(0x7f, PACKAGE);
    package.type_spec("string", &[0x0004]);
    package.type_chunk(
        "string",
        &locale("fil-rPH"),
        TableLayout::Dense,
        &[(0, EntrySpec::simple("hello", TYPE_STRING, text))],
    );
    table.add_package(package);
    let table = ResourceTable::parse(&table.to_bytes()).unwrap();
    assert_eq!(table.locales(PACKAGE), vec!["fil-rPH"]);
    assert_eq!(
        table.get_string(PACKAGE, "hello", "fil-rPH"),
        Some(("hello".to_string(), "Kumusta".to_string()))
    );
}

#[test]
fn names_resources_across_packages() {
    let mut table = ArscBuilder::new();
    let value = table.string("x");
    for (id, name) in [(0x01, "android"), (0x7f, PACKAGE)] {
        let mut package = PackageBuilder::new(id, name);
        package.type_spec("string", &[0]);
        package.type_chunk(
            "string",
            &default_config(),
            TableLayout::Dense,
            &[(0, EntrySpec::simple("ok", TYPE_STRING, value))],
        );
        table.add_package(package);
    }
    let table = ResourceTable::parse(&table.to_bytes()).unwrap();
    assert_eq!(table.package_names(), vec!["android", PACKAGE]);
    assert_eq!(
        table.resource_xml_name(0x0101_0000, None).as_deref(),
        Some("@android:string/ok")
    );
    assert_eq!(table.resource_xml_name(0x0101_0000, Some(PACKAGE)), None);
}

#[test]
fn package_count_disagreements_are_warnings() {
    let mut builder = ArscBuilder::new();
    builder.add_package(PackageBuilder::new(0x7f, PACKAGE));
    builder.declare_packages(2);
    let table = ResourceTable::parse(&builder.to_bytes()).unwrap();
    assert!(table.diagnostics().has(WarningKind::CountMismatch));

    builder.declare_packages(0);
    let table = ResourceTable::parse(&builder.to_bytes()).unwrap();
    assert_eq!(table.packages().len(), 1);
    assert!(table.diagnostics().has(WarningKind::CountMismatch));
}

#[test]
fn unsupported_package_chunks_are_skipped() {
    let mut table = ArscBuilder::new();
    let demo = table.string("Demo");
    let mut package = PackageBuilder::new(0x7f, PACKAGE);
    // empty shared-library chunk
    package.raw_chunk(&[0x03, 0x02, 0x0c, 0x00, 0x0c, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
    package.type_spec("string", &[0]);
    package.type_chunk(
        "string",
        &default_config(),
        TableLayout::Dense,
        &[(0, EntrySpec::simple("app_name", TYPE_STRING, demo))],
    );
    table.add_package(package);
    let table = ResourceTable::parse(&table.to_bytes()).unwrap();
    assert!(table.diagnostics().has(WarningKind::UnknownChunk));
    assert_eq!(
        table.get_string(PACKAGE, "app_name", DEFAULT_LOCALE).map(|(_, v)| v),
        Some("Demo".to_string())
    );
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[test]
fn package_crossing_the_table_is_dropped() {
    let mut bytes = demo_table();
    let package_at = 12 + read_u32(&bytes, 16) as usize;
    let grown = read_u32(&bytes, package_at + 4) + 16;
    bytes[package_at + 4..package_at + 8].copy_from_slice(&grown.to_le_bytes());
    bytes.extend_from_slice(&[0; 16]);

    let table = ResourceTable::parse(&bytes).unwrap();
    assert!(table.packages().is_empty());
    assert!(table.diagnostics().has(WarningKind::ChunkOutOfBounds));
    assert!(table.diagnostics().has(WarningKind::TrailingData));
    assert!(table.is_tampered());
}

#[test]
fn non_table_input_is_rejected() {
    let bytes = demo_table();
    let mut wrong = bytes.clone();
    wrong[0] = 0x03;
    assert!(matches!(
        ResourceTable::parse(&wrong),
        Err(FormatError::UnexpectedChunkType { found: 0x0003, .. })
    ));
    assert!(matches!(
        ResourceTable::parse(&bytes[..6]),
        Err(FormatError::Truncated { .. })
    ));
}
