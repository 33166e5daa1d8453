//! Well-known `android:` attribute ids from the framework's public resources.
//!
//! Used to name attributes whose pool string was blanked out, a common trick in
//! packed manifests. This is a subset of `android.R.attr`: the manifest and
//! common layout attributes. Ids outside it stay unnamed.

use once_cell::sync::Lazy;
use std::collections::HashMap;

const FRAMEWORK_ATTRIBUTES: &[(u32, &str)] = &[
    (0x0101_0000, "theme"),
    (0x0101_0001, "label"),
    (0x0101_0002, "icon"),
    (0x0101_0003, "name"),
    (0x0101_0004, "manageSpaceActivity"),
    (0x0101_0005, "allowClearUserData"),
    (0x0101_0006, "permission"),
    (0x0101_0007, "readPermission"),
    (0x0101_0008, "writePermission"),
    (0x0101_0009, "protectionLevel"),
    (0x0101_000a, "permissionGroup"),
    (0x0101_000b, "sharedUserId"),
    (0x0101_000c, "hasCode"),
    (0x0101_000d, "persistent"),
    (0x0101_000e, "enabled"),
    (0x0101_000f, "debuggable"),
    (0x0101_0010, "exported"),
    (0x0101_0011, "process"),
    (0x0101_0012, "taskAffinity"),
    (0x0101_0013, "multiprocess"),
    (0x0101_0014, "finishOnTaskLaunch"),
    (0x0101_0015, "clearTaskOnLaunch"),
    (0x0101_0016, "stateNotNeeded"),
    (0x0101_0017, "excludeFromRecents"),
    (0x0101_0018, "authorities"),
    (0x0101_0019, "syncable"),
    (0x0101_001a, "initOrder"),
    (0x0101_001b, "grantUriPermissions"),
    (0x0101_001c, "priority"),
    (0x0101_001d, "launchMode"),
    (0x0101_001e, "screenOrientation"),
    (0x0101_001f, "configChanges"),
    (0x0101_0020, "description"),
    (0x0101_0021, "targetPackage"),
    (0x0101_0022, "handleProfiling"),
    (0x0101_0023, "functionalTest"),
    (0x0101_0024, "value"),
    (0x0101_0025, "resource"),
    (0x0101_0026, "mimeType"),
    (0x0101_0027, "scheme"),
    (0x0101_0028, "host"),
    (0x0101_0029, "port"),
    (0x0101_002a, "path"),
    (0x0101_002b, "pathPrefix"),
    (0x0101_002c, "pathPattern"),
    (0x0101_002d, "action"),
    (0x0101_002e, "data"),
    (0x0101_002f, "targetClass"),
    (0x0101_00c4, "orientation"),
    (0x0101_00d0, "id"),
    (0x0101_00f4, "layout_width"),
    (0x0101_00f5, "layout_height"),
    (0x0101_014f, "text"),
    (0x0101_020c, "minSdkVersion"),
    (0x0101_021b, "versionCode"),
    (0x0101_021c, "versionName"),
    (0x0101_022b, "windowSoftInputMode"),
    (0x0101_0270, "targetSdkVersion"),
    (0x0101_0271, "maxSdkVersion"),
    (0x0101_0280, "allowBackup"),
    (0x0101_0281, "glEsVersion"),
    (0x0101_028e, "required"),
    (0x0101_02b7, "installLocation"),
    (0x0101_02be, "logo"),
    (0x0101_02d3, "hardwareAccelerated"),
    (0x0101_035a, "largeHeap"),
    (0x0101_03af, "supportsRtl"),
    (0x0101_04ea, "extractNativeLibs"),
    (0x0101_04eb, "fullBackupContent"),
    (0x0101_04ec, "usesCleartextTraffic"),
    (0x0101_0527, "networkSecurityConfig"),
    (0x0101_052c, "roundIcon"),
    (0x0101_0572, "compileSdkVersion"),
    (0x0101_0573, "compileSdkVersionCodename"),
    (0x0101_057a, "appComponentFactory"),
    (0x0101_0603, "requestLegacyExternalStorage"),
];

static BY_ID: Lazy<HashMap<u32, &'static str>> =
    Lazy::new(|| FRAMEWORK_ATTRIBUTES.iter().copied().collect());

static BY_NAME: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| {
    FRAMEWORK_ATTRIBUTES
        .iter()
        .map(|(id, name)| (*name, *id))
        .collect()
});

/// Name of a framework attribute, without the `android:` prefix.
pub fn attribute_name(id: u32) -> Option<&'static str> {
    BY_ID.get(&id).copied()
}

pub fn attribute_id(name: &str) -> Option<u32> {
    BY_NAME.get(name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_both_ways() {
        assert_eq!(attribute_name(0x0101_0003), Some("name"));
        assert_eq!(attribute_name(0x0101_020c), Some("minSdkVersion"));
        assert_eq!(attribute_id("versionCode"), Some(0x0101_021b));
        assert_eq!(attribute_name(0x0101_0603), Some("requestLegacyExternalStorage"));
        assert_eq!(attribute_name(0x7f01_0000), None);
    }

    #[test]
    fn ids_are_unique() {
        assert_eq!(BY_ID.len(), FRAMEWORK_ATTRIBUTES.len());
        assert_eq!(BY_NAME.len(), FRAMEWORK_ATTRIBUTES.len());
    }
}
