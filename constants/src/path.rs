/// Scene manifest loaded at startup, relative to the asset root.
pub const RELATIVE_MANIFEST_PATH: &str = "scenes/voyager.manifest.json";
