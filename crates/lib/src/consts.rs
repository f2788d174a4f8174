pub const APP_NAME: &str = "layerreg";

/// Manifest filename of the layer this tool registers.
pub const MANIFEST_FILE_NAME: &str = "XR_APILAYER_NOVENDOR_d3d12on11_interop.json";

/// Registry key (under `HKEY_LOCAL_MACHINE`) the OpenXR loader scans for implicit layers.
pub const IMPLICIT_LAYERS_KEY: &str = r"SOFTWARE\Khronos\OpenXR\1\ApiLayers\Implicit";

/// File name of the JSON-backed layer store.
pub const FILE_STORE_NAME: &str = "implicit_layers.json";

/// Overrides the store backend with a JSON file at the given path.
pub const STORE_ENV: &str = "LAYERREG_STORE";

/// Overrides the manifest filename.
pub const MANIFEST_NAME_ENV: &str = "LAYERREG_MANIFEST_NAME";
