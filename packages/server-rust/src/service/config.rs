use std::path::PathBuf;

/// OWS services a QGIS Server host may expose, in reporting order.
/// `LIZMAP` is always appended since this server provides it.
pub const KNOWN_HOST_SERVICES: [&str; 7] =
    ["WMS", "WFS", "WCS", "WMTS", "ATLAS", "CADASTRE", "EXPRESSION"];

/// Versions and capabilities of the host, reported by `GETSERVERSETTINGS`.
#[derive(Debug, Clone)]
pub struct HostInfo {
    /// Full QGIS version string, `<semver>-<release name>` (e.g. `3.34.4-Prizren`).
    pub qgis_version: String,
    /// GDAL library name.
    pub gdal_name: String,
    /// GDAL `VERSION_NUM` (e.g. `3080400` for 3.8.4).
    pub gdal_version_num: u32,
    /// OWS services registered on the host.
    pub services: Vec<String>,
}

impl Default for HostInfo {
    fn default() -> Self {
        Self {
            qgis_version: "3.34.4-Prizren".to_string(),
            gdal_name: "GDAL".to_string(),
            gdal_version_num: 3_080_400,
            services: vec!["WMS".to_string(), "WFS".to_string(), "WMTS".to_string()],
        }
    }
}

/// Server-level configuration for the LIZMAP service.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    pub host: HostInfo,
    /// Plugin `metadata.txt`; its `[general] version` is the reported
    /// Lizmap version.
    pub plugin_metadata_path: Option<PathBuf>,
}
