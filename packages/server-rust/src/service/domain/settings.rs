//! `GETSERVERSETTINGS`: host versions, available services and plugin version.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use config::{Config, File, FileFormat};
use serde_json::{json, Value};
use tower::Service;
use tracing::error;

use crate::service::config::{ServerConfig, KNOWN_HOST_SERVICES};
use crate::service::operation::{Operation, OperationError, OperationResponse};

/// Reported when the plugin version cannot be read.
pub const UNKNOWN_VERSION: &str = "NULL";

/// Answers `GETSERVERSETTINGS` from static host configuration.
#[derive(Debug)]
pub struct ServerSettingsService {
    config: Arc<ServerConfig>,
}

impl ServerSettingsService {
    #[must_use]
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self { config }
    }

    /// Builds the settings document.
    #[must_use]
    pub fn settings(&self) -> Value {
        let host = &self.config.host;
        let (version, name) = split_qgis_version(&host.qgis_version);

        let mut services: Vec<&str> = KNOWN_HOST_SERVICES
            .iter()
            .copied()
            .filter(|known| host.services.iter().any(|s| s.eq_ignore_ascii_case(known)))
            .collect();
        services.push("LIZMAP");

        json!({
            "qgis": {
                "version": version,
                "name": name,
                "version_int": version_int(version),
            },
            "gdalogr": {
                "name": host.gdal_name,
                "version_int": host.gdal_version_num,
            },
            "services": services,
            "lizmap": {
                "name": "Lizmap",
                "version": plugin_version(self.config.plugin_metadata_path.as_deref()),
            },
        })
    }
}

/// Splits `3.34.4-Prizren` into `("3.34.4", "Prizren")`.
#[must_use]
pub fn split_qgis_version(full: &str) -> (&str, &str) {
    full.split_once('-').unwrap_or((full, ""))
}

/// `major * 10000 + minor * 100 + patch`, missing components count as 0.
#[must_use]
pub fn version_int(version: &str) -> u32 {
    let mut parts = version
        .split('.')
        .map(|p| p.trim().parse::<u32>().unwrap_or(0));
    let major = parts.next().unwrap_or(0);
    let minor = parts.next().unwrap_or(0);
    let patch = parts.next().unwrap_or(0);
    major
        .saturating_mul(10_000)
        .saturating_add(minor.saturating_mul(100))
        .saturating_add(patch)
}

/// Reads `[general] version` from the plugin `metadata.txt`.
///
/// Degrades to [`UNKNOWN_VERSION`] with an error log.
#[must_use]
pub fn plugin_version(path: Option<&Path>) -> String {
    let Some(path) = path else {
        error!("plugin metadata.txt is not configured, Lizmap version reported as NULL");
        return UNKNOWN_VERSION.to_string();
    };

    let version = Config::builder()
        .add_source(File::from(path).format(FileFormat::Ini).required(true))
        .build()
        .and_then(|metadata| metadata.get_string("general.version"));

    match version {
        Ok(version) => version,
        Err(e) => {
            error!(
                path = %path.display(),
                error = %e,
                "cannot read the plugin version from metadata.txt, Lizmap version reported as NULL"
            );
            UNKNOWN_VERSION.to_string()
        }
    }
}

impl Service<Operation> for Arc<ServerSettingsService> {
    type Response = OperationResponse;
    type Error = OperationError;
    type Future = Pin<Box<dyn Future<Output = Result<OperationResponse, OperationError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, op: Operation) -> Self::Future {
        let svc = Arc::clone(self);
        Box::pin(async move {
            match op {
                Operation::GetServerSettings { .. } => Ok(OperationResponse::Json(svc.settings())),
                Operation::GetSubsetString { .. } => Err(OperationError::WrongService),
            }
        })
    }
}
