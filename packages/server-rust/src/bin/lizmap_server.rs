//! Lizmap server binary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use lizmap_server::network::TlsConfig;
use lizmap_server::service::HostInfo;
use lizmap_server::{FsProjectStore, LizmapService, NetworkConfig, NetworkModule, ServerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Fmt,
    Json,
}

/// Serves `SERVICE=LIZMAP` OWS requests for the QGIS projects under a root.
#[derive(Debug, Parser)]
#[command(name = "lizmap-server", version)]
struct Args {
    /// Address to bind to.
    #[arg(long, env = "LIZMAP_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(short, long, env = "LIZMAP_PORT", default_value_t = 8080)]
    port: u16,

    /// Directory that `MAP` paths are resolved against.
    #[arg(long, env = "LIZMAP_PROJECT_ROOT")]
    project_root: PathBuf,

    /// QGIS version reported by `GETSERVERSETTINGS`.
    #[arg(long, env = "QGIS_VERSION", default_value = "3.34.4-Prizren")]
    qgis_version: String,

    #[arg(long, env = "GDAL_NAME", default_value = "GDAL")]
    gdal_name: String,

    /// GDAL `VERSION_NUM`.
    #[arg(long, env = "GDAL_VERSION_NUM", default_value_t = 3_080_400)]
    gdal_version_num: u32,

    /// OWS services registered on the host, comma separated.
    #[arg(
        long,
        env = "LIZMAP_HOST_SERVICES",
        value_delimiter = ',',
        default_value = "WMS,WFS,WMTS"
    )]
    services: Vec<String>,

    /// Lizmap plugin `metadata.txt`.
    #[arg(long, env = "LIZMAP_PLUGIN_METADATA")]
    plugin_metadata: Option<PathBuf>,

    #[arg(long, env = "LIZMAP_CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    cors_origins: Vec<String>,

    /// Request timeout in seconds.
    #[arg(long, env = "LIZMAP_REQUEST_TIMEOUT", default_value_t = 30)]
    request_timeout: u64,

    #[arg(long, env = "LIZMAP_TLS_CERT", requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    #[arg(long, env = "LIZMAP_TLS_KEY", requires = "tls_cert")]
    tls_key: Option<PathBuf>,

    #[arg(long, env = "LIZMAP_LOG_FORMAT", value_enum, default_value_t = LogFormat::Fmt)]
    log_format: LogFormat,
}

impl Args {
    fn network_config(&self) -> NetworkConfig {
        let tls = match (&self.tls_cert, &self.tls_key) {
            (Some(cert_path), Some(key_path)) => Some(TlsConfig {
                cert_path: cert_path.clone(),
                key_path: key_path.clone(),
            }),
            _ => None,
        };
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            tls,
            cors_origins: self.cors_origins.clone(),
            request_timeout: Duration::from_secs(self.request_timeout),
            ..NetworkConfig::default()
        }
    }

    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: HostInfo {
                qgis_version: self.qgis_version.clone(),
                gdal_name: self.gdal_name.clone(),
                gdal_version_num: self.gdal_version_num,
                services: self.services.iter().map(|s| s.trim().to_string()).collect(),
            },
            plugin_metadata_path: self.plugin_metadata.clone(),
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lizmap_server=info,lizmap_core=info,tower_http=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Fmt => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let service = Arc::new(LizmapService::new(Arc::new(args.server_config())));
    let projects = Arc::new(FsProjectStore::new(&args.project_root));

    let mut module = NetworkModule::new(args.network_config(), service, projects);
    let port = module.start().await?;
    info!(
        port,
        project_root = %args.project_root.display(),
        version = env!("CARGO_PKG_VERSION"),
        "Lizmap server started"
    );

    module.serve(shutdown_signal()).await?;
    info!("Lizmap server stopped");
    Ok(())
}
