//! Unified service bootstrap utilities
//!
//! Startup banner and logging initialization shared by the workspace
//! binaries.

use std::path::PathBuf;

use tracing::{info, Level};

use crate::logging::{self, LogConfig};

/// Service metadata for startup
pub struct ServiceInfo {
    /// Service name (e.g., "lorasrv")
    pub name: String,
    /// Service version from Cargo.toml
    pub version: String,
    /// Service description
    pub description: String,
}

impl ServiceInfo {
    /// Create new service info
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: description.into(),
        }
    }
}

/// Print unified startup banner for any service
pub fn print_startup_banner(service: &ServiceInfo) {
    let banner = match service.name.as_str() {
        "lorasrv" => {
            r#"
██╗      ██████╗ ██████╗  █████╗ ███████╗██████╗ ██╗   ██╗
██║     ██╔═══██╗██╔══██╗██╔══██╗██╔════╝██╔══██╗██║   ██║
██║     ██║   ██║██████╔╝███████║███████╗██████╔╝██║   ██║
██║     ██║   ██║██╔══██╗██╔══██║╚════██║██╔══██╗╚██╗ ██╔╝
███████╗╚██████╔╝██║  ██║██║  ██║███████║██║  ██║ ╚████╔╝
╚══════╝ ╚═════╝ ╚═╝  ╚═╝╚═╝  ╚═╝╚══════╝╚═╝  ╚═╝  ╚═══╝
            "#
        },
        _ => {
            r#"
███████╗███████╗██████╗ ██╗   ██╗██╗ ██████╗███████╗
██╔════╝██╔════╝██╔══██╗██║   ██║██║██╔════╝██╔════╝
███████╗█████╗  ██████╔╝██║   ██║██║██║     █████╗
╚════██║██╔══╝  ██╔══██╗╚██╗ ██╔╝██║██║     ██╔══╝
███████║███████╗██║  ██║ ╚████╔╝ ██║╚██████╗███████╗
╚══════╝╚══════╝╚═╝  ╚═╝  ╚═══╝  ╚═╝ ╚═════╝╚══════╝
            "#
        },
    };

    info!("{}", banner);
    info!("");
    info!(" {} v{}", service.name.to_uppercase(), service.version);
    info!(" {}", service.description);
    info!("");
}

/// Initialize logging for a service with standard configuration
///
/// Console level priority: `RUST_LOG` env > `level` argument > INFO.
/// The file layer is enabled only when `log_dir` is given.
pub fn init_logging(
    service: &ServiceInfo,
    level: Option<&str>,
    log_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let console_level = level
        .and_then(|s| s.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    let config = LogConfig {
        service_name: service.name.clone(),
        console_level,
        log_dir,
        file_level: Level::DEBUG,
    };

    logging::init_with_config(config)
}
