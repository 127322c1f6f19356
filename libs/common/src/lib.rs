//! Shared bootstrap utilities for the LoRa master-station services
//!
//! Provides logging initialization, startup banners and shutdown signal
//! handling used by every binary in the workspace.

pub mod logging;
pub mod service_bootstrap;
pub mod shutdown;

pub use logging::{init_with_config, LogConfig};
pub use service_bootstrap::{init_logging, print_startup_banner, ServiceInfo};
pub use shutdown::wait_for_shutdown;
