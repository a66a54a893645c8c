pub mod config;
pub mod monitor;
pub mod pipeline;
pub mod platform;
pub mod recording;
pub mod scheduler;
pub mod session_refresh;

use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub use config::{Config, ConfigStore};
pub use monitor::{CycleError, CycleOutcome, MonitorSettings, ProjectMonitor, ReplyTemplates};
pub use pipeline::{PipelineError, PipelineStep, RevisionPipeline, RevisionRequest};
pub use platform::{PlatformClient, PlatformError};
pub use recording::RecordingLogger;
pub use scheduler::PollingScheduler;
pub use session_refresh::SessionRefresher;

/// Log to stderr at INFO unless `RUST_LOG` says otherwise.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Platform client for `config`, recording traffic when the config asks for it.
/// Must be called from inside a tokio runtime.
pub fn platform_client(config: &Config) -> PlatformClient {
    let recording_logger = if config.recording_enabled {
        info!("Recording enabled, logging to: {}", config.recording_log_path);
        Some(RecordingLogger::spawn(PathBuf::from(&config.recording_log_path)))
    } else {
        None
    };

    PlatformClient::new_with_recording(&config.base_url, recording_logger)
}

/// Wire a monitor for `config`. Refreshed cookies are written to `store`.
pub fn build_monitor(config: &Config, client: PlatformClient, store: ConfigStore) -> ProjectMonitor {
    let refresher = SessionRefresher::new(client.clone(), Some(store));
    ProjectMonitor::new(client, refresher, MonitorSettings::from_config(config))
}
