pub mod loader;
pub mod schema;

pub use loader::{ConfigError, ConfigLoader};
pub use schema::{
    ArtifactsConfig, BrowserConfig, ConsoleConfig, Credentials, DiscoveryConfig, JobPilotConfig,
    LoggingConfig, SessionConfig, TimingConfig,
};
