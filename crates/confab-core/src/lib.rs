//! Shared configuration for the confab workspace.

pub mod config;

pub use config::{ConfabConfig, ConfigError, GatewayConfig, OpenAiSettings, SlackConfig};
