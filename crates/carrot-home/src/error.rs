//! Top-level error type with exit codes and diagnostics.

use miette::Diagnostic;
use thiserror::Error;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum AppError {
    #[error(transparent)]
    #[diagnostic(
        code(carrot_home::config),
        help("Check the config file, or override settings with CARROT_HOME_<SECTION>__<KEY> environment variables")
    )]
    Config(#[from] carrot_config::ConfigError),

    #[error("Could not build the Carrot cloud client: {0}")]
    #[diagnostic(code(carrot_home::client))]
    Client(#[from] carrot_api::Error),

    #[error(transparent)]
    #[diagnostic(
        code(carrot_home::mqtt),
        help("Check the [mqtt] section: broker address, port, TLS and credentials")
    )]
    Bridge(#[from] carrot_bridge::BridgeError),

    #[error("Internal error: {0}")]
    #[diagnostic(code(carrot_home::internal))]
    Internal(String),
}

impl AppError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => exit_code::USAGE,
            Self::Bridge(_) => exit_code::CONNECTION,
            Self::Client(_) | Self::Internal(_) => exit_code::GENERAL,
        }
    }
}
