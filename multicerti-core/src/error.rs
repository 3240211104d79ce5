//! Error types for Multicerti

use crate::command::CommandError;
use crate::config::loader::ConfLoadError;
use crate::config::validation::ValidationErrors;
use crate::deploy::DeployError;
use crate::render::RenderError;
use crate::vhost::VhostError;
use thiserror::Error;

/// Result type for Multicerti operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Multicerti
#[derive(Error, Debug)]
pub enum Error {
    /// The input document could not be read or written
    #[error("Configuration error: {0}")]
    Conf(#[from] ConfLoadError),

    /// The input document is malformed
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    /// A virtual host could not be constructed
    #[error("Virtual host error: {0}")]
    Vhost(#[from] VhostError),

    /// Rendering the server configuration failed
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Deployment failed
    #[error("Deploy error: {0}")]
    Deploy(#[from] DeployError),

    /// An external command failed
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
