//! Application errors.

use thiserror::Error;

use sparsevox_rendering::RenderError;
use sparsevox_shared::ConfigError;

/// Anything that stops the frame loop.
#[derive(Error, Debug)]
pub enum AppError {
    /// The renderer failed.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// The config file was unusable.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for the application crate.
pub type AppResult<T> = Result<T, AppError>;
