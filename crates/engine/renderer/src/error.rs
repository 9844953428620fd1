//! Error types for GL resource creation

use thiserror::Error;

/// Failures while building GL programs and buffers
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("shader compilation failed: {0}")]
    ShaderCompile(String),

    #[error("program link failed: {0}")]
    ProgramLink(String),

    #[error("failed to create {what}: {reason}")]
    Resource { what: &'static str, reason: String },

    #[error("renderer not initialized; call init_gl first")]
    NotInitialized,

    #[error("failed to write image: {0}")]
    Image(#[from] image::ImageError),
}

impl RenderError {
    pub(crate) fn resource(what: &'static str) -> impl FnOnce(String) -> Self {
        move |reason| Self::Resource { what, reason }
    }
}

pub type Result<T> = std::result::Result<T, RenderError>;
