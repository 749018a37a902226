use std::path::PathBuf;
use thiserror::Error;

/// Failures the overlay can run into, from startup to teardown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverlayError {
    #[error("failed to open overlay surface: {0}")]
    SurfaceInit(String),
    #[error("rendering failed: {0}")]
    Render(String),
    #[error("kill-switch input hook failed: {0}")]
    InputHook(String),
    #[error("network lookup failed: {0}")]
    Network(String),
    #[error("failed to load effects from {path}: {reason}")]
    Asset { path: PathBuf, reason: String },
}

impl OverlayError {
    /// Network failures are swallowed; everything else ends the process.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, OverlayError::Network(_))
    }

    pub(crate) fn asset(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        OverlayError::Asset {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
