// ============================================================================
// ERROR TYPES: one enum per concern, all recoverable
// ============================================================================

use std::path::PathBuf;

use thiserror::Error;

/// A single file could not be turned into a usable bitmap.
///
/// Reported per file; sibling decodes in the same batch are unaffected.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("'{name}': unsupported image format")]
    Unsupported { name: String },
    #[error("'{name}': corrupt image data ({reason})")]
    Corrupt { name: String, reason: String },
    #[error("'{name}': image has zero width or height")]
    Empty { name: String },
    #[error("'{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("'{name}': decode worker dropped before finishing")]
    Cancelled { name: String },
}

impl DecodeError {
    /// Name of the file the error refers to.
    pub fn file_name(&self) -> String {
        match self {
            DecodeError::Unsupported { name }
            | DecodeError::Corrupt { name, .. }
            | DecodeError::Empty { name }
            | DecodeError::Cancelled { name } => name.clone(),
            DecodeError::Io { path, .. } => path.display().to_string(),
        }
    }
}

/// A resize frame that would collapse the layer below the minimum size.
///
/// Routine during fast pointer motion; the controller swallows it.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("resize to {width}×{height} rejected (minimum {min})")]
pub struct InvalidGeometry {
    pub width: f32,
    pub height: f32,
    pub min: f32,
}

#[derive(Debug, Error)]
pub enum CompositionError {
    #[error("nothing to composite: no visible layers")]
    EmptyComposition,
    #[error("canvas size has not been chosen yet")]
    CanvasUnsized,
    #[error("target size {width}×{height} is empty")]
    EmptyTarget { width: u32, height: u32 },
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanvasError {
    #[error("canvas is {current_w}×{current_h} and already holds layers; clear it first")]
    SizeLocked { current_w: u32, current_h: u32 },
    #[error("invalid canvas size {width}×{height}")]
    InvalidSize { width: u32, height: u32 },
}

/// Failure reported by the external generation service.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation service failed: {0}")]
    Service(String),
    #[error("generation service returned neither image nor text")]
    EmptyResponse,
}

/// Terminal failure of one submission.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("a submission is already in flight")]
    Busy,
    #[error(transparent)]
    Composition(#[from] CompositionError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid value '{value}' for '{key}'")]
    InvalidValue { key: String, value: String },
}
