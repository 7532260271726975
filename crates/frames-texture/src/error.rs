//! Texture cache errors

use frames_net::NetError;

/// Errors produced while loading a texture or configuring the cache.
///
/// Fetch and decode errors never cross the cache boundary: a seeker captures
/// them and the entry stores their message as its failure state.
#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] NetError),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("unsupported image format")]
    UnsupportedFormat,

    #[error("animation has no frames")]
    EmptyAnimation,

    /// Not a failure: every download slot is taken, retry on a later poll.
    #[error("download deferred, all slots busy")]
    CapacityDeferred,

    #[error("failed to spawn seeker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("invalid cache config: {0}")]
    Config(String),
}

impl From<image::ImageError> for TextureError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::Unsupported(_) => Self::UnsupportedFormat,
            other => Self::Decode(other.to_string()),
        }
    }
}
