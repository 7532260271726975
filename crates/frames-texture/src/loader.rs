//! Fetch + decode
//!
//! [`FetchDecoder`] is what a seeker runs on its background thread.

use crate::config::CacheConfig;
use crate::decode::{self, DecodeOptions, DecodedTexture};
use crate::error::TextureError;
use frames_net::{Request, ResourceLoader};

/// Formats the decoder understands
const ACCEPT_IMAGES: &str = "image/png, image/gif, image/webp, image/jpeg;q=0.9, */*;q=0.5";

/// Downloads a URL and decodes it into frames.
///
/// Called from seeker threads, so implementations must be thread-safe and
/// must not touch GPU state.
pub trait FetchDecoder: Send + Sync + 'static {
    fn load(&self, url: &str) -> Result<DecodedTexture, TextureError>;
}

/// Default loader: `frames-net` for the bytes, the image crate for pixels
#[derive(Debug, Clone)]
pub struct HttpTextureLoader {
    loader: ResourceLoader,
    options: DecodeOptions,
}

impl HttpTextureLoader {
    pub fn new(config: &CacheConfig) -> Result<Self, TextureError> {
        Ok(Self {
            loader: ResourceLoader::with_config(config.loader_config())?,
            options: config.decode_options(),
        })
    }
}

impl FetchDecoder for HttpTextureLoader {
    fn load(&self, url: &str) -> Result<DecodedTexture, TextureError> {
        let request = Request::get(url).with_header("Accept", ACCEPT_IMAGES);
        let response = self.loader.request(request)?;
        tracing::debug!(
            "Decoding {} ({} bytes, {})",
            url,
            response.body.len(),
            response.content_type().unwrap_or("unknown type")
        );
        decode::decode(&response.body, &self.options)
    }
}
