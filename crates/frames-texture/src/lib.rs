//! Frames Texture Cache
//!
//! Shared cache of remote images and animations for in-world frame displays.
//!
//! A [`TextureCache`] maps URLs to reference-counted entries. The first
//! [`TextureCache::acquire`] of a URL starts a background seeker that fetches
//! and decodes the resource; the number of seekers in flight is capped. Decoded
//! frames are uploaded through a [`TextureSink`] lazily, the first time a
//! playback time selects them, and always on the thread that owns the cache.
//!
//! The host drives two hooks: [`TextureCache::sweep`] at the start of every
//! frame (evicts unreferenced entries) and [`TextureCache::clear_all`] when the
//! world is unloaded.

pub mod config;
pub mod decode;
pub mod entry;
pub mod error;
pub mod loader;
pub mod playback;
pub mod registry;
pub mod seeker;
pub mod sink;
pub mod timeline;

pub use config::CacheConfig;
pub use decode::{AnimationFrame, DecodeOptions, DecodedImage, DecodedTexture, ImageFormat};
pub use entry::{Entry, EntryState};
pub use error::TextureError;
pub use loader::{FetchDecoder, HttpTextureLoader};
pub use playback::{PictureDisplay, PlaybackClock};
pub use registry::{CacheStats, EntryRef, TextureCache};
pub use seeker::{DownloadSlots, SlotPermit};
pub use sink::{MemorySink, TextureId, TextureSink};
pub use timeline::Timeline;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
