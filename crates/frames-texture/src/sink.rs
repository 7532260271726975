//! GPU resource sink
//!
//! The cache never talks to a graphics API directly. It hands decoded pixels
//! to a [`TextureSink`] owned by the render thread and stores the handles it
//! gets back.

use std::collections::HashMap;

/// Creates and destroys GPU-bindable textures.
///
/// Only ever called from the thread that owns the [`crate::TextureCache`].
pub trait TextureSink {
    /// Opaque texture handle
    type Handle: Copy + Eq + std::fmt::Debug;

    /// Upload tightly packed RGBA8 pixels
    fn upload(&mut self, pixels: &[u8], width: u32, height: u32) -> Self::Handle;

    /// Release a handle returned by [`TextureSink::upload`]
    fn destroy(&mut self, handle: Self::Handle);
}

/// Texture id handed out by [`MemorySink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Sink that keeps uploads in host memory.
///
/// Used for headless hosts and tools; it also records every upload and
/// destroy so callers can check handles are released exactly once.
#[derive(Debug, Default)]
pub struct MemorySink {
    next_id: u32,
    live: HashMap<TextureId, usize>,
    uploads: usize,
    destroys: usize,
    invalid_destroys: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles uploaded and not yet destroyed
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn is_live(&self, id: TextureId) -> bool {
        self.live.contains_key(&id)
    }

    /// Bytes held by live textures
    pub fn resident_bytes(&self) -> usize {
        self.live.values().sum()
    }

    pub fn uploads(&self) -> usize {
        self.uploads
    }

    pub fn destroys(&self) -> usize {
        self.destroys
    }

    /// Destroy calls for unknown or already destroyed handles
    pub fn invalid_destroys(&self) -> usize {
        self.invalid_destroys
    }
}

impl TextureSink for MemorySink {
    type Handle = TextureId;

    fn upload(&mut self, pixels: &[u8], width: u32, height: u32) -> TextureId {
        self.next_id += 1;
        let id = TextureId(self.next_id);
        self.live.insert(id, pixels.len());
        self.uploads += 1;
        tracing::trace!("Uploaded texture {:?} ({}x{})", id, width, height);
        id
    }

    fn destroy(&mut self, handle: TextureId) {
        if self.live.remove(&handle).is_some() {
            self.destroys += 1;
        } else {
            self.invalid_destroys += 1;
            tracing::warn!("Destroy of unknown texture {:?}", handle);
        }
    }
}
