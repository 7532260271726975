//! Texture cache registry
//!
//! Owns every entry, keyed by URL, and the sink that turns decoded frames
//! into GPU textures. Lives on the render thread; only seekers run elsewhere.

use crate::config::CacheConfig;
use crate::entry::{Entry, EntryState};
use crate::error::TextureError;
use crate::loader::{FetchDecoder, HttpTextureLoader};
use crate::seeker::{SeekerPool, SeekerReport};
use crate::sink::TextureSink;
use smol::channel::Receiver;
use std::collections::HashMap;
use std::sync::Arc;

/// One counted reference to a cache entry.
///
/// Returned by [`TextureCache::acquire`] and given back with
/// [`TextureCache::release`]. A reference outliving its entry (after
/// [`TextureCache::clear_all`]) is inert.
#[derive(Debug, PartialEq, Eq)]
pub struct EntryRef {
    key: Arc<str>,
    instance: u64,
}

impl EntryRef {
    pub fn url(&self) -> &str {
        &self.key
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub pending: usize,
    pub ready: usize,
    pub failed: usize,
    /// Entries with a fetch in flight
    pub seeking: usize,
    /// Download slots in use, including detached seekers still running
    pub active_downloads: usize,
    pub max_active_downloads: usize,
    /// Frames currently backed by a GPU handle
    pub materialized_frames: usize,
}

/// Shared cache of remote textures
pub struct TextureCache<S: TextureSink> {
    entries: HashMap<Arc<str>, Entry<S::Handle>>,
    sink: S,
    seekers: SeekerPool,
    reports: Receiver<SeekerReport>,
    next_instance: u64,
    config: CacheConfig,
}

impl<S: TextureSink> TextureCache<S> {
    /// Create an empty cache
    pub fn new(
        config: CacheConfig,
        loader: Arc<dyn FetchDecoder>,
        sink: S,
    ) -> Result<Self, TextureError> {
        config.validate()?;
        let (seekers, reports) = SeekerPool::new(config.max_active_downloads, loader);

        Ok(Self {
            entries: HashMap::new(),
            sink,
            seekers,
            reports,
            next_instance: 0,
            config,
        })
    }

    /// Create a cache that fetches over HTTP(S) and from `file://` URLs
    pub fn with_http(config: CacheConfig, sink: S) -> Result<Self, TextureError> {
        let loader = HttpTextureLoader::new(&config)?;
        Self::new(config, Arc::new(loader), sink)
    }

    /// Get a reference to the entry for `url`, creating it (and starting its
    /// fetch) on first use.
    pub fn acquire(&mut self, url: &str) -> EntryRef {
        if let Some(entry) = self.entries.get_mut(url) {
            entry.retain();
            return EntryRef {
                key: Arc::clone(entry.key()),
                instance: entry.instance(),
            };
        }

        self.next_instance += 1;
        let key: Arc<str> = Arc::from(url);
        let mut entry = Entry::new(Arc::clone(&key), self.next_instance);
        entry.try_seek(&mut self.seekers);
        self.entries.insert(Arc::clone(&key), entry);

        tracing::debug!("Cache entry created for {}", url);
        EntryRef {
            key,
            instance: self.next_instance,
        }
    }

    /// Give a reference back. The entry stays until the next [`Self::sweep`].
    pub fn release(&mut self, entry: EntryRef) {
        match self.entries.get_mut(&*entry.key) {
            Some(record) if record.instance() == entry.instance => {
                record.release();
            }
            _ => tracing::debug!("Ignoring release of stale reference to {}", entry.key),
        }
    }

    /// Whether the entry has finished loading (successfully or not).
    ///
    /// Applies finished fetches first; a pending entry without a seeker
    /// retries getting a download slot.
    pub fn ready(&mut self, entry: &EntryRef) -> bool {
        self.pump();

        let Some(record) = self
            .entries
            .get_mut(&*entry.key)
            .filter(|r| r.instance() == entry.instance)
        else {
            return false;
        };

        if record.is_ready() {
            return true;
        }
        record.try_seek(&mut self.seekers);
        false
    }

    /// Texture for playback time `time` (ms), or `None` if unavailable.
    ///
    /// Animations repeat: `time` and `time + duration` give the same frame.
    /// To hold the last frame instead, clamp with [`crate::PlaybackClock::looped`].
    pub fn frame(&mut self, entry: &EntryRef, time: u64) -> Option<S::Handle> {
        let record = self
            .entries
            .get_mut(&*entry.key)
            .filter(|r| r.instance() == entry.instance)?;
        record.frame(time, &mut self.sink)
    }

    /// Read access to the entry behind a reference
    pub fn entry(&self, entry: &EntryRef) -> Option<&Entry<S::Handle>> {
        self.entries
            .get(&*entry.key)
            .filter(|r| r.instance() == entry.instance)
    }

    pub fn error(&self, entry: &EntryRef) -> Option<&str> {
        self.entry(entry).and_then(Entry::error)
    }

    pub fn width(&self, entry: &EntryRef) -> u32 {
        self.entry(entry).map_or(0, Entry::width)
    }

    pub fn height(&self, entry: &EntryRef) -> u32 {
        self.entry(entry).map_or(0, Entry::height)
    }

    pub fn duration(&self, entry: &EntryRef) -> u64 {
        self.entry(entry).map_or(0, Entry::duration)
    }

    pub fn is_animated(&self, entry: &EntryRef) -> bool {
        self.entry(entry).is_some_and(Entry::is_animated)
    }

    pub fn frame_count(&self, entry: &EntryRef) -> usize {
        self.entry(entry).map_or(0, Entry::frame_count)
    }

    pub fn frame_delays(&self, entry: &EntryRef) -> &[u64] {
        self.entry(entry).map(Entry::frame_delays).unwrap_or_default()
    }

    /// Drop the entry's textures and fetch it again
    pub fn reload(&mut self, entry: &EntryRef) {
        if let Some(record) = self
            .entries
            .get_mut(&*entry.key)
            .filter(|r| r.instance() == entry.instance)
        {
            record.reload(&mut self.sink, &mut self.seekers);
        }
    }

    /// Reload everything, e.g. after the GPU context was recreated
    pub fn reload_all(&mut self) {
        tracing::info!("Reloading {} cached textures", self.entries.len());
        for record in self.entries.values_mut() {
            record.reload(&mut self.sink, &mut self.seekers);
        }
    }

    /// Apply every finished fetch. Returns how many reports were applied.
    pub fn pump(&mut self) -> usize {
        let options = self.config.decode_options();
        let mut applied = 0;

        while let Ok(report) = self.reports.try_recv() {
            let Some(record) = self.entries.get_mut(&*report.key) else {
                tracing::debug!("Dropping result for evicted {}", report.key);
                continue;
            };
            if !record.accepts(report.seeker) {
                tracing::debug!("Ignoring stale seeker {} for {}", report.seeker, report.key);
                continue;
            }

            match report.outcome {
                Ok(decoded) => record.process_success(decoded, &options),
                Err(e) => record.process_failure(e.to_string()),
            }
            applied += 1;
        }

        applied
    }

    /// Start-of-frame hook: evict entries nobody references.
    ///
    /// Entries whose fetch is still in flight are kept until it reports.
    /// Returns the number of evicted entries.
    pub fn sweep(&mut self) -> usize {
        self.pump();

        let sink = &mut self.sink;
        let before = self.entries.len();
        self.entries.retain(|key, record| {
            if record.ref_count() > 0 || record.has_seeker() {
                return true;
            }
            record.remove(sink);
            tracing::debug!("Evicted {}", key);
            false
        });

        before - self.entries.len()
    }

    /// World unload hook: destroy everything, whatever the reference counts
    pub fn clear_all(&mut self) {
        tracing::info!("Clearing {} cached textures", self.entries.len());
        for record in self.entries.values_mut() {
            record.remove(&mut self.sink);
        }
        self.entries.clear();

        // Anything still queued belongs to entries that no longer exist
        while self.reports.try_recv().is_ok() {}
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            entries: self.entries.len(),
            active_downloads: self.seekers.slots().active(),
            max_active_downloads: self.seekers.slots().max(),
            ..CacheStats::default()
        };

        for record in self.entries.values() {
            match record.state() {
                EntryState::Pending => stats.pending += 1,
                EntryState::Ready => stats.ready += 1,
                EntryState::Failed => stats.failed += 1,
            }
            if record.has_seeker() {
                stats.seeking += 1;
            }
            stats.materialized_frames += record.materialized_count();
        }

        stats
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{DecodedImage, DecodedTexture};
    use crate::sink::MemorySink;

    struct ImmediateLoader;

    impl FetchDecoder for ImmediateLoader {
        fn load(&self, _url: &str) -> Result<DecodedTexture, TextureError> {
            Ok(DecodedTexture::Still(DecodedImage::from_rgba(vec![0; 4], 1, 1)))
        }
    }

    fn cache() -> TextureCache<MemorySink> {
        TextureCache::new(CacheConfig::default(), Arc::new(ImmediateLoader), MemorySink::new()).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = CacheConfig {
            max_active_downloads: 0,
            ..CacheConfig::default()
        };
        assert!(TextureCache::new(config, Arc::new(ImmediateLoader), MemorySink::new()).is_err());
    }

    #[test]
    fn test_acquire_shares_entry() {
        let mut cache = cache();
        let a = cache.acquire("https://example.com/a.png");
        let b = cache.acquire("https://example.com/a.png");

        assert_eq!(a, b);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.entry(&a).unwrap().ref_count(), 2);
    }

    #[test]
    fn test_unknown_reference_is_inert() {
        let mut cache = cache();
        let a = cache.acquire("https://example.com/a.png");
        cache.clear_all();

        assert!(!cache.ready(&a));
        assert_eq!(cache.frame(&a, 0), None);
        assert_eq!(cache.width(&a), 0);
        assert!(cache.frame_delays(&a).is_empty());
        cache.release(a);
        assert!(cache.is_empty());
    }
}
