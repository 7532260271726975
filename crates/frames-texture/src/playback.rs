//! Playback helpers for picture displays
//!
//! Converts host ticks into playback times and keeps one cache reference per
//! display.

use crate::config::CacheConfig;
use crate::registry::{EntryRef, TextureCache};
use crate::sink::TextureSink;

/// Host tick to playback time conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackClock {
    ms_per_tick: u64,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl PlaybackClock {
    pub fn new(ms_per_tick: u64) -> Self {
        Self { ms_per_tick }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ms_per_tick)
    }

    /// Playback time (ms) at `tick`, advanced by the partial tick only while
    /// playing so a paused display does not jitter.
    pub fn time(&self, tick: u64, partial_tick: f32, playing: bool) -> u64 {
        let base = tick.saturating_mul(self.ms_per_tick);
        if !playing {
            return base;
        }
        let partial = (partial_tick.clamp(0.0, 1.0) * self.ms_per_tick as f32) as u64;
        base.saturating_add(partial)
    }

    /// Fold `time` into the animation when looping, otherwise stop on the
    /// last frame. Still images (`duration == 0`) are left alone.
    pub fn looped(time: u64, duration: u64, looping: bool) -> u64 {
        if duration == 0 {
            time
        } else if looping {
            time % duration
        } else {
            time.min(duration - 1)
        }
    }
}

/// A display showing one cached picture or animation
#[derive(Debug)]
pub struct PictureDisplay<H> {
    entry: EntryRef,
    clock: PlaybackClock,
    texture: Option<H>,
}

impl<H: Copy + Eq + std::fmt::Debug> PictureDisplay<H> {
    /// Acquire `url` from the cache for this display
    pub fn new<S>(cache: &mut TextureCache<S>, url: &str) -> Self
    where
        S: TextureSink<Handle = H>,
    {
        Self {
            entry: cache.acquire(url),
            clock: PlaybackClock::from_config(cache.config()),
            texture: None,
        }
    }

    pub fn url(&self) -> &str {
        self.entry.url()
    }

    /// Resolve the texture to draw this frame
    pub fn prepare<S>(
        &mut self,
        cache: &mut TextureCache<S>,
        playing: bool,
        looping: bool,
        tick: u64,
        partial_tick: f32,
    ) -> Option<H>
    where
        S: TextureSink<Handle = H>,
    {
        self.texture = if cache.ready(&self.entry) {
            let time = self.clock.time(tick, partial_tick, playing);
            let time = PlaybackClock::looped(time, cache.duration(&self.entry), looping);
            cache.frame(&self.entry, time)
        } else {
            None
        };
        self.texture
    }

    /// Texture chosen by the last [`Self::prepare`]
    pub fn texture(&self) -> Option<H> {
        self.texture
    }

    pub fn width<S>(&self, cache: &TextureCache<S>) -> u32
    where
        S: TextureSink<Handle = H>,
    {
        cache.width(&self.entry)
    }

    pub fn height<S>(&self, cache: &TextureCache<S>) -> u32
    where
        S: TextureSink<Handle = H>,
    {
        cache.height(&self.entry)
    }

    pub fn error<'a, S>(&self, cache: &'a TextureCache<S>) -> Option<&'a str>
    where
        S: TextureSink<Handle = H>,
    {
        cache.error(&self.entry)
    }

    /// Give the cache reference back
    pub fn release<S>(self, cache: &mut TextureCache<S>)
    where
        S: TextureSink<Handle = H>,
    {
        cache.release(self.entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_time() {
        let clock = PlaybackClock::new(50);
        assert_eq!(clock.time(0, 0.0, true), 0);
        assert_eq!(clock.time(3, 0.5, true), 175);
        assert_eq!(clock.time(3, 0.5, false), 150);
        assert_eq!(clock.time(1, 7.0, true), 100);
    }

    #[test]
    fn test_looping() {
        assert_eq!(PlaybackClock::looped(450, 400, true), 50);
        assert_eq!(PlaybackClock::looped(450, 400, false), 399);
        assert_eq!(PlaybackClock::looped(120, 400, false), 120);
        assert_eq!(PlaybackClock::looped(450, 0, true), 450);
        assert_eq!(PlaybackClock::looped(450, 0, false), 450);
    }

    #[test]
    fn test_default_clock_uses_config_tick() {
        assert_eq!(PlaybackClock::default(), PlaybackClock::new(50));
    }
}
