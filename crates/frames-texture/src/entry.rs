//! Cache entries
//!
//! One [`Entry`] per URL: decode state, the lazily filled frame table, timing,
//! and the reference count. Only the render thread mutates entries.

use crate::decode::{DecodeOptions, DecodedImage, DecodedTexture};
use crate::seeker::{SeekerId, SeekerPool};
use crate::sink::TextureSink;
use crate::timeline::Timeline;
use crate::TextureError;
use std::sync::Arc;

/// Load state of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Waiting for a seeker, or for a free download slot
    Pending,
    /// Decoded; frames can be requested
    Ready,
    /// Fetch or decode failed; see [`Entry::error`]
    Failed,
}

/// Decoded frames not uploaded yet. Each frame is taken out on upload.
#[derive(Debug)]
struct FrameSource {
    frames: Vec<Option<DecodedImage>>,
}

impl FrameSource {
    fn take(&mut self, index: usize) -> Option<DecodedImage> {
        self.frames.get_mut(index).and_then(Option::take)
    }
}

/// Cache record for one URL
#[derive(Debug)]
pub struct Entry<H> {
    key: Arc<str>,
    instance: u64,
    refs: usize,
    state: EntryState,
    width: u32,
    height: u32,
    frames: Vec<Option<H>>,
    timeline: Timeline,
    source: Option<FrameSource>,
    remaining: usize,
    error: Option<String>,
    seeker: Option<SeekerId>,
}

impl<H: Copy + Eq + std::fmt::Debug> Entry<H> {
    /// New pending entry holding one reference
    pub(crate) fn new(key: Arc<str>, instance: u64) -> Self {
        Self {
            key,
            instance,
            refs: 1,
            state: EntryState::Pending,
            width: 0,
            height: 0,
            frames: Vec::new(),
            timeline: Timeline::still(),
            source: None,
            remaining: 0,
            error: None,
            seeker: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.key
    }

    pub(crate) fn key(&self) -> &Arc<str> {
        &self.key
    }

    pub(crate) fn instance(&self) -> u64 {
        self.instance
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn ref_count(&self) -> usize {
        self.refs
    }

    /// True once the entry left `Pending` (decoded or failed)
    pub fn is_ready(&self) -> bool {
        self.state != EntryState::Pending
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Total animation length in ms, 0 for still images
    pub fn duration(&self) -> u64 {
        self.timeline.duration()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    /// Start time of every frame (ms); empty unless ready
    pub fn frame_delays(&self) -> &[u64] {
        if self.state == EntryState::Ready {
            self.timeline.starts()
        } else {
            &[]
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Frames that already have a GPU handle
    pub fn materialized_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_some()).count()
    }

    /// Whether decoded pixels are still held for frames not yet uploaded
    pub fn has_decoded_source(&self) -> bool {
        self.source.is_some()
    }

    /// Whether a fetch for this entry is in flight
    pub fn has_seeker(&self) -> bool {
        self.seeker.is_some()
    }

    pub(crate) fn retain(&mut self) {
        self.refs += 1;
    }

    /// Drop one reference. Returns false if there was none to drop.
    pub(crate) fn release(&mut self) -> bool {
        if self.refs == 0 {
            tracing::warn!("Release of {} with no references left", self.key);
            return false;
        }
        self.refs -= 1;
        true
    }

    /// Start a fetch unless one is running or the entry is settled.
    /// At the download cap nothing happens; the next poll retries.
    pub(crate) fn try_seek(&mut self, pool: &mut SeekerPool) {
        if self.seeker.is_some() || self.state != EntryState::Pending {
            return;
        }

        match pool.try_start(&self.key) {
            Ok(id) => {
                tracing::debug!("Entry {} attached seeker {}", self.key, id);
                self.seeker = Some(id);
            }
            Err(TextureError::CapacityDeferred) => {
                tracing::trace!("Entry {} deferred, download slots busy", self.key);
            }
            Err(e) => tracing::warn!("Entry {} could not start a seeker: {}", self.key, e),
        }
    }

    /// Whether a report from `seeker` should be applied
    pub(crate) fn accepts(&self, seeker: SeekerId) -> bool {
        self.state == EntryState::Pending && self.seeker == Some(seeker)
    }

    /// Apply a decoded payload. Frame delays are normalized with `options`
    /// whatever loader produced them, so an animation always has a non-zero
    /// duration and every frame gets a slice of it.
    pub(crate) fn process_success(&mut self, decoded: DecodedTexture, options: &DecodeOptions) {
        match decoded {
            DecodedTexture::Still(image) => {
                self.width = image.width;
                self.height = image.height;
                self.frames = vec![None];
                self.timeline = Timeline::still();
                self.source = Some(FrameSource {
                    frames: vec![Some(image)],
                });
            }
            DecodedTexture::Animation { width, height, frames } => {
                if frames.is_empty() {
                    self.process_failure(TextureError::EmptyAnimation.to_string());
                    return;
                }
                self.width = width;
                self.height = height;
                self.timeline =
                    Timeline::from_delays(frames.iter().map(|f| options.frame_delay(f.delay_ms)));
                self.frames = vec![None; frames.len()];
                self.source = Some(FrameSource {
                    frames: frames.into_iter().map(|f| Some(f.image)).collect(),
                });
            }
        }

        self.remaining = self.frames.len();
        self.error = None;
        self.seeker = None;
        self.state = EntryState::Ready;

        tracing::debug!(
            "Entry {} ready: {}x{}, {} frames, {}ms",
            self.key,
            self.width,
            self.height,
            self.frames.len(),
            self.timeline.duration()
        );
    }

    pub(crate) fn process_failure(&mut self, message: String) {
        tracing::debug!("Entry {} failed: {}", self.key, message);

        self.frames.clear();
        self.timeline = Timeline::still();
        self.source = None;
        self.remaining = 0;
        self.error = Some(message);
        self.seeker = None;
        self.state = EntryState::Failed;
    }

    /// Handle of the frame visible at `time` (ms), uploading it on first use.
    /// Animations repeat every `duration` ms. `None` until the entry is ready,
    /// and for failed entries.
    pub(crate) fn frame<S>(&mut self, time: u64, sink: &mut S) -> Option<H>
    where
        S: TextureSink<Handle = H>,
    {
        if self.state != EntryState::Ready {
            return None;
        }

        let index = if self.frames.len() == 1 {
            0
        } else {
            self.timeline.frame_at(self.timeline.wrap(time))
        };
        self.materialize(index, sink)
    }

    fn materialize<S>(&mut self, index: usize, sink: &mut S) -> Option<H>
    where
        S: TextureSink<Handle = H>,
    {
        if let Some(handle) = *self.frames.get(index)? {
            return Some(handle);
        }

        let image = self.source.as_mut()?.take(index)?;
        let handle = sink.upload(&image.pixels, image.width, image.height);
        self.frames[index] = Some(handle);

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            tracing::trace!("Entry {} fully uploaded, dropping decoded frames", self.key);
            self.source = None;
        }

        Some(handle)
    }

    /// Destroy every uploaded frame and go back to `Pending`.
    /// An in-flight seeker is detached; its report will be ignored.
    pub(crate) fn remove<S>(&mut self, sink: &mut S)
    where
        S: TextureSink<Handle = H>,
    {
        for handle in self.frames.drain(..).flatten() {
            sink.destroy(handle);
        }
        self.timeline = Timeline::still();
        self.source = None;
        self.remaining = 0;
        self.error = None;
        self.seeker = None;
        self.state = EntryState::Pending;
    }

    /// Drop all GPU state and fetch again
    pub(crate) fn reload<S>(&mut self, sink: &mut S, pool: &mut SeekerPool)
    where
        S: TextureSink<Handle = H>,
    {
        tracing::debug!("Reloading {}", self.key);
        self.remove(sink);
        self.try_seek(pool);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::AnimationFrame;
    use crate::sink::{MemorySink, TextureId};

    fn entry() -> Entry<TextureId> {
        Entry::new(Arc::from("https://example.com/frame.gif"), 1)
    }

    fn image(shade: u8) -> DecodedImage {
        DecodedImage::from_rgba(vec![shade; 2 * 2 * 4], 2, 2)
    }

    fn animation(delays: &[u64]) -> DecodedTexture {
        DecodedTexture::Animation {
            width: 2,
            height: 2,
            frames: delays
                .iter()
                .enumerate()
                .map(|(i, &delay_ms)| AnimationFrame {
                    image: image(i as u8),
                    delay_ms,
                })
                .collect(),
        }
    }

    #[test]
    fn test_new_entry_is_pending() {
        let entry = entry();
        assert_eq!(entry.state(), EntryState::Pending);
        assert_eq!(entry.ref_count(), 1);
        assert!(!entry.is_ready());
        assert!(entry.frame_delays().is_empty());
    }

    #[test]
    fn test_release_never_goes_negative() {
        let mut entry = entry();
        assert!(entry.release());
        assert!(!entry.release());
        assert_eq!(entry.ref_count(), 0);
    }

    #[test]
    fn test_pending_frame_is_unavailable() {
        let mut entry = entry();
        let mut sink = MemorySink::new();
        assert_eq!(entry.frame(0, &mut sink), None);
        assert_eq!(sink.uploads(), 0);
    }

    #[test]
    fn test_still_image_uploads_once() {
        let mut entry = entry();
        let mut sink = MemorySink::new();
        entry.process_success(DecodedTexture::Still(image(7)), &DecodeOptions::default());

        assert_eq!(entry.state(), EntryState::Ready);
        assert_eq!(entry.duration(), 0);
        assert_eq!(entry.frame_delays(), &[0]);
        assert!(!entry.is_animated());
        assert!(entry.has_decoded_source());

        let first = entry.frame(0, &mut sink).unwrap();
        assert_eq!(entry.frame(5_000, &mut sink), Some(first));
        assert_eq!(sink.uploads(), 1);
        assert!(!entry.has_decoded_source());
    }

    #[test]
    fn test_animation_materializes_selected_frame_only() {
        let mut entry = entry();
        let mut sink = MemorySink::new();
        entry.process_success(animation(&[100, 150, 150]), &DecodeOptions::default());

        assert_eq!(entry.frame_delays(), &[0, 100, 250]);
        assert_eq!(entry.duration(), 400);
        assert_eq!(entry.frame_count(), 3);

        let f1 = entry.frame(150, &mut sink).unwrap();
        assert_eq!(sink.uploads(), 1);
        assert_eq!(entry.materialized_count(), 1);

        let f0 = entry.frame(0, &mut sink).unwrap();
        assert_eq!(entry.frame(1, &mut sink), Some(f0));
        assert_ne!(f0, f1);
        assert!(entry.has_decoded_source());

        let f2 = entry.frame(399, &mut sink).unwrap();
        assert_ne!(f2, f1);
        assert_eq!(sink.uploads(), 3);
        assert!(!entry.has_decoded_source());

        // Second loop
        assert_eq!(entry.frame(400, &mut sink), Some(f0));
        assert_eq!(entry.frame(550, &mut sink), Some(f1));
        assert_eq!(sink.uploads(), 3);
    }

    #[test]
    fn test_failure_discards_frames() {
        let mut entry = entry();
        entry.process_failure("HTTP error: 404".into());

        assert_eq!(entry.state(), EntryState::Failed);
        assert!(entry.is_ready());
        assert_eq!(entry.error(), Some("HTTP error: 404"));
        assert_eq!(entry.frame_count(), 0);
    }

    #[test]
    fn test_remove_destroys_uploaded_frames() {
        let mut entry = entry();
        let mut sink = MemorySink::new();
        entry.process_success(animation(&[50, 50, 50]), &DecodeOptions::default());
        entry.frame(0, &mut sink);
        entry.frame(60, &mut sink);

        entry.remove(&mut sink);
        assert_eq!(entry.state(), EntryState::Pending);
        assert_eq!(sink.live_count(), 0);
        assert_eq!(sink.destroys(), 2);
        assert_eq!(entry.frame(0, &mut sink), None);
    }

    #[test]
    fn test_zero_delays_are_normalized() {
        let mut entry = entry();
        let mut sink = MemorySink::new();
        entry.process_success(animation(&[0, 0, 0]), &DecodeOptions::default());

        assert_eq!(entry.frame_delays(), &[0, 100, 200]);
        assert_eq!(entry.duration(), 300);

        for time in [0, 150, 250] {
            entry.frame(time, &mut sink);
        }
        assert_eq!(entry.materialized_count(), 3);
        assert!(!entry.has_decoded_source());
    }

    #[test]
    fn test_short_delays_clamped_to_minimum() {
        let mut entry = entry();
        entry.process_success(animation(&[100, 1, 100]), &DecodeOptions::default());

        assert_eq!(entry.frame_delays(), &[0, 100, 120]);
        assert_eq!(entry.duration(), 220);
    }

    #[test]
    fn test_empty_animation_fails() {
        let mut entry = entry();
        entry.process_success(
            DecodedTexture::Animation {
                width: 1,
                height: 1,
                frames: Vec::new(),
            },
            &DecodeOptions::default(),
        );
        assert_eq!(entry.state(), EntryState::Failed);
        assert_eq!(entry.error(), Some("animation has no frames"));
    }
}
