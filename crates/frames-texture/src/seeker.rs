//! Seekers: bounded background fetches
//!
//! A seeker is one fetch + decode attempt for one entry, run on its own
//! thread. A shared slot counter caps how many run at once. Results go back to
//! the render thread over a channel and are applied there.

use crate::decode::DecodedTexture;
use crate::error::TextureError;
use crate::loader::FetchDecoder;
use smol::channel::{Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

/// Unique id of one fetch attempt
pub(crate) type SeekerId = u64;

#[derive(Debug)]
struct SlotState {
    active: Mutex<usize>,
    max: usize,
}

/// Counter of in-flight downloads, shared with seeker threads
#[derive(Debug, Clone)]
pub struct DownloadSlots {
    state: Arc<SlotState>,
}

impl DownloadSlots {
    pub fn new(max: usize) -> Self {
        Self {
            state: Arc::new(SlotState {
                active: Mutex::new(0),
                max,
            }),
        }
    }

    /// Take a slot if one is free
    pub fn try_acquire(&self) -> Result<SlotPermit, TextureError> {
        let mut active = self.state.active.lock().unwrap_or_else(PoisonError::into_inner);
        if *active >= self.state.max {
            return Err(TextureError::CapacityDeferred);
        }
        *active += 1;

        Ok(SlotPermit {
            state: Arc::clone(&self.state),
        })
    }

    /// Downloads currently holding a slot
    pub fn active(&self) -> usize {
        *self.state.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn max(&self) -> usize {
        self.state.max
    }
}

/// One occupied download slot, freed on drop
#[derive(Debug)]
pub struct SlotPermit {
    state: Arc<SlotState>,
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        let mut active = self.state.active.lock().unwrap_or_else(PoisonError::into_inner);
        *active = active.saturating_sub(1);
    }
}

/// Outcome of one seeker, consumed on the render thread
pub(crate) struct SeekerReport {
    pub key: Arc<str>,
    pub seeker: SeekerId,
    pub outcome: Result<DecodedTexture, TextureError>,
}

/// Everything needed to start seekers
pub(crate) struct SeekerPool {
    slots: DownloadSlots,
    loader: Arc<dyn FetchDecoder>,
    reports: Sender<SeekerReport>,
    next_id: SeekerId,
}

impl SeekerPool {
    pub fn new(max_active: usize, loader: Arc<dyn FetchDecoder>) -> (Self, Receiver<SeekerReport>) {
        let (reports, receiver) = smol::channel::unbounded();
        let pool = Self {
            slots: DownloadSlots::new(max_active),
            loader,
            reports,
            next_id: 0,
        };
        (pool, receiver)
    }

    pub fn slots(&self) -> &DownloadSlots {
        &self.slots
    }

    /// Start a seeker for `key`, or fail with `CapacityDeferred` at the cap
    pub fn try_start(&mut self, key: &Arc<str>) -> Result<SeekerId, TextureError> {
        let permit = self.slots.try_acquire()?;

        self.next_id += 1;
        let id = self.next_id;
        let key = Arc::clone(key);
        let loader = Arc::clone(&self.loader);
        let reports = self.reports.clone();

        // The permit moves into the thread; if spawning fails the closure is
        // dropped here and the slot comes back immediately.
        thread::Builder::new()
            .name(format!("texture-seeker-{}", id))
            .spawn(move || run(id, key, loader, reports, permit))
            .map_err(TextureError::Spawn)?;

        Ok(id)
    }
}

fn run(
    id: SeekerId,
    key: Arc<str>,
    loader: Arc<dyn FetchDecoder>,
    reports: Sender<SeekerReport>,
    permit: SlotPermit,
) {
    tracing::info!("Seeker {} loading {}", id, key);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| loader.load(&key)))
        .unwrap_or_else(|_| Err(TextureError::Decode(format!("loader panicked on {}", key))));

    match &outcome {
        Ok(decoded) => tracing::info!("Seeker {} loaded {} ({} frames)", id, key, decoded.frame_count()),
        Err(e) => tracing::warn!("Seeker {} failed on {}: {}", id, key, e),
    }

    let report = SeekerReport {
        key,
        seeker: id,
        outcome,
    };
    if reports.send_blocking(report).is_err() {
        tracing::debug!("Seeker {} finished after its cache was dropped", id);
    }

    drop(permit);
}
