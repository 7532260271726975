//! Frame timeline
//!
//! Maps a playback time in milliseconds to the frame shown at that time.

/// Cumulative start times of every frame plus the total length.
///
/// Frame `i` becomes current at `starts[i]` and stays until frame `i + 1`
/// starts. `starts[0]` is always 0. A still image has one frame and a
/// duration of 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    starts: Vec<u64>,
    duration: u64,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::still()
    }
}

impl Timeline {
    /// Timeline of a single still frame
    pub fn still() -> Self {
        Self {
            starts: vec![0],
            duration: 0,
        }
    }

    /// Build from per-frame display delays (ms)
    pub fn from_delays<I>(delays: I) -> Self
    where
        I: IntoIterator<Item = u64>,
    {
        let mut starts = Vec::new();
        let mut time = 0u64;
        for delay in delays {
            starts.push(time);
            time = time.saturating_add(delay);
        }

        if starts.len() <= 1 {
            return Self::still();
        }

        Self {
            starts,
            duration: time,
        }
    }

    /// Index of the frame visible at `time`.
    ///
    /// Scans forward from frame 1 and stops at the first frame that has not
    /// started yet; times past the end hold the last frame.
    pub fn frame_at(&self, time: u64) -> usize {
        let mut selected = 0;
        for (index, &start) in self.starts.iter().enumerate().skip(1) {
            if start > time {
                break;
            }
            selected = index;
        }
        selected
    }

    /// Fold `time` into one loop of the animation. Still images are untouched.
    pub fn wrap(&self, time: u64) -> u64 {
        if self.duration > 0 {
            time % self.duration
        } else {
            time
        }
    }

    pub fn starts(&self) -> &[u64] {
        &self.starts
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }
}
