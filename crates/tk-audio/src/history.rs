use std::collections::VecDeque;

/// Upper bound on the frequency resolution of the combined view.
pub const MAX_COMBINED_BINS: usize = 256;

/// Rolling history of frequency frames, kept for the spectrogram only.
///
/// Never read by the detector.
///
/// # Example
/// ```
/// use tk_audio::history::FrequencyHistory;
///
/// let mut history = FrequencyHistory::new(15);
/// history.push(&[10u8; 1024]);
/// let grid = history.combined(1024);
/// assert_eq!(grid.len(), 256 * 15);
/// assert_eq!(grid[256 * 14], 10);
/// assert_eq!(grid[0], 0);
/// ```
pub struct FrequencyHistory {
    frames: VecDeque<Vec<u8>>,
    depth: usize,
}

impl FrequencyHistory {
    /// Create an empty history holding at most `depth` frames.
    #[must_use]
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            frames: VecDeque::with_capacity(depth),
            depth,
        }
    }

    /// Store a copy of `frame`, evicting the oldest one when full.
    pub fn push(&mut self, frame: &[u8]) {
        let mut slot = if self.frames.len() >= self.depth {
            self.frames.pop_front().unwrap_or_default()
        } else {
            Vec::with_capacity(frame.len())
        };
        slot.clear();
        slot.extend_from_slice(frame);
        self.frames.push_back(slot);
    }

    /// Number of stored frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// `true` if no frame has been stored yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Configured depth (time steps of the combined view).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Drop all stored frames.
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Combined time × frequency grid, row-major.
    ///
    /// `depth` rows of `min(256, bin_count)` values; the newest frame is the
    /// last row and rows without history are zero. Each value averages a group
    /// of `ceil(bin_count / bins)` adjacent source bins. With no history at all
    /// the result is `bin_count` zeros.
    #[must_use]
    pub fn combined(&self, bin_count: usize) -> Vec<u8> {
        if self.frames.is_empty() {
            return vec![0; bin_count];
        }

        let bins = MAX_COMBINED_BINS.min(bin_count);
        let mut grid = vec![0u8; bins * self.depth];
        if bins == 0 {
            return grid;
        }

        let missing = self.depth - self.frames.len();
        for (offset, frame) in self.frames.iter().enumerate() {
            let row = &mut grid[(missing + offset) * bins..(missing + offset + 1) * bins];
            let step = frame.len().div_ceil(bins).max(1);
            for (f, cell) in row.iter_mut().enumerate() {
                let start = (f * step).min(frame.len());
                let end = (start + step).min(frame.len());
                let group = &frame[start..end];
                if !group.is_empty() {
                    let sum: u32 = group.iter().map(|&v| u32::from(v)).sum();
                    *cell = (sum / group.len() as u32) as u8;
                }
            }
        }
        grid
    }
}
