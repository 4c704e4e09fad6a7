//! Engine-agnostic metrics collection for grid rebuild statistics.
//!
//! Feature-gated and runtime-toggled to ensure zero overhead when disabled.
//!
//! # Usage
//!
//! ```ignore
//! use adaptive_grid::metrics::{FrameMetrics, COLLECT_METRICS};
//!
//! // Compile with --features metrics
//! // Runtime toggle:
//! COLLECT_METRICS.store(false, Ordering::Relaxed);
//!
//! // After each frame:
//! metrics.record_frame(grid.stats());
//! ```

use std::collections::VecDeque;
#[cfg(feature = "metrics")]
use std::sync::atomic::Ordering;
use std::sync::atomic::AtomicBool;

use crate::adaptive_grid::FrameStats;

/// Runtime toggle for metrics collection.
/// Set to false to disable metrics gathering at runtime.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

/// Check if metrics collection is enabled (both compile-time and runtime).
#[inline]
pub fn is_enabled() -> bool {
    #[cfg(feature = "metrics")]
    {
        COLLECT_METRICS.load(Ordering::Relaxed)
    }
    #[cfg(not(feature = "metrics"))]
    {
        false
    }
}

/// Rolling window for storing recent values (e.g., timing history).
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    buffer: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingWindow<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a new value, evicting the oldest if at capacity.
    pub fn push(&mut self, value: T) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Iterate over values (oldest to newest).
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buffer.iter()
    }

    pub fn last(&self) -> Option<&T> {
        self.buffer.back()
    }
}

impl<T: Copy + Default + std::ops::Add<Output = T>> RollingWindow<T> {
    pub fn sum(&self) -> T {
        self.buffer.iter().copied().fold(T::default(), |acc, x| acc + x)
    }
}

impl RollingWindow<u64> {
    pub fn average(&self) -> f64 {
        if self.buffer.is_empty() {
            0.0
        } else {
            self.sum() as f64 / self.buffer.len() as f64
        }
    }

    pub fn min_max(&self) -> Option<(u64, u64)> {
        let min = *self.buffer.iter().min()?;
        let max = *self.buffer.iter().max()?;
        Some((min, max))
    }
}

impl Default for RollingWindow<u64> {
    fn default() -> Self {
        Self::new(128) // ~2 seconds at 60fps
    }
}

/// Grid statistics accumulated across frames.
#[derive(Debug, Clone, Default)]
pub struct FrameMetrics {
    /// Rolling window of CPU rebuild times (reset through derive) in microseconds.
    pub rebuild_timings: RollingWindow<u64>,
    /// Rolling window of resize + upload + dispatch times in microseconds.
    pub submit_timings: RollingWindow<u64>,

    // Last frame snapshot (for UI)
    pub nodes_per_level: Vec<usize>,
    pub atlas_side_length: u32,
    pub mip_count: usize,
    pub neighbor_pairs: usize,

    /// Frames that recreated at least one GPU resource.
    pub resize_events: u64,
    pub frames_recorded: u64,
}

impl FrameMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.rebuild_timings.clear();
        self.submit_timings.clear();
        self.nodes_per_level.clear();
        self.atlas_side_length = 0;
        self.mip_count = 0;
        self.neighbor_pairs = 0;
        // resize_events and frames_recorded are cumulative
    }

    /// Record the statistics of one finished frame.
    pub fn record_frame(&mut self, stats: &FrameStats) {
        if !is_enabled() {
            return;
        }
        self.rebuild_timings.push(stats.rebuild_us);
        self.submit_timings.push(stats.submit_us);
        self.nodes_per_level.clone_from(&stats.nodes_per_level);
        self.atlas_side_length = stats.atlas_side_length;
        self.mip_count = stats.mip_count;
        self.neighbor_pairs = stats.neighbor_pairs + stats.mip_neighbor_pairs;
        if stats.resized_buffers > 0 || stats.atlas_resized {
            self.resize_events += 1;
        }
        self.frames_recorded += 1;
    }

    pub fn total_nodes(&self) -> usize {
        self.nodes_per_level.iter().sum()
    }

    pub fn avg_rebuild_us(&self) -> f64 {
        self.rebuild_timings.average()
    }

    pub fn avg_submit_us(&self) -> f64 {
        self.submit_timings.average()
    }
}
