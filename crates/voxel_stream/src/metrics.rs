//! Engine-agnostic statistics for a streaming voxel world.
//!
//! Feature-gated and runtime-toggled: without the `metrics` feature every
//! `record_*` call is a no-op.
//!
//! # Usage
//!
//! ```ignore
//! use voxel_stream::metrics::{WorldMetrics, COLLECT_METRICS};
//!
//! // Compile with --features metrics
//! COLLECT_METRICS.store(false, Ordering::Relaxed);
//!
//! metrics.record_tick_timing(elapsed_us);
//! metrics.update_from_regions(world.octree().resident().map(|r| r.as_ref()));
//! ```

use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
#[cfg(feature = "metrics")]
use std::sync::atomic::Ordering;

use crate::region::Region;

/// Runtime toggle for metrics collection.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

/// Levels tracked per LOD; coarser levels are folded into the last slot.
pub const METRIC_LODS: usize = 16;

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

/// The last `capacity` timings in microseconds, with a running sum.
#[derive(Debug, Clone)]
pub struct TimingWindow {
    samples: VecDeque<u64>,
    capacity: usize,
    total: u64,
}

impl TimingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            total: 0,
        }
    }

    /// Record one sample; the oldest falls out once the window is full.
    pub fn push(&mut self, micros: u64) {
        if self.capacity == 0 {
            return;
        }
        if self.samples.len() == self.capacity {
            if let Some(evicted) = self.samples.pop_front() {
                self.total -= evicted;
            }
        }
        self.samples.push_back(micros);
        self.total += micros;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.total = 0;
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Mean of the window, 0 when empty.
    pub fn average(&self) -> f64 {
        match self.samples.len() {
            0 => 0.0,
            n => self.total as f64 / n as f64,
        }
    }

    /// Slowest sample still in the window.
    pub fn peak(&self) -> Option<u64> {
        self.samples.iter().copied().max()
    }
}

impl Default for TimingWindow {
    fn default() -> Self {
        // two seconds of ticks at 60 Hz
        Self::new(120)
    }
}

/// Rolling timings plus a snapshot of the resident set.
#[derive(Debug, Clone)]
pub struct WorldMetrics {
    // Resident distribution, rebuilt every tick
    pub regions_per_lod: [u32; METRIC_LODS],
    pub vertices_per_lod: [u64; METRIC_LODS],
    pub indices_per_lod: [u64; METRIC_LODS],

    // Timing, microseconds
    pub tick_timings: TimingWindow,
    pub volume_timings: TimingWindow,
    pub mesh_timings: TimingWindow,
    pub last_tick_us: u64,

    /// Meshes handed to the render boundary this session.
    pub total_uploads: u64,
}

impl Default for WorldMetrics {
    fn default() -> Self {
        Self {
            regions_per_lod: [0; METRIC_LODS],
            vertices_per_lod: [0; METRIC_LODS],
            indices_per_lod: [0; METRIC_LODS],
            tick_timings: TimingWindow::default(),
            volume_timings: TimingWindow::default(),
            mesh_timings: TimingWindow::default(),
            last_tick_us: 0,
            total_uploads: 0,
        }
    }
}

impl WorldMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset everything except the cumulative upload count.
    pub fn reset(&mut self) {
        self.regions_per_lod.fill(0);
        self.vertices_per_lod.fill(0);
        self.indices_per_lod.fill(0);
        self.tick_timings.clear();
        self.volume_timings.clear();
        self.mesh_timings.clear();
        self.last_tick_us = 0;
    }

    pub fn record_tick_timing(&mut self, timing_us: u64) {
        if is_enabled() {
            self.tick_timings.push(timing_us);
            self.last_tick_us = timing_us;
        }
    }

    pub fn record_volume_timing(&mut self, timing_us: u64) {
        if is_enabled() {
            self.volume_timings.push(timing_us);
        }
    }

    pub fn record_mesh_timing(&mut self, timing_us: u64) {
        if is_enabled() {
            self.mesh_timings.push(timing_us);
        }
    }

    pub fn record_upload(&mut self) {
        if is_enabled() {
            self.total_uploads += 1;
        }
    }

    /// Rebuild the per-LOD distribution from the resident set.
    pub fn update_from_regions<'a>(&mut self, regions: impl Iterator<Item = &'a Region>) {
        if !is_enabled() {
            return;
        }
        self.regions_per_lod.fill(0);
        self.vertices_per_lod.fill(0);
        self.indices_per_lod.fill(0);

        for region in regions {
            let lod = (region.lod() as usize).min(METRIC_LODS - 1);
            self.regions_per_lod[lod] += 1;
            if region.is_renderable() {
                let mesh = region.mesh();
                self.vertices_per_lod[lod] += mesh.vertices.len() as u64;
                self.indices_per_lod[lod] += mesh.indices.len() as u64;
            }
        }
    }

    pub fn total_regions(&self) -> u32 {
        self.regions_per_lod.iter().sum()
    }

    pub fn total_vertices(&self) -> u64 {
        self.vertices_per_lod.iter().sum()
    }

    pub fn total_indices(&self) -> u64 {
        self.indices_per_lod.iter().sum()
    }

    pub fn avg_tick_timing_us(&self) -> f64 {
        self.tick_timings.average()
    }

    pub fn avg_volume_timing_us(&self) -> f64 {
        self.volume_timings.average()
    }

    pub fn avg_mesh_timing_us(&self) -> f64 {
        self.mesh_timings.average()
    }
}
