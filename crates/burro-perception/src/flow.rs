//! Optical-flow region tracking.
//!
//! [`RegionTracker`] turns a frame-to-frame correspondence between two
//! equal-shape feature lists (a fixed `width × height` grid) into a set of
//! spatially coherent motion regions, each reported as a bounding box.
//!
//! The per-frame pipeline:
//!
//! 1. displacement (and its magnitude) per tracked cell, keeping the frame
//!    maximum `max_delta`;
//! 2. cells below the motion threshold stay out of every region;
//! 3. each moving cell gets a coarse speed bucket,
//!    `floor(buckets · magnitude / max_delta)`;
//! 4. a single descending sweep grows regions by voting among each cell's
//!    precomputed 8-connected neighbors; a neighbor belongs to the same
//!    motion when its magnitude is close (squared difference under the
//!    coincidence threshold) or lands in the same bucket;
//! 5. a final pass accumulates each region's bounding box.
//!
//! The neighbor vote approximates connected-component labeling without a
//! union-find pass: one O(grid) sweep per frame, at the cost of occasionally
//! splitting one physical object across two region ids for a frame.
//!
//! # Example
//!
//! ```rust
//! use burro_perception::flow::{FlowConfig, RegionTracker, TrackerUpdate};
//! use burro_types::Vec2;
//!
//! let mut tracker = RegionTracker::new(FlowConfig {
//!     width: 2,
//!     height: 1,
//!     ..FlowConfig::default()
//! });
//!
//! let resting = vec![Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0)];
//! let shifted = vec![Vec2::new(3.0, 0.0), Vec2::new(13.0, 0.0)];
//!
//! assert_eq!(tracker.update(&resting), TrackerUpdate::Primed);
//! assert_eq!(tracker.update(&shifted), TrackerUpdate::Tracked { regions: 1 });
//! ```

use burro_types::Vec2;
use tracing::debug;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Grid shape and clustering thresholds for a [`RegionTracker`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowConfig {
    /// Grid width in cells.
    pub width: usize,
    /// Grid height in cells.
    pub height: usize,
    /// Displacement magnitude at which a feature counts as moving. Exactly
    /// at the threshold counts as moving.
    pub motion_threshold: f32,
    /// Upper bound on the squared magnitude difference for two neighbors to
    /// read as the same motion.
    pub coincidence_threshold: f32,
    /// Number of speed-histogram buckets.
    pub histogram_buckets: usize,
    /// Most regions a single frame may allocate.
    pub max_regions: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            width: 16,
            height: 16,
            motion_threshold: 1.0,
            coincidence_threshold: 2.0,
            histogram_buckets: 8,
            max_regions: 16,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Cells, rectangles, regions
// ────────────────────────────────────────────────────────────────────────────

/// 8-connected neighborhood, clipped at the grid boundary. The order is
/// load-bearing: the region vote scans matches in this order, which is what
/// makes its tie-break deterministic.
const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
];

/// One cell of the tracker arena.
#[derive(Debug, Clone)]
pub struct FeatureCell {
    /// Screen-space position from the most recent frame.
    pub position: Vec2,
    /// Displacement since the previous frame (previous − current).
    pub delta: Vec2,
    /// Cached magnitude of `delta`.
    pub delta_mag: f32,
    /// Region slot this cell was assigned this frame.
    pub region: Option<usize>,
    /// Speed-histogram bucket this frame.
    pub bucket: usize,
    neighbors: [usize; 8],
    neighbor_count: usize,
}

impl FeatureCell {
    fn unlinked() -> Self {
        Self {
            position: Vec2::zero(),
            delta: Vec2::zero(),
            delta_mag: 0.0,
            region: None,
            bucket: 0,
            neighbors: [0; 8],
            neighbor_count: 0,
        }
    }

    /// Flat-buffer indices of this cell's neighbors, in precompute order.
    pub fn neighbors(&self) -> &[usize] {
        &self.neighbors[..self.neighbor_count]
    }
}

/// Axis-aligned bounding box over feature positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    /// A degenerate box containing exactly `p`.
    pub fn point(p: Vec2) -> Self {
        Self { min: p, max: p }
    }

    /// Grow the box to include `p`.
    pub fn include(&mut self, p: Vec2) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    pub fn contains(&self, p: &Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }
}

/// A coherent motion region. Regions carry no identity across frames; the
/// slot index is the id and everything is recomputed each update.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Region {
    pub active: bool,
    /// Extent of the member cells' positions. The first member initializes
    /// the box; later members only grow it.
    pub bounds: Option<Rect>,
}

impl Region {
    fn reset(&mut self) {
        self.active = false;
        self.bounds = None;
    }

    fn include(&mut self, p: Vec2) {
        match &mut self.bounds {
            Some(rect) => rect.include(p),
            None => self.bounds = Some(Rect::point(p)),
        }
    }
}

/// Outcome of one [`RegionTracker::update`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerUpdate {
    /// First frame stored; no displacement exists yet.
    Primed,
    /// Frame processed, with the number of regions allocated.
    Tracked { regions: usize },
}

// ────────────────────────────────────────────────────────────────────────────
// Tracker
// ────────────────────────────────────────────────────────────────────────────

/// Grid-based motion clusterer. See the [module docs][self] for the
/// algorithm.
#[derive(Debug)]
pub struct RegionTracker {
    config: FlowConfig,
    cells: Vec<FeatureCell>,
    regions: Vec<Region>,
    region_count: usize,
    previous: Vec<Vec2>,
    primed: bool,
    max_delta: f32,
}

impl RegionTracker {
    /// Allocate the cell arena and precompute every cell's neighborhood.
    pub fn new(config: FlowConfig) -> Self {
        let mut cells = vec![FeatureCell::unlinked(); config.width * config.height];
        for y in 0..config.height {
            for x in 0..config.width {
                let idx = y * config.width + x;
                for (dx, dy) in NEIGHBOR_OFFSETS {
                    let nx = x as i32 + dx;
                    let ny = y as i32 + dy;
                    if nx < 0 || ny < 0 || nx >= config.width as i32 || ny >= config.height as i32
                    {
                        continue;
                    }
                    let cell = &mut cells[idx];
                    cell.neighbors[cell.neighbor_count] = ny as usize * config.width + nx as usize;
                    cell.neighbor_count += 1;
                }
            }
        }
        Self {
            config,
            cells,
            regions: vec![Region::default(); config.max_regions],
            region_count: 0,
            previous: Vec::new(),
            primed: false,
            max_delta: 0.0,
        }
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Grid capacity in cells.
    pub fn capacity(&self) -> usize {
        self.config.width * self.config.height
    }

    /// The cell at grid coordinates (`x`, `y`).
    pub fn cell(&self, x: usize, y: usize) -> &FeatureCell {
        &self.cells[y * self.config.width + x]
    }

    /// Regions allocated by the most recent update. Slot index == region id.
    pub fn regions(&self) -> &[Region] {
        &self.regions[..self.region_count]
    }

    /// Largest displacement magnitude seen in the most recent update.
    pub fn max_delta(&self) -> f32 {
        self.max_delta
    }

    /// Cluster one feature frame against the previous one.
    ///
    /// The very first call only stores the frame and reports
    /// [`TrackerUpdate::Primed`]. When a frame is shorter than the previous
    /// one, processing stops at the shorter length; the untracked tail of
    /// the grid reads as stationary for the frame.
    ///
    /// # Panics
    ///
    /// Panics when `features` exceeds the grid capacity. That is a caller
    /// contract breach, never silently truncated.
    pub fn update(&mut self, features: &[Vec2]) -> TrackerUpdate {
        assert!(
            features.len() <= self.capacity(),
            "feature list of {} exceeds grid capacity {}",
            features.len(),
            self.capacity()
        );

        if !self.primed {
            self.store_previous(features);
            self.primed = true;
            return TrackerUpdate::Primed;
        }

        // No assumption that new samples extend past what was tracked
        // before.
        let tracked = features.len().min(self.previous.len());

        self.max_delta = 0.0;
        for i in 0..tracked {
            let cell = &mut self.cells[i];
            cell.position = features[i];
            cell.delta = self.previous[i].sub(&features[i]);
            cell.delta_mag = cell.delta.magnitude();
            if cell.delta_mag > self.max_delta {
                self.max_delta = cell.delta_mag;
            }
        }
        for cell in self.cells.iter_mut().skip(tracked) {
            cell.delta = Vec2::zero();
            cell.delta_mag = 0.0;
        }

        // Clean slate: regions have no cross-frame identity.
        for region in &mut self.regions {
            region.reset();
        }
        self.region_count = 0;
        for cell in &mut self.cells {
            cell.region = None;
            cell.bucket = 0;
        }

        // Nothing moved at all; the bucket division below would divide by
        // zero and no cell can be at a positive threshold anyway.
        if self.max_delta <= 0.0 {
            self.store_previous(features);
            return TrackerUpdate::Tracked { regions: 0 };
        }

        let buckets = self.config.histogram_buckets as f32;
        for i in 0..tracked {
            let cell = &mut self.cells[i];
            cell.bucket = (buckets * cell.delta_mag / self.max_delta) as usize;
        }

        // Region growth. The fixed descending sweep plus the fixed neighbor
        // order is what makes the vote below deterministic.
        for y in (0..self.config.height).rev() {
            for x in (0..self.config.width).rev() {
                let idx = y * self.config.width + x;
                if self.cells[idx].region.is_some() {
                    continue;
                }
                if self.cells[idx].delta_mag < self.config.motion_threshold {
                    continue;
                }
                self.grow_from(idx);
            }
        }

        for idx in 0..self.cells.len() {
            let Some(id) = self.cells[idx].region else {
                continue;
            };
            let position = self.cells[idx].position;
            self.regions[id].include(position);
        }

        self.store_previous(features);
        debug!(
            regions = self.region_count,
            max_delta = self.max_delta,
            "flow frame clustered"
        );
        TrackerUpdate::Tracked {
            regions: self.region_count,
        }
    }

    /// Vote among `idx`'s matched neighbors and assign a region to the cell
    /// and all of its matches.
    fn grow_from(&mut self, idx: usize) {
        let cell_mag = self.cells[idx].delta_mag;
        let cell_bucket = self.cells[idx].bucket;
        let neighbor_count = self.cells[idx].neighbor_count;

        let mut matches = [0usize; 8];
        let mut match_count = 0;
        for n in 0..neighbor_count {
            let adj_idx = self.cells[idx].neighbors[n];
            let adj = &self.cells[adj_idx];
            // Stationary features never join a region, not even by vote.
            if adj.delta_mag < self.config.motion_threshold {
                continue;
            }
            let diff = adj.delta_mag - cell_mag;
            if diff * diff < self.config.coincidence_threshold || adj.bucket == cell_bucket {
                matches[match_count] = adj_idx;
                match_count += 1;
            }
        }
        // An isolated mover has nobody to form a region with.
        if match_count == 0 {
            return;
        }
        let matches = &matches[..match_count];

        let region = match self.most_common_region(matches) {
            Some(id) => id,
            None => {
                // All matches unassigned: seed a new region, unless the
                // frame's region budget is spent.
                if self.region_count >= self.config.max_regions {
                    return;
                }
                let id = self.region_count;
                self.region_count += 1;
                id
            }
        };

        self.cells[idx].region = Some(region);
        for &m in matches {
            self.cells[m].region = Some(region);
        }
        self.regions[region].active = true;
    }

    /// Most frequent already-assigned region id among `matches`. Ties go to
    /// whichever id reaches the top count first in scan order.
    fn most_common_region(&self, matches: &[usize]) -> Option<usize> {
        let mut best = None;
        let mut best_count = 0;
        for &candidate in matches {
            let Some(id) = self.cells[candidate].region else {
                continue;
            };
            let count = matches
                .iter()
                .filter(|&&m| self.cells[m].region == Some(id))
                .count();
            if count > best_count {
                best_count = count;
                best = Some(id);
            }
        }
        best
    }

    fn store_previous(&mut self, features: &[Vec2]) {
        self.previous.clear();
        self.previous.extend_from_slice(features);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn config(width: usize, height: usize) -> FlowConfig {
        FlowConfig {
            width,
            height,
            motion_threshold: 1.0,
            coincidence_threshold: 2.0,
            histogram_buckets: 8,
            max_regions: 16,
        }
    }

    /// Cell base positions for a `width × height` grid, `spacing` apart.
    fn grid_positions(width: usize, height: usize, spacing: f32) -> Vec<Vec2> {
        let mut positions = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                positions.push(Vec2::new(x as f32 * spacing, y as f32 * spacing));
            }
        }
        positions
    }

    /// Shift the listed cell indices of `base` by (`dx`, `dy`).
    fn shifted(base: &[Vec2], moved: &[usize], dx: f32, dy: f32) -> Vec<Vec2> {
        let mut frame = base.to_vec();
        for &i in moved {
            frame[i] = Vec2::new(base[i].x + dx, base[i].y + dy);
        }
        frame
    }

    // ── Construction ─────────────────────────────────────────────────────────

    #[test]
    fn neighbor_counts_follow_grid_position() {
        let tracker = RegionTracker::new(config(3, 3));
        assert_eq!(tracker.cell(0, 0).neighbors().len(), 3);
        assert_eq!(tracker.cell(1, 0).neighbors().len(), 5);
        assert_eq!(tracker.cell(1, 1).neighbors().len(), 8);
        assert_eq!(tracker.cell(2, 2).neighbors().len(), 3);
    }

    #[test]
    fn neighbor_order_is_the_documented_sweep() {
        let tracker = RegionTracker::new(config(3, 3));
        // NW, N, NE, E, SE, S, SW, W around the center cell.
        assert_eq!(tracker.cell(1, 1).neighbors(), &[0, 1, 2, 5, 8, 7, 6, 3]);
    }

    // ── First frame and degenerate frames ────────────────────────────────────

    #[test]
    fn first_update_is_primed_and_touches_no_regions() {
        let mut tracker = RegionTracker::new(config(3, 3));
        let frame = grid_positions(3, 3, 10.0);
        assert_eq!(tracker.update(&frame), TrackerUpdate::Primed);
        assert!(tracker.regions().is_empty());
        assert!(tracker.cell(1, 1).region.is_none());
    }

    #[test]
    fn stationary_frame_reports_zero_regions() {
        let mut tracker = RegionTracker::new(config(3, 3));
        let frame = grid_positions(3, 3, 10.0);
        tracker.update(&frame);
        // Identical frame: max_delta is zero, nothing to bucket or grow.
        assert_eq!(
            tracker.update(&frame),
            TrackerUpdate::Tracked { regions: 0 }
        );
        assert!(tracker.regions().is_empty());
        assert_eq!(tracker.max_delta(), 0.0);
    }

    #[test]
    #[should_panic(expected = "exceeds grid capacity")]
    fn oversized_frame_panics() {
        let mut tracker = RegionTracker::new(config(2, 2));
        let frame = grid_positions(5, 1, 10.0);
        tracker.update(&frame);
    }

    // ── End-to-end clustering ────────────────────────────────────────────────

    #[test]
    fn plus_shaped_cluster_forms_one_region() {
        let mut tracker = RegionTracker::new(config(3, 3));
        let base = grid_positions(3, 3, 10.0);
        // Center and its 4-neighbors move by magnitude 5; corners stay put.
        let plus = [1, 3, 4, 5, 7];
        let moved = shifted(&base, &plus, 0.0, -5.0);

        assert_eq!(tracker.update(&base), TrackerUpdate::Primed);
        assert_eq!(
            tracker.update(&moved),
            TrackerUpdate::Tracked { regions: 1 }
        );

        let region = tracker.regions()[0];
        assert!(region.active);
        let bounds = region.bounds.unwrap();
        assert_eq!(bounds.min, Vec2::new(0.0, -5.0));
        assert_eq!(bounds.max, Vec2::new(20.0, 15.0));

        for &i in &plus {
            assert_eq!(tracker.cell(i % 3, i / 3).region, Some(0));
        }
        for corner in [(0, 0), (2, 0), (0, 2), (2, 2)] {
            assert!(tracker.cell(corner.0, corner.1).region.is_none());
        }
    }

    #[test]
    fn region_assignment_is_deterministic() {
        let base = grid_positions(4, 4, 10.0);
        // Two clusters at different speeds plus a stray stationary field.
        let fast = [0, 1, 4, 5];
        let slow = [10, 11, 14, 15];
        let mut frame = base.clone();
        for &i in &fast {
            frame[i] = Vec2::new(base[i].x + 6.0, base[i].y);
        }
        for &i in &slow {
            frame[i] = Vec2::new(base[i].x, base[i].y + 2.0);
        }

        let run = || {
            let mut tracker = RegionTracker::new(config(4, 4));
            tracker.update(&base);
            tracker.update(&frame);
            let cells: Vec<Option<usize>> = (0..16usize)
                .map(|i| tracker.cell(i % 4, i / 4).region)
                .collect();
            (cells, tracker.regions().to_vec())
        };

        let (cells_a, regions_a) = run();
        let (cells_b, regions_b) = run();
        assert_eq!(cells_a, cells_b);
        assert_eq!(regions_a, regions_b);
        assert_eq!(regions_a.len(), 2);
    }

    #[test]
    fn threshold_boundary_exact_counts_as_moving() {
        let mut tracker = RegionTracker::new(FlowConfig {
            motion_threshold: 2.0,
            ..config(3, 1)
        });
        let base = grid_positions(3, 1, 10.0);
        let mut frame = base.clone();
        frame[0] = Vec2::new(base[0].x + 2.0, base[0].y); // exactly at threshold
        frame[1] = Vec2::new(base[1].x + 2.0, base[1].y);
        frame[2] = Vec2::new(base[2].x + 1.9, base[2].y); // just below

        tracker.update(&base);
        assert_eq!(
            tracker.update(&frame),
            TrackerUpdate::Tracked { regions: 1 }
        );
        assert_eq!(tracker.cell(0, 0).region, Some(0));
        assert_eq!(tracker.cell(1, 0).region, Some(0));
        assert!(tracker.cell(2, 0).region.is_none());
    }

    #[test]
    fn below_threshold_everywhere_grows_nothing() {
        let mut tracker = RegionTracker::new(FlowConfig {
            motion_threshold: 2.0,
            ..config(3, 1)
        });
        let base = grid_positions(3, 1, 10.0);
        let frame = shifted(&base, &[0, 1, 2], 1.9, 0.0);

        tracker.update(&base);
        assert_eq!(
            tracker.update(&frame),
            TrackerUpdate::Tracked { regions: 0 }
        );
    }

    #[test]
    fn shorter_frame_stops_early() {
        let mut tracker = RegionTracker::new(config(2, 2));
        let base = grid_positions(2, 2, 10.0);
        // Second frame only re-acquired the first two features, moving
        // together.
        let short = vec![
            Vec2::new(base[0].x + 5.0, base[0].y),
            Vec2::new(base[1].x + 5.0, base[1].y),
        ];

        tracker.update(&base);
        assert_eq!(
            tracker.update(&short),
            TrackerUpdate::Tracked { regions: 1 }
        );
        assert_eq!(tracker.cell(0, 0).region, Some(0));
        assert_eq!(tracker.cell(1, 0).region, Some(0));
        // The untracked tail reads as stationary and stays out.
        assert!(tracker.cell(0, 1).region.is_none());
        assert!(tracker.cell(1, 1).region.is_none());
    }

    #[test]
    fn region_budget_stops_new_seeds_only() {
        let mut tracker = RegionTracker::new(FlowConfig {
            max_regions: 1,
            ..config(5, 1)
        });
        let base = grid_positions(5, 1, 10.0);
        let mut frame = base.clone();
        for i in [0, 1] {
            frame[i] = Vec2::new(base[i].x + 5.0, base[i].y);
        }
        for i in [3, 4] {
            frame[i] = Vec2::new(base[i].x + 9.0, base[i].y);
        }

        tracker.update(&base);
        // The descending sweep seeds the right-hand pair first; the budget
        // is then spent and the left-hand pair stays unassigned.
        assert_eq!(
            tracker.update(&frame),
            TrackerUpdate::Tracked { regions: 1 }
        );
        assert_eq!(tracker.cell(4, 0).region, Some(0));
        assert_eq!(tracker.cell(3, 0).region, Some(0));
        assert!(tracker.cell(1, 0).region.is_none());
        assert!(tracker.cell(0, 0).region.is_none());
    }

    #[test]
    fn vote_tie_goes_to_first_neighbor_in_scan_order() {
        // Two regions grow before the corner cell (0, 0) is visited: one
        // seeded at (0, 2) claiming (0, 1), one seeded at (2, 0) claiming
        // (1, 0). The corner then matches exactly one cell of each; the
        // vote is 1–1 and the first match in neighbor order (E before S)
        // must win.
        let mut tracker = RegionTracker::new(FlowConfig {
            coincidence_threshold: 5.0,
            ..config(3, 3)
        });
        let base = grid_positions(3, 3, 10.0);
        let mut frame = base.clone();
        let idx = |x: usize, y: usize| y * 3 + x;
        for i in [idx(0, 2), idx(0, 1)] {
            frame[i] = Vec2::new(base[i].x, base[i].y + 9.0);
        }
        for i in [idx(2, 0), idx(1, 0)] {
            frame[i] = Vec2::new(base[i].x + 5.0, base[i].y);
        }
        frame[idx(0, 0)] = Vec2::new(base[0].x + 7.0, base[0].y);

        tracker.update(&base);
        assert_eq!(
            tracker.update(&frame),
            TrackerUpdate::Tracked { regions: 2 }
        );
        // Read ids at the seeds; the corner's own matches get pulled into
        // its winning region.
        let column_region = tracker.cell(0, 2).region.unwrap();
        let row_region = tracker.cell(2, 0).region.unwrap();
        assert_ne!(column_region, row_region);
        // East neighbor (1, 0) is scanned before south neighbor (0, 1).
        assert_eq!(tracker.cell(0, 0).region, Some(row_region));
        assert_eq!(tracker.cell(0, 1).region, Some(row_region));
    }

    // ── Rect ─────────────────────────────────────────────────────────────────

    #[test]
    fn rect_grows_to_include_points() {
        let mut rect = Rect::point(Vec2::new(2.0, 3.0));
        assert_eq!(rect.width(), 0.0);
        rect.include(Vec2::new(-1.0, 5.0));
        rect.include(Vec2::new(4.0, 3.0));
        assert_eq!(rect.min, Vec2::new(-1.0, 3.0));
        assert_eq!(rect.max, Vec2::new(4.0, 5.0));
        assert!(rect.contains(&Vec2::new(0.0, 4.0)));
        assert!(!rect.contains(&Vec2::new(0.0, 5.5)));
        assert_eq!(rect.width(), 5.0);
        assert_eq!(rect.height(), 2.0);
    }
}
