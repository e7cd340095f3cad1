//! Uniform-grid spatial hash over the field rectangle.
//!
//! The grid keeps no memory between queries: callers rebuild it from the
//! current entity set right before asking what is near a point. A query only
//! looks at the single bucket containing the point, so an entity just across a
//! cell boundary is not returned even when it is within range.

use crate::domain::entities::Point;

/// Entry in the spatial index: entity id + the position it was bucketed at.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialEntry<K> {
    pub id: K,
    pub position: Point,
}

pub struct SpatialGrid<K> {
    width: f64,
    height: f64,
    cell_size: f64,
    /// Number of cells in X direction.
    columns: usize,
    /// Number of cells in Y direction.
    rows: usize,
    /// Flat array of buckets, indexed by row * columns + col.
    buckets: Vec<Vec<SpatialEntry<K>>>,
}

impl<K: Clone> SpatialGrid<K> {
    /// Create a grid covering `width` x `height` with square cells of `cell_size`.
    pub fn new(width: f64, height: f64, cell_size: f64) -> Self {
        let columns = (width / cell_size).ceil().max(1.0) as usize;
        let rows = (height / cell_size).ceil().max(1.0) as usize;
        Self {
            width,
            height,
            cell_size,
            columns,
            rows,
            buckets: vec![Vec::new(); columns * rows],
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// `floor(x / cell) + floor(y / cell) * columns`, with the point clamped into
    /// `[0, width) x [0, height)` first so edge points stay in range.
    pub fn bucket_id(&self, p: Point) -> usize {
        let col = Self::axis_cell(p.x, self.width, self.cell_size, self.columns);
        let row = Self::axis_cell(p.y, self.height, self.cell_size, self.rows);
        col + row * self.columns
    }

    fn axis_cell(value: f64, extent: f64, cell_size: f64, cells: usize) -> usize {
        if !value.is_finite() {
            return 0;
        }
        let clamped = value.clamp(0.0, extent);
        ((clamped / cell_size).floor() as usize).min(cells - 1)
    }

    /// Clear all buckets and reinsert every entry at its current position.
    pub fn rebuild<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, Point)>,
    {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        for (id, position) in entries {
            let idx = self.bucket_id(position);
            self.buckets[idx].push(SpatialEntry { id, position });
        }
    }

    /// Entries sharing the bucket of `p`, in insertion order.
    pub fn query(&self, p: Point) -> &[SpatialEntry<K>] {
        &self.buckets[self.bucket_id(p)]
    }
}
