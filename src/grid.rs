//! Uniform bucket grid for neighbourhood queries
//!
//! Points are bucketed into square cells in a compressed layout (one offset
//! table plus one flat index list). Inside a cell indices keep ascending
//! order, and cells are visited row by row, so every query enumerates its
//! candidates in a deterministic order.

const MIN_CELLS: usize = 64;
const CELLS_PER_POINT: usize = 4;

#[derive(Debug, Clone)]
pub struct UniformGrid {
    origin_x: f64,
    origin_y: f64,
    cell_size: f64,
    cols: usize,
    rows: usize,
    starts: Vec<usize>,
    entries: Vec<usize>,
}

impl UniformGrid {
    /// Bucket `points` into cells of roughly `cell_size`.
    ///
    /// Points with non-finite coordinates are left out. The cell size grows
    /// when the extent would need more than a few cells per point.
    pub fn build(points: &[(f64, f64)], cell_size: f64) -> Self {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for &(x, y) in points {
            if x.is_finite() && y.is_finite() {
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }
        if !min_x.is_finite() {
            return Self::empty();
        }

        let mut cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        let span_x = max_x - min_x;
        let span_y = max_y - min_y;
        let max_cells = (points.len() * CELLS_PER_POINT).max(MIN_CELLS) as f64;
        let needed = (span_x / cell_size + 1.0) * (span_y / cell_size + 1.0);
        if needed > max_cells {
            cell_size *= (needed / max_cells).sqrt();
        }
        let cols = (span_x / cell_size).floor() as usize + 1;
        let rows = (span_y / cell_size).floor() as usize + 1;

        let mut grid = Self {
            origin_x: min_x,
            origin_y: min_y,
            cell_size,
            cols,
            rows,
            starts: vec![0; cols * rows + 1],
            entries: Vec::new(),
        };

        let cells: Vec<Option<usize>> = points
            .iter()
            .map(|&(x, y)| (x.is_finite() && y.is_finite()).then(|| grid.cell_index(x, y)))
            .collect();
        for cell in cells.iter().flatten() {
            grid.starts[cell + 1] += 1;
        }
        for i in 1..grid.starts.len() {
            grid.starts[i] += grid.starts[i - 1];
        }
        let mut cursor = grid.starts.clone();
        grid.entries = vec![0; grid.starts[cols * rows]];
        for (index, cell) in cells.into_iter().enumerate() {
            if let Some(cell) = cell {
                grid.entries[cursor[cell]] = index;
                cursor[cell] += 1;
            }
        }
        grid
    }

    fn empty() -> Self {
        Self {
            origin_x: 0.0,
            origin_y: 0.0,
            cell_size: 1.0,
            cols: 0,
            rows: 0,
            starts: vec![0],
            entries: Vec::new(),
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Number of indexed points
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn cell_index(&self, x: f64, y: f64) -> usize {
        let col = (((x - self.origin_x) / self.cell_size).floor() as usize).min(self.cols - 1);
        let row = (((y - self.origin_y) / self.cell_size).floor() as usize).min(self.rows - 1);
        row * self.cols + col
    }

    /// Inclusive cell span covering `[lo, hi]` along one axis
    fn span(&self, lo: f64, hi: f64, origin: f64, count: usize) -> Option<(usize, usize)> {
        let first = ((lo - origin) / self.cell_size).floor();
        let last = ((hi - origin) / self.cell_size).floor();
        if !(first.is_finite() && last.is_finite()) || last < 0.0 || first >= count as f64 {
            return None;
        }
        let first = first.max(0.0) as usize;
        let last = (last as usize).min(count - 1);
        Some((first, last))
    }

    /// Visit every point whose cell intersects the square of half-side
    /// `reach` around `(x, y)`. Callers filter by exact distance.
    pub fn for_each_candidate(&self, x: f64, y: f64, reach: f64, mut visit: impl FnMut(usize)) {
        if self.entries.is_empty() {
            return;
        }
        let Some((col_lo, col_hi)) = self.span(x - reach, x + reach, self.origin_x, self.cols)
        else {
            return;
        };
        let Some((row_lo, row_hi)) = self.span(y - reach, y + reach, self.origin_y, self.rows)
        else {
            return;
        };
        for row in row_lo..=row_hi {
            for col in col_lo..=col_hi {
                let cell = row * self.cols + col;
                for &index in &self.entries[self.starts[cell]..self.starts[cell + 1]] {
                    visit(index);
                }
            }
        }
    }
}
