//! Test data generators for synthetic grids.
//!
//! Grids are row-major with row 0 at the south edge and column 0 at the
//! west edge, the orientation assembled datasets use.

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// This makes it easy to verify that data is being read/written correctly
/// by checking that grid[row][col] == col * 1000 + row.
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50); // 10 * 5
/// assert_eq!(grid[0], 0.0);   // col=0, row=0 -> 0*1000 + 0
/// assert_eq!(grid[1], 1000.0); // col=1, row=0 -> 1*1000 + 0
/// assert_eq!(grid[10], 1.0);  // col=0, row=1 -> 0*1000 + 1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Lay out a canonical grid in the order a GRIB2 scanning mode stores it.
///
/// Inverse of the reorientation the dataset assembler applies, so tests can
/// write a field in any scanning order and expect the canonical grid back.
/// Honours flags 0x80 (i decreasing), 0x40 (j increasing), 0x20 (j
/// consecutive) and 0x10 (alternate rows reversed).
pub fn to_storage_order(grid: &[f32], width: usize, height: usize, scanning_mode: u8) -> Vec<f32> {
    let j_consecutive = scanning_mode & 0x20 != 0;
    let (rows, row_len) = if j_consecutive {
        (width, height)
    } else {
        (height, width)
    };

    let mut stored = Vec::with_capacity(grid.len());
    for outer in 0..rows {
        for inner in 0..row_len {
            let inner = if scanning_mode & 0x10 != 0 && outer % 2 == 1 {
                row_len - 1 - inner
            } else {
                inner
            };
            let (i, j) = if j_consecutive {
                (outer, inner)
            } else {
                (inner, outer)
            };
            let col = if scanning_mode & 0x80 != 0 { width - 1 - i } else { i };
            let row = if scanning_mode & 0x40 != 0 { j } else { height - 1 - j };
            stored.push(grid[row * width + col]);
        }
    }
    stored
}
