//! Synthetic grids with predictable, verifiable values.
//!
//! All grids are row-major, row 0 at the top.

/// Grid where each cell holds `row * 1000 + col`.
///
/// ```
/// use test_utils::create_index_grid;
///
/// let grid = create_index_grid(5, 10);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[1], 1.0);     // row 0, col 1
/// assert_eq!(grid[10], 1000.0); // row 1, col 0
/// ```
pub fn create_index_grid(rows: usize, cols: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            data.push((row * 1000 + col) as f32);
        }
    }
    data
}

/// Grid with the same value everywhere.
pub fn create_constant_grid(rows: usize, cols: usize, value: f32) -> Vec<f32> {
    vec![value; rows * cols]
}

/// Temperature-like values in degrees C, warming from the north-west
/// corner (-20) towards the south-east corner (+20).
pub fn create_temperature_grid(rows: usize, cols: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            let x_factor = col as f32 / cols.max(1) as f32;
            let y_factor = row as f32 / rows.max(1) as f32;
            data.push(-20.0 + x_factor * 20.0 + y_factor * 20.0);
        }
    }
    data
}

/// Wind speed in m/s: calm in the centre, up to 50 at the corners.
pub fn create_wind_speed_grid(rows: usize, cols: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(rows * cols);
    let center_x = cols as f32 / 2.0;
    let center_y = rows as f32 / 2.0;
    let max_dist = (center_x * center_x + center_y * center_y).sqrt().max(f32::EPSILON);

    for row in 0..rows {
        for col in 0..cols {
            let dx = col as f32 - center_x;
            let dy = row as f32 - center_y;
            data.push((dx * dx + dy * dy).sqrt() / max_dist * 50.0);
        }
    }
    data
}

/// Wind direction in degrees true, turning with the column: 0 on the west
/// edge, approaching 360 on the east edge.
pub fn create_wind_direction_grid(rows: usize, cols: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(rows * cols);
    for _row in 0..rows {
        for col in 0..cols {
            data.push(col as f32 / cols.max(1) as f32 * 360.0);
        }
    }
    data
}

/// Overwrite the given `(row, col)` cells with `value`.
///
/// # Panics
/// If a cell lies outside the grid.
pub fn set_cells(data: &mut [f32], cols: usize, cells: &[(usize, usize)], value: f32) {
    for &(row, col) in cells {
        data[row * cols + col] = value;
    }
}

/// Value of `(row, col)` in a row-major grid.
pub fn grid_value(data: &[f32], cols: usize, row: usize, col: usize) -> Option<f32> {
    if col >= cols {
        return None;
    }
    data.get(row * cols + col).copied()
}
