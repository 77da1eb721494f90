//! Shared test utilities for the raster-drill workspace.
//!
//! - Grid data generators with predictable values
//! - [`RasterFixture`]: variable rasters for a model run on disk, plus the
//!   matching in-memory index
//! - Approximate-equality assertion macros
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::*;
pub use generators::*;

/// Assert two numbers differ by at most `epsilon`.
///
/// ```
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if !(diff <= epsilon) {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Assert an `Option<f64>` holds a value within `epsilon` of `expected`.
#[macro_export]
macro_rules! assert_some_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        match $left {
            Some(value) => $crate::assert_approx_eq!(value, $right, $epsilon),
            None => panic!("assertion failed: expected Some(≈{:?}), got None", $right),
        }
    }};
}
