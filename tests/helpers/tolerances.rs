//! Tolerance constants for audio comparisons.

/// Single precision round trip through the float path.
pub const FLOAT_EPSILON: f64 = 1e-6;

/// Double precision gain multiply.
pub const DOUBLE_EPSILON: f64 = 1e-12;
