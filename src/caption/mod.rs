//! Caption stills: font resolution, measurement, greedy wrapping, and rasterization.

/// Preferred font resolution with built-in fallback.
pub mod font;
/// Text width measurement.
pub mod measure;
/// Caption layout and PNG rasterization.
pub mod render;
/// Greedy word wrap.
pub mod wrap;
