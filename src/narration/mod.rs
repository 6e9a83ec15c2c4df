//! Narration: speech engines and the per-segment synthesizer.

/// Speech engine boundary and the external-program engine.
pub mod engine;
/// Segment text to temporary audio assets.
pub mod synth;
