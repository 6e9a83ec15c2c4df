//! Encoding sinks.
//!
//! Sinks consume assembled frames in timeline order together with the concatenated narration.

/// `ffmpeg`-based MP4 sink.
pub mod ffmpeg;
/// Frame sink trait and the in-memory sink.
pub mod sink;
