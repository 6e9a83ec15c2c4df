//! Narration audio: WAV decoding, resampling, and track concatenation.

/// PCM buffers and helpers.
pub mod pcm;
