//! Script text: splitting into segments and producing scripts from topics.

/// Segmenter.
pub mod segment;
/// Script sources and the placeholder fallback.
pub mod source;
