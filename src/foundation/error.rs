/// Crate-wide result alias.
pub type ReelResult<T> = Result<T, ReelError>;

/// Errors produced by the script-to-video pipeline.
///
/// Per-segment failures (`Synthesis`, `Render`) are absorbed by the pipeline and recorded as
/// skipped segments. `EmptyPipeline`, `Assembly`, and `Cancelled` terminate the current request.
#[derive(thiserror::Error, Debug)]
pub enum ReelError {
    /// Invalid configuration or input value.
    #[error("validation error: {0}")]
    Validation(String),

    /// The speech engine failed for one segment.
    #[error("synthesis failure: {0}")]
    Synthesis(String),

    /// Caption rasterization or image IO failed for one segment.
    #[error("render failure: {0}")]
    Render(String),

    /// No usable segment unit was left to assemble.
    #[error("nothing to render: {0}")]
    EmptyPipeline(String),

    /// Concatenation or encoding of the final video failed.
    #[error("assembly failure: {0}")]
    Assembly(String),

    /// The request was cancelled between segments.
    #[error("cancelled")]
    Cancelled,

    /// Any other error, usually IO with attached context.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReelError {
    /// Build a [`ReelError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`ReelError::Synthesis`].
    pub fn synthesis(msg: impl Into<String>) -> Self {
        Self::Synthesis(msg.into())
    }

    /// Build a [`ReelError::Render`].
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`ReelError::EmptyPipeline`].
    pub fn empty_pipeline(msg: impl Into<String>) -> Self {
        Self::EmptyPipeline(msg.into())
    }

    /// Build a [`ReelError::Assembly`].
    pub fn assembly(msg: impl Into<String>) -> Self {
        Self::Assembly(msg.into())
    }

    /// Return `true` for errors that only affect a single segment.
    pub fn is_segment_local(&self) -> bool {
        matches!(
            self,
            Self::Synthesis(_) | Self::Render(_) | Self::Validation(_) | Self::Other(_)
        )
    }
}
