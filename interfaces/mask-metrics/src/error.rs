/// An error that can occur while reading masks or computing mask metrics.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The mask does not have exactly two non-singleton axes.
    #[error("Mask must be 2D after squeezing singleton axes, got shape {0:?}")]
    InvalidMaskRank(Vec<usize>),
    /// The number of cells does not match the requested dimensions.
    #[error("Expected {expected} mask cells for a {height}x{width} mask, got {actual}")]
    InvalidMaskLength {
        /// The requested height.
        height: usize,
        /// The requested width.
        width: usize,
        /// `height * width`
        expected: usize,
        /// The number of cells supplied.
        actual: usize,
    },
    /// Two arrays that must have the same shape do not.
    #[error("Shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch {
        /// The shape of the first array.
        left: Vec<usize>,
        /// The shape of the second array.
        right: Vec<usize>,
    },
    /// The mask cannot be represented as an image.
    #[error("A {height}x{width} mask does not fit in an image")]
    ImageTooLarge {
        /// The mask height.
        height: usize,
        /// The mask width.
        width: usize,
    },
    /// A tensor operation failed.
    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
}
