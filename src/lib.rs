//! # SAM Harness
//!
//! Checks a prompted video segmentation model against mask quality metrics.
//!
//! - [`metrics`] computes shape and color descriptors of masks and compares masks with IoU.
//! - [`video`] defines the model interface, collects propagated masks and skips scenarios when no
//!   model is available.
//! - [`sam`] runs Segment Anything frame by frame behind that interface.

#![warn(missing_docs)]

pub use mask_metrics as metrics;
pub use segment_anything_video as sam;
pub use video_segmentation as video;

/// Everything needed to write a harness scenario.
pub mod prelude {
    pub use mask_metrics::*;
    pub use segment_anything_video::*;
    pub use video_segmentation::harness::*;
    pub use video_segmentation::*;
}
