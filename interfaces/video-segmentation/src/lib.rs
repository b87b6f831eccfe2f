//! # Video Segmentation
//!
//! A model-agnostic interface for point prompted video object segmentation, and a small harness
//! for checking a model's output with [`mask_metrics`].
//!
//! ## Usage
//!
//! ```rust, no_run
//! use video_segmentation::*;
//!
//! fn run<M: VideoSegmentationModel>(model: &M) -> anyhow::Result<()> {
//!     let dir = std::path::Path::new("test_frames");
//!     let synthesis = FrameSynthesis::new();
//!     synthesis.write(dir)?;
//!
//!     let (x, y) = synthesis.object_center();
//!     let mut state = model.init_state(dir)?;
//!     model.add_new_points(&mut state, PointPrompt::foreground_point(0, 1, x, y))?;
//!     let segments = VideoSegments::collect(model, &mut state)?;
//!
//!     for (frame, mask) in segments.track(1) {
//!         println!("frame {frame}: iou {}", mask.iou(&synthesis.ground_truth())?);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

mod frames;
pub mod harness;
mod model;
mod prompt;
mod segments;

pub use frames::*;
pub use harness::{HarnessConfig, Outcome};
pub use model::*;
pub use prompt::*;
pub use segments::*;
