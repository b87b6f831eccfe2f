use std::path::Path;

use candle_core::Tensor;
use mask_metrics::{Mask, MetricsError};

use crate::{ObjectId, PointPrompt};

/// The masks a model produced for one frame.
#[derive(Debug, Clone)]
pub struct FrameOutput {
    /// The index of the frame in the video.
    pub frame_idx: usize,
    /// The objects segmented on this frame.
    pub object_ids: Vec<ObjectId>,
    /// The mask logits of each object. The first axis is indexed like `object_ids`, the last two
    /// axes are `height x width`.
    pub mask_logits: Tensor,
}

impl FrameOutput {
    /// Create a new frame output.
    pub fn new(frame_idx: usize, object_ids: Vec<ObjectId>, mask_logits: Tensor) -> Self {
        Self {
            frame_idx,
            object_ids,
            mask_logits,
        }
    }

    /// The mask of every object, with logits above `0.0` counted as foreground.
    pub fn masks(&self) -> Result<Vec<(ObjectId, Mask)>, MetricsError> {
        self.masks_with_threshold(0.0)
    }

    /// The mask of every object, with logits above `threshold` counted as foreground.
    pub fn masks_with_threshold(
        &self,
        threshold: f32,
    ) -> Result<Vec<(ObjectId, Mask)>, MetricsError> {
        self.object_ids
            .iter()
            .enumerate()
            .map(|(index, &object_id)| {
                let logits = self.mask_logits.get(index)?;
                Ok((object_id, Mask::from_logits(&logits, threshold)?))
            })
            .collect()
    }
}

/// A prompted video object segmentation model.
///
/// A model is driven in three steps: create a state for a directory of frames, add point prompts
/// for one or more objects, and then propagate the prompts through the rest of the video.
pub trait VideoSegmentationModel {
    /// The per-video inference state.
    type State;

    /// Prepare to segment the frames in `video_frames`.
    fn init_state(&self, video_frames: &Path) -> anyhow::Result<Self::State>;

    /// Add points for an object on a frame and segment that frame.
    fn add_new_points(
        &self,
        state: &mut Self::State,
        prompt: PointPrompt,
    ) -> anyhow::Result<FrameOutput>;

    /// Segment every prompted object through the video, one frame at a time.
    ///
    /// The iterator yields one item per processed frame. Propagation consumes the state: calling
    /// this again on the same state yields nothing.
    fn propagate_in_video<'a>(
        &'a self,
        state: &'a mut Self::State,
    ) -> impl Iterator<Item = anyhow::Result<FrameOutput>> + 'a;
}
