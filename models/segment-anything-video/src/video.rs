use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use candle_core::Tensor;
use image::GenericImageView;
use video_segmentation::{
    list_frames, FrameOutput, ObjectId, PointLabel, PointPrompt, VideoSegmentationModel,
};

use crate::{SegmentAnything, SegmentAnythingInferenceSettings};

/// The inference state of [`SegmentAnything`] for one video.
///
/// Segment Anything has no memory between frames: every frame is segmented from scratch with the
/// latest points given for each object.
pub struct SegmentAnythingVideoState {
    frames: Vec<PathBuf>,
    prompts: BTreeMap<ObjectId, PointPrompt>,
    propagated: bool,
}

impl SegmentAnythingVideoState {
    /// The frames of the video in order.
    pub fn frames(&self) -> &[PathBuf] {
        &self.frames
    }

    /// The objects that have been prompted.
    pub fn object_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.prompts.keys().copied()
    }

    fn first_prompted_frame(&self) -> Option<usize> {
        self.prompts.values().map(PointPrompt::frame_idx).min()
    }
}

impl SegmentAnything {
    fn segment_frame(
        &self,
        state: &SegmentAnythingVideoState,
        frame_idx: usize,
    ) -> anyhow::Result<FrameOutput> {
        let path = &state.frames[frame_idx];
        let image = image::open(path)?;
        let (width, height) = image.dimensions();
        let image = image.to_rgba8();
        tracing::trace!("Segmenting frame {frame_idx} from {}", path.display());

        let mut object_ids = Vec::with_capacity(state.prompts.len());
        let mut logits = Vec::with_capacity(state.prompts.len());
        for (&object_id, prompt) in &state.prompts {
            let mut settings = SegmentAnythingInferenceSettings::new(image.clone())?;
            for ((x, y), label) in prompt.labeled_points() {
                // The model takes coordinates relative to the image size.
                let x = x as f64 / width as f64;
                let y = y as f64 / height as f64;
                settings = match label {
                    PointLabel::Foreground => settings.add_goal_point(x, y),
                    PointLabel::Background => settings.add_avoid_points(x, y),
                };
            }
            object_ids.push(object_id);
            logits.push(self.mask_logits(&settings)?);
        }

        let mask_logits = Tensor::stack(&logits, 0)?;
        Ok(FrameOutput::new(frame_idx, object_ids, mask_logits))
    }
}

impl VideoSegmentationModel for SegmentAnything {
    type State = SegmentAnythingVideoState;

    fn init_state(&self, video_frames: &Path) -> anyhow::Result<Self::State> {
        let frames = list_frames(video_frames)?;
        anyhow::ensure!(
            !frames.is_empty(),
            "No frames found in {}",
            video_frames.display()
        );
        tracing::debug!(
            "Loaded {} frames from {}",
            frames.len(),
            video_frames.display()
        );
        Ok(SegmentAnythingVideoState {
            frames,
            prompts: BTreeMap::new(),
            propagated: false,
        })
    }

    fn add_new_points(
        &self,
        state: &mut Self::State,
        prompt: PointPrompt,
    ) -> anyhow::Result<FrameOutput> {
        let frame_idx = prompt.frame_idx();
        anyhow::ensure!(
            frame_idx < state.frames.len(),
            "Frame {frame_idx} is out of range for a video with {} frames",
            state.frames.len()
        );
        state.prompts.insert(prompt.object_id(), prompt);
        self.segment_frame(state, frame_idx)
    }

    fn propagate_in_video<'a>(
        &'a self,
        state: &'a mut Self::State,
    ) -> impl Iterator<Item = anyhow::Result<FrameOutput>> + 'a {
        let end = state.frames.len();
        let start = if state.propagated {
            end
        } else {
            state.first_prompted_frame().unwrap_or(end)
        };
        state.propagated = true;
        let state = &*state;
        (start..end).map(move |frame_idx| self.segment_frame(state, frame_idx))
    }
}
