use std::collections::{BTreeMap, BTreeSet};

use mask_metrics::{Mask, MetricsError, MetricsResult};

use crate::{FrameOutput, ObjectId, VideoSegmentationModel};

/// The mask of every object on every segmented frame of a video.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoSegments {
    frames: BTreeMap<usize, BTreeMap<ObjectId, Mask>>,
}

impl VideoSegments {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain [`VideoSegmentationModel::propagate_in_video`] into a new collection.
    pub fn collect<M: VideoSegmentationModel>(
        model: &M,
        state: &mut M::State,
    ) -> anyhow::Result<Self> {
        let mut segments = Self::new();
        for output in model.propagate_in_video(state) {
            let output = output?;
            tracing::trace!(
                "Frame {} segmented {} objects",
                output.frame_idx,
                output.object_ids.len()
            );
            segments.insert(&output)?;
        }
        Ok(segments)
    }

    /// Threshold the logits of a frame and store the masks. Masks from an earlier output for the
    /// same frame and object are replaced.
    pub fn insert(&mut self, output: &FrameOutput) -> Result<(), MetricsError> {
        let masks = output.masks()?;
        let frame = self.frames.entry(output.frame_idx).or_default();
        frame.extend(masks);
        Ok(())
    }

    /// Store a single mask.
    pub fn insert_mask(&mut self, frame_idx: usize, object_id: ObjectId, mask: Mask) {
        self.frames
            .entry(frame_idx)
            .or_default()
            .insert(object_id, mask);
    }

    /// The number of frames with masks.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns true if no frame was segmented.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The masks of every object on a frame.
    pub fn frame(&self, frame_idx: usize) -> Option<&BTreeMap<ObjectId, Mask>> {
        self.frames.get(&frame_idx)
    }

    /// The mask of an object on a frame.
    pub fn mask(&self, frame_idx: usize, object_id: ObjectId) -> Option<&Mask> {
        self.frames.get(&frame_idx)?.get(&object_id)
    }

    /// The segmented frame indices in order.
    pub fn frame_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.frames.keys().copied()
    }

    /// Every object that appears on any frame.
    pub fn object_ids(&self) -> BTreeSet<ObjectId> {
        self.frames
            .values()
            .flat_map(|objects| objects.keys().copied())
            .collect()
    }

    /// The masks of one object, in frame order.
    pub fn track(&self, object_id: ObjectId) -> impl Iterator<Item = (usize, &Mask)> + '_ {
        self.frames
            .iter()
            .filter_map(move |(&frame_idx, objects)| Some((frame_idx, objects.get(&object_id)?)))
    }

    /// The shape metrics of one object on every frame it appears on.
    pub fn metrics(&self, object_id: ObjectId) -> Vec<(usize, MetricsResult)> {
        self.track(object_id)
            .map(|(frame_idx, mask)| (frame_idx, mask.metrics(None)))
            .collect()
    }

    /// The IoU between the masks of an object on consecutive segmented frames, keyed by the later
    /// frame. Frames the object is missing from are skipped.
    pub fn temporal_iou(&self, object_id: ObjectId) -> Result<Vec<(usize, f64)>, MetricsError> {
        let track: Vec<_> = self.track(object_id).collect();
        track
            .windows(2)
            .map(|pair| {
                let (_, previous) = pair[0];
                let (frame_idx, current) = pair[1];
                Ok((frame_idx, previous.iou(current)?))
            })
            .collect()
    }
}
