use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use candle_core::{Device, Tensor};
use image::RgbImage;
use video_segmentation::harness::{check_inference_pipeline, check_video_processing};
use video_segmentation::*;

/// Segments every pixel whose color is close to the color under the object's foreground points.
struct ColorKeyModel {
    tolerance: u8,
}

struct ColorKeyState {
    frames: Vec<PathBuf>,
    prompts: BTreeMap<ObjectId, PointPrompt>,
    propagated: bool,
}

impl ColorKeyModel {
    fn segment(&self, state: &ColorKeyState, frame_idx: usize) -> anyhow::Result<FrameOutput> {
        let frame = image::open(&state.frames[frame_idx])?.to_rgb8();
        let (width, height) = frame.dimensions();
        let mut logits = Vec::new();
        for prompt in state.prompts.values() {
            let keys: Vec<_> = prompt
                .labeled_points()
                .filter(|(_, label)| *label == PointLabel::Foreground)
                .map(|((x, y), _)| *frame.get_pixel(x as u32, y as u32))
                .collect();
            logits.extend(frame.pixels().map(|pixel| {
                let matches = keys.iter().any(|key| {
                    key.0
                        .iter()
                        .zip(pixel.0.iter())
                        .all(|(a, b)| a.abs_diff(*b) <= self.tolerance)
                });
                if matches {
                    1.0f32
                } else {
                    -1.0
                }
            }));
        }
        let object_ids: Vec<_> = state.prompts.keys().copied().collect();
        let shape = (object_ids.len(), 1, height as usize, width as usize);
        let mask_logits = Tensor::from_vec(logits, shape, &Device::Cpu)?;
        Ok(FrameOutput::new(frame_idx, object_ids, mask_logits))
    }
}

impl VideoSegmentationModel for ColorKeyModel {
    type State = ColorKeyState;

    fn init_state(&self, video_frames: &Path) -> anyhow::Result<Self::State> {
        let frames = list_frames(video_frames)?;
        anyhow::ensure!(!frames.is_empty(), "no frames in {}", video_frames.display());
        Ok(ColorKeyState {
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
        anyhow::ensure!(frame_idx < state.frames.len(), "frame {frame_idx} out of range");
        state.prompts.insert(prompt.object_id(), prompt);
        self.segment(state, frame_idx)
    }

    fn propagate_in_video<'a>(
        &'a self,
        state: &'a mut Self::State,
    ) -> impl Iterator<Item = anyhow::Result<FrameOutput>> + 'a {
        let start = if state.propagated {
            state.frames.len()
        } else {
            state
                .prompts
                .values()
                .map(|prompt| prompt.frame_idx())
                .min()
                .unwrap_or(state.frames.len())
        };
        state.propagated = true;
        let state = &*state;
        (start..state.frames.len()).map(move |frame_idx| self.segment(state, frame_idx))
    }
}

fn model() -> ColorKeyModel {
    ColorKeyModel { tolerance: 60 }
}

#[test]
fn inference_pipeline_segments_the_prompted_object() {
    let dir = tempfile::tempdir().unwrap();
    let synthesis = FrameSynthesis::new();
    synthesis.write(dir.path()).unwrap();

    let prompt = PointPrompt::from_raw_labels(0, 1, vec![(300.0, 250.0)], &[1]).unwrap();
    let output = check_inference_pipeline(&model(), dir.path(), prompt).unwrap();
    assert_eq!(output.frame_idx, 0);
    assert_eq!(output.object_ids, vec![1]);
    assert_eq!(output.mask_logits.dims(), &[1, 1, 480, 640]);

    let (_, mask) = output.masks().unwrap().remove(0);
    let iou = mask.iou(&synthesis.ground_truth()).unwrap();
    assert!(iou > 0.85, "iou {iou}");

    let metrics = mask.metrics(None).into_metrics();
    assert!((metrics.centroid.0 - 249.5).abs() < 2.0);
    assert!((metrics.centroid.1 - 299.5).abs() < 2.0);
}

#[test]
fn video_processing_covers_every_frame() {
    let dir = tempfile::tempdir().unwrap();
    let frames_dir = dir.path().join("test_frames");
    let synthesis = FrameSynthesis::new();
    synthesis.write(&frames_dir).unwrap();

    let (x, y) = synthesis.object_center();
    let prompts = [
        PointPrompt::foreground_point(0, 1, x, y),
        PointPrompt::foreground_point(0, 2, 5.0, 5.0),
    ];
    let segments = check_video_processing(&model(), &frames_dir, prompts).unwrap();
    assert_eq!(segments.len(), synthesis.count());
    assert_eq!(segments.object_ids().into_iter().collect::<Vec<_>>(), vec![1, 2]);

    // Identical frames give identical masks.
    for (_, iou) in segments.temporal_iou(1).unwrap() {
        assert_eq!(iou, 1.0);
    }
    // The object and the background barely overlap.
    let object = segments.mask(0, 1).unwrap();
    let background = segments.mask(0, 2).unwrap();
    assert!(object.iou(background).unwrap() < 0.05);
}

#[test]
fn propagation_is_not_restartable() {
    let dir = tempfile::tempdir().unwrap();
    FrameSynthesis::new()
        .with_count(3)
        .with_size(32, 32)
        .with_object(8..16, 8..16)
        .write(dir.path())
        .unwrap();

    let model = model();
    let mut state = model.init_state(dir.path()).unwrap();
    model
        .add_new_points(&mut state, PointPrompt::foreground_point(1, 1, 12.0, 12.0))
        .unwrap();
    let first: Vec<_> = model
        .propagate_in_video(&mut state)
        .map(|output| output.unwrap().frame_idx)
        .collect();
    assert_eq!(first, vec![1, 2]);
    assert_eq!(model.propagate_in_video(&mut state).count(), 0);
}

#[test]
fn empty_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let image = RgbImage::new(4, 4);
    image.save(dir.path().join("preview.png")).unwrap();
    assert!(model().init_state(dir.path()).is_err());
}
