//! # Segment Anything Video
//! Frame by frame video segmentation with [Segment Anything](https://segment-anything.com/)
//!
//! ## Usage
//!
//! ```rust, no_run
//! use segment_anything_video::*;
//! use video_segmentation::*;
//!
//! let model = SegmentAnything::builder().build().unwrap();
//! let mut state = model.init_state("test_frames".as_ref()).unwrap();
//! model
//!     .add_new_points(&mut state, PointPrompt::foreground_point(0, 1, 300., 250.))
//!     .unwrap();
//! let segments = VideoSegments::collect(&model, &mut state).unwrap();
//! for (frame, mask) in segments.track(1) {
//!     println!("frame {frame}: {:?}", mask.metrics(None));
//! }
//! ```

#![warn(missing_docs)]
#[cfg(feature = "mkl")]
extern crate intel_mkl_src;

#[cfg(feature = "accelerate")]
extern crate accelerate_src;

mod video;

use std::path::PathBuf;

use candle_core::DType;
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::segment_anything::sam::{self, Sam};
use image::{DynamicImage, GenericImage, GenericImageView, ImageBuffer, Rgba};
use mask_metrics::Mask;
use video_segmentation::HarnessConfig;

pub use video::SegmentAnythingVideoState;

/// A builder for [`SegmentAnything`].
#[derive(Default)]
pub struct SegmentAnythingBuilder {
    source: SegmentAnythingSource,

    cpu: bool,
}

impl SegmentAnythingBuilder {
    /// Sets the source of the model.
    pub fn source(mut self, source: SegmentAnythingSource) -> Self {
        self.source = source;
        self
    }

    /// Set to true to run the model on CPU.
    pub fn cpu(mut self, cpu: bool) -> Self {
        self.cpu = cpu;
        self
    }

    /// Builds the [`SegmentAnything`] model.
    pub fn build(self) -> anyhow::Result<SegmentAnything> {
        SegmentAnything::new(self)
    }
}

enum WeightsLocation {
    HuggingFace { model: String, filename: String },
    Local(PathBuf),
}

/// The source of the model.
pub struct SegmentAnythingSource {
    location: WeightsLocation,
    tiny: bool,
}

impl SegmentAnythingSource {
    /// Creates a new [`SegmentAnythingSource`] from a file in a Hugging Face model repo.
    pub fn new(model: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            location: WeightsLocation::HuggingFace {
                model: model.into(),
                filename: filename.into(),
            },
            tiny: false,
        }
    }

    /// Creates a new [`SegmentAnythingSource`] from a local safetensors checkpoint of the tiny
    /// architecture.
    pub fn local(checkpoint: impl Into<PathBuf>) -> Self {
        Self {
            location: WeightsLocation::Local(checkpoint.into()),
            tiny: true,
        }
    }

    /// Set whether the weights are for the tiny (vit_t) or the base (vit_b) architecture.
    pub fn with_tiny(mut self, tiny: bool) -> Self {
        self.tiny = tiny;
        self
    }

    /// Create the tiny SAM model source.
    pub fn tiny() -> Self {
        Self::new("lmz/candle-sam", "mobile_sam-tiny-vitt.safetensors").with_tiny(true)
    }

    /// Create a normal sized model source.
    pub fn medium() -> Self {
        Self::new("lmz/candle-sam", "sam_vit_b_01ec64.safetensors")
    }

    fn weights(self) -> anyhow::Result<PathBuf> {
        match self.location {
            WeightsLocation::HuggingFace { model, filename } => {
                let api = hf_hub::api::sync::Api::new()?;
                let api = api.model(model);
                Ok(api.get(&filename)?)
            }
            WeightsLocation::Local(path) => {
                anyhow::ensure!(path.exists(), "checkpoint {} does not exist", path.display());
                Ok(path)
            }
        }
    }
}

impl Default for SegmentAnythingSource {
    fn default() -> Self {
        Self::tiny()
    }
}

/// The harness checkpoint is loaded as tiny architecture weights. The model config path is not
/// read: the architecture is fixed by the source.
impl From<&HarnessConfig> for SegmentAnythingSource {
    fn from(config: &HarnessConfig) -> Self {
        Self::local(config.checkpoint.clone())
    }
}

/// Settings for running inference on [`SegmentAnything`].
pub struct SegmentAnythingInferenceSettings {
    threshold: f32,

    /// List of x,y coordinates, between 0 and 1 (0.5 is at the middle of the image).
    goal_points: Vec<(f64, f64)>,

    /// List of x,y coordinates, between 0 and 1 (0.5 is at the middle of the image).
    avoid_points: Vec<(f64, f64)>,

    image: ImageBuffer<image::Rgba<u8>, Vec<u8>>,
}

impl SegmentAnythingInferenceSettings {
    /// Creates a new [`SegmentAnythingInferenceSettings`] from an image.
    pub fn new<I: GenericImageView<Pixel = Rgba<u8>>>(input: I) -> anyhow::Result<Self> {
        let mut image = ImageBuffer::new(input.width(), input.height());
        image.copy_from(&input, 0, 0)?;
        Ok(Self {
            threshold: 0.,
            goal_points: Vec::new(),
            avoid_points: Vec::new(),
            image,
        })
    }

    /// Sets the detection threshold for the mask, 0 is the default value.
    /// - A negative values makes the model return a larger mask.
    /// - A positive makes the model return a smaller mask.
    pub fn set_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Add a point to the list of points to segment.
    pub fn add_goal_point(mut self, x: impl Into<f64>, y: impl Into<f64>) -> Self {
        self.goal_points.push((x.into(), y.into()));
        self
    }

    /// Set the list of points to segment.
    pub fn set_goal_points(mut self, points: Vec<(f64, f64)>) -> Self {
        self.goal_points = points;
        self
    }

    /// Add a point to the list of points to avoid.
    pub fn add_avoid_points(mut self, x: impl Into<f64>, y: impl Into<f64>) -> Self {
        self.avoid_points.push((x.into(), y.into()));
        self
    }

    /// Set the list of points to avoid.
    pub fn set_avoid_points(mut self, points: Vec<(f64, f64)>) -> Self {
        self.avoid_points = points;
        self
    }

    fn points(&self) -> Vec<(f64, f64, bool)> {
        let goal = self.goal_points.iter().map(|&(x, y)| (x, y, true));
        let avoid = self.avoid_points.iter().map(|&(x, y)| (x, y, false));
        goal.chain(avoid).collect()
    }

    fn threshold_logits(&self, logits: &Tensor) -> anyhow::Result<Mask> {
        Ok(Mask::from_logits(logits, self.threshold)?)
    }
}

/// The [segment anything](https://segment-anything.com/) model.
pub struct SegmentAnything {
    device: Device,
    sam: Sam,
}

impl SegmentAnything {
    /// Creates a new [`SegmentAnythingBuilder`].
    pub fn builder() -> SegmentAnythingBuilder {
        SegmentAnythingBuilder::default()
    }

    fn new(settings: SegmentAnythingBuilder) -> anyhow::Result<Self> {
        let SegmentAnythingBuilder { source, cpu } = settings;
        let tiny = source.tiny;
        let model = source.weights()?;
        tracing::debug!("Loading segment anything weights from {}", model.display());
        let device = device(cpu)?;
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[model], DType::F32, &device)? };
        let sam = if tiny {
            sam::Sam::new_tiny(vb)? // tiny vit_t
        } else {
            sam::Sam::new(768, 12, 12, &[2, 5, 8, 11], vb)? // sam_vit_b
        };
        Ok(Self { device, sam })
    }

    /// Segment an image from a list of points. Returns a `(1, height, width)` tensor of mask
    /// logits at the resolution of the input image.
    pub fn mask_logits(&self, settings: &SegmentAnythingInferenceSettings) -> anyhow::Result<Tensor> {
        let points = settings.points();
        anyhow::ensure!(!points.is_empty(), "at least one point is needed to segment");

        let image = image::DynamicImage::ImageRgba8(settings.image.clone());
        let image_width = image.width() as usize;
        let image_height = image.height() as usize;

        let image_tensor = self.image_to_tensor(image)?;

        let (mask, _iou_predictions) = self.sam.forward(&image_tensor, &points, false)?;

        // The model segments the resized image, scale the logits back to the input.
        let mask = mask
            .to_dtype(DType::F32)?
            .unsqueeze(0)?
            .upsample_nearest2d(image_height, image_width)?
            .squeeze(0)?;
        Ok(mask)
    }

    /// Segment an image from a list of points. Returns the [`Mask`] of logits above the threshold.
    ///
    /// # Example
    /// ```rust, no_run
    /// use segment_anything_video::*;
    ///
    /// let model = SegmentAnything::builder().build().unwrap();
    /// let image = image::open("test_frames/00000.jpg").unwrap();
    /// let x = image.width() / 2;
    /// let y = image.height() / 4;
    /// let mask = model
    ///     .segment_from_points(
    ///         SegmentAnythingInferenceSettings::new(image.to_rgba8())
    ///             .unwrap()
    ///             .add_goal_point(x as f64 / image.width() as f64, y as f64 / image.height() as f64),
    ///     )
    ///     .unwrap();
    ///
    /// mask.to_luma().unwrap().save("out.png").unwrap();
    /// ```
    pub fn segment_from_points(
        &self,
        settings: SegmentAnythingInferenceSettings,
    ) -> anyhow::Result<Mask> {
        let logits = self.mask_logits(&settings)?;
        settings.threshold_logits(&logits)
    }

    fn image_to_tensor(&self, image: DynamicImage) -> anyhow::Result<Tensor> {
        let image = {
            let resize_longest = sam::IMAGE_SIZE;
            let (height, width) = (image.height(), image.width());
            let resize_longest = resize_longest as u32;
            let (height, width) = if height < width {
                let h = (resize_longest * height) / width;
                (h, resize_longest)
            } else {
                let w = (resize_longest * width) / height;
                (resize_longest, w)
            };
            image.resize_exact(width, height, image::imageops::FilterType::CatmullRom)
        };
        let (height, width) = (image.height() as usize, image.width() as usize);
        let img = image.to_rgb8();
        let data = img.into_raw();
        let image = Tensor::from_vec(data, (height, width, 3), &self.device)?.permute((2, 0, 1))?;

        let image = image.to_device(&self.device)?;

        Ok(image)
    }
}

fn device(cpu: bool) -> anyhow::Result<Device> {
    if cpu {
        Ok(Device::Cpu)
    } else {
        let device = Device::cuda_if_available(0)?;
        if !device.is_cuda() {
            tracing::warn!(
                "Running on CPU, to run on GPU, build this example with `--features cuda`"
            );
        }
        Ok(device)
    }
}
