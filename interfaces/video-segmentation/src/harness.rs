//! Plumbing for tests that need a real segmentation model.
//!
//! Whether a model is available is a property of the environment, not of the code under test, so
//! a missing checkpoint or a model that fails to load or run turns into [`Outcome::Skipped`]
//! instead of a failure.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{FrameOutput, PointPrompt, VideoSegmentationModel, VideoSegments};

/// Environment variable that overrides [`HarnessConfig::checkpoint`].
pub const CHECKPOINT_ENV: &str = "SAM_CHECKPOINT";
/// Environment variable that overrides [`HarnessConfig::model_config`].
pub const MODEL_CONFIG_ENV: &str = "SAM_MODEL_CONFIG";

/// Where to find the model a harness runs against.
///
/// Both paths are handed to the model loader as is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// The model weights.
    pub checkpoint: PathBuf,
    /// The model configuration.
    pub model_config: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            checkpoint: PathBuf::from("checkpoints/sam2.1_hiera_tiny.pt"),
            model_config: PathBuf::from("sam2/sam2_hiera_t.yaml"),
        }
    }
}

impl HarnessConfig {
    /// The default paths, overridden by `SAM_CHECKPOINT` and `SAM_MODEL_CONFIG` if they are set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(checkpoint) = std::env::var_os(CHECKPOINT_ENV) {
            config.checkpoint = checkpoint.into();
        }
        if let Some(model_config) = std::env::var_os(MODEL_CONFIG_ENV) {
            config.model_config = model_config.into();
        }
        config
    }

    /// Set the checkpoint path.
    pub fn with_checkpoint(mut self, checkpoint: impl Into<PathBuf>) -> Self {
        self.checkpoint = checkpoint.into();
        self
    }

    /// Set the model configuration path.
    pub fn with_model_config(mut self, model_config: impl Into<PathBuf>) -> Self {
        self.model_config = model_config.into();
        self
    }

    /// Returns true if the checkpoint exists on disk.
    pub fn checkpoint_available(&self) -> bool {
        self.checkpoint.exists()
    }

    /// Load a model, skipping if the checkpoint is missing or loading fails.
    pub fn load_model<M>(
        &self,
        load: impl FnOnce(&HarnessConfig) -> anyhow::Result<M>,
    ) -> Outcome<M> {
        if !self.checkpoint_available() {
            let reason = format!("Checkpoint not available: {}", self.checkpoint.display());
            tracing::warn!("Skipping: {reason}");
            return Outcome::Skipped(reason);
        }
        skip_on_error("Model loading failed", || load(self))
    }
}

/// The result of a harness scenario.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The scenario ran to completion.
    Passed(T),
    /// The scenario could not run in this environment.
    Skipped(String),
}

impl<T> Outcome<T> {
    /// Returns true if the scenario ran.
    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed(_))
    }

    /// Returns true if the scenario was skipped.
    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped(_))
    }

    /// The value of a scenario that ran.
    pub fn passed(self) -> Option<T> {
        match self {
            Outcome::Passed(value) => Some(value),
            Outcome::Skipped(_) => None,
        }
    }

    /// Continue with another fallible step if this one ran.
    pub fn and_then<U>(self, context: &str, f: impl FnOnce(T) -> anyhow::Result<U>) -> Outcome<U> {
        match self {
            Outcome::Passed(value) => skip_on_error(context, || f(value)),
            Outcome::Skipped(reason) => Outcome::Skipped(reason),
        }
    }
}

/// Run `f`, turning any error into [`Outcome::Skipped`].
pub fn skip_on_error<T>(context: &str, f: impl FnOnce() -> anyhow::Result<T>) -> Outcome<T> {
    match f() {
        Ok(value) => Outcome::Passed(value),
        Err(err) => {
            let reason = format!("{context}: {err:#}");
            tracing::warn!("Skipping: {reason}");
            Outcome::Skipped(reason)
        }
    }
}

/// Prompt one object on a video and check that the model segmented something.
pub fn check_inference_pipeline<M: VideoSegmentationModel>(
    model: &M,
    frames_dir: &Path,
    prompt: PointPrompt,
) -> anyhow::Result<FrameOutput> {
    let mut state = model.init_state(frames_dir)?;
    let output = model.add_new_points(&mut state, prompt)?;
    anyhow::ensure!(
        !output.object_ids.is_empty(),
        "The model returned no objects for frame {}",
        output.frame_idx
    );
    anyhow::ensure!(
        output.mask_logits.dims().first().copied().unwrap_or(0) > 0,
        "The model returned empty mask logits with shape {:?}",
        output.mask_logits.dims()
    );
    Ok(output)
}

/// Prompt objects on a video, propagate them through every frame and check that at least one frame
/// was segmented.
pub fn check_video_processing<M: VideoSegmentationModel>(
    model: &M,
    frames_dir: &Path,
    prompts: impl IntoIterator<Item = PointPrompt>,
) -> anyhow::Result<VideoSegments> {
    let mut state = model.init_state(frames_dir)?;
    for prompt in prompts {
        model.add_new_points(&mut state, prompt)?;
    }
    let segments = VideoSegments::collect(model, &mut state)?;
    anyhow::ensure!(!segments.is_empty(), "Propagation produced no frames");
    tracing::debug!("Propagated masks through {} frames", segments.len());
    Ok(segments)
}
